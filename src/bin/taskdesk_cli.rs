//!
//! taskdesk CLI binary
//! -------------------
//! Interactive shell over the taskdesk client core. On start it verifies the
//! persisted session, then lets you log in/out, register, walk the route table
//! and issue authenticated GETs against the backend.

use std::env;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing_subscriber::{fmt, EnvFilter};

use taskdesk::bootstrap;
use taskdesk::identity::{validate_registration, LOGIN_PATH};
use taskdesk::routes::{landing_for, resolve, Render};
use taskdesk::{ApiClient, ClientConfig, HistoryNavigator, Navigator, SessionStore};

const MAX_REDIRECTS: usize = 8;

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [--api <url>] [--state <file>] [--timeout <secs>]\n\nFlags:\n  --api <url>        Backend base URL (env TASKDESK_API_BASE, default http://localhost:5000/api)\n  --state <file>     Session state file (env TASKDESK_STATE_FILE, default .taskdesk/session.json)\n  --timeout <secs>   Request timeout (env TASKDESK_TIMEOUT_SECS, default 10)\n  -h, --help         Show this help\n\nInteractive commands:\n  login <email> <password>                 authenticate and go to your home view\n  register <email> <password> <confirm>    create an account (log in afterwards)\n  logout                                   end the session\n  status                                   show session and current view\n  open <path>                              navigate to a view, following redirects\n  get <path>                               authenticated GET against the API, e.g. get /tasks\n  help                                     show this help\n  quit | exit                              leave the shell"
    );
}

struct Shell {
    store: Arc<SessionStore>,
    nav: Arc<HistoryNavigator>,
    api: ApiClient,
}

impl Shell {
    /// Navigate to `path`, following redirects the way the router would.
    fn open(&self, path: &str) {
        let mut target = path.to_string();
        for _ in 0..MAX_REDIRECTS {
            match resolve(&self.store.snapshot(), &target) {
                Render::Loading => { println!("loading..."); return; }
                Render::Show(route) => {
                    self.nav.navigate(&route.path());
                    println!("view: {}", route.path());
                    return;
                }
                Render::Redirect(next) => {
                    println!("redirect: {} -> {}", target, next);
                    target = next;
                }
            }
        }
        eprintln!("too many redirects from {}", path);
    }

    fn status(&self) {
        let snap = self.store.snapshot();
        match &snap.identity {
            Some(id) => println!("signed in: {} (id={}, role={})", id.email, id.id, id.role),
            None => println!("anonymous"),
        }
        println!("phase: {:?}, generation: {}, view: {}", snap.phase, snap.generation, self.nav.current_path());
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("invalid log filter")?;
    fmt().with_env_filter(filter).with_writer(io::stderr).init();

    let mut args: Vec<String> = env::args().collect();
    let program = args.remove(0);
    let mut cfg = ClientConfig::from_env()?;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--api" | "--state" | "--timeout" if i + 1 >= args.len() => {
                eprintln!("{} requires a value", args[i]);
                print_usage(&program);
                std::process::exit(2);
            }
            "--api" => { cfg = ClientConfig::new(&args[i + 1], cfg.state_file.clone())?.with_timeout(cfg.request_timeout); i += 2; }
            "--state" => { cfg.state_file = args[i + 1].clone().into(); i += 2; }
            "--timeout" => {
                let secs: u64 = args[i + 1].parse().with_context(|| format!("invalid --timeout: {}", args[i + 1]))?;
                cfg = cfg.with_timeout(Duration::from_secs(secs));
                i += 2;
            }
            "-h" | "--help" => { print_usage(&program); return Ok(()); }
            other => {
                eprintln!("unknown argument: {}", other);
                print_usage(&program);
                std::process::exit(2);
            }
        }
    }

    // Single-threaded cooperative scheduling, like the browser client this models.
    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    let store = Arc::new(SessionStore::from_config(&cfg)?);
    let nav = Arc::new(HistoryNavigator::new("/"));
    let api = ApiClient::new(store.clone(), nav.clone());
    let shell = Shell { store, nav, api };

    println!("taskdesk shell against {}. Type 'help' for commands.", cfg.api_base);
    println!("loading...");
    rt.block_on(bootstrap::verify(&shell.store));
    shell.open("/");
    run_repl(&rt, &shell)
}

fn run_repl(rt: &tokio::runtime::Runtime, shell: &Shell) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut input = String::new();
    loop {
        input.clear();
        print!("{}> ", shell.nav.current_path());
        let _ = stdout.flush();
        if stdin.read_line(&mut input)? == 0 { break; }
        let parts: Vec<&str> = input.split_whitespace().collect();
        let Some(cmd) = parts.first() else { continue; };
        match (cmd.to_ascii_lowercase().as_str(), &parts[1..]) {
            ("quit" | "exit", _) => break,
            ("help", _) => print_usage("taskdesk_cli"),
            ("status", _) => shell.status(),
            ("login", [email, password]) => match rt.block_on(shell.store.login(email, password)) {
                Ok(identity) => {
                    println!("welcome {}", identity.email);
                    shell.open(landing_for(identity.role));
                }
                Err(e) => eprintln!("login failed [{}]: {}", e.code_str(), e),
            },
            ("register", [email, password, confirm]) => {
                if let Err(e) = validate_registration(email, password, confirm) {
                    eprintln!("register: {}", e);
                    continue;
                }
                match rt.block_on(shell.store.register(email, password)) {
                    Ok(()) => {
                        println!("registered, please log in");
                        shell.open(LOGIN_PATH);
                    }
                    Err(e) => eprintln!("register failed [{}]: {}", e.code_str(), e),
                }
            }
            ("logout", _) => {
                shell.store.logout();
                shell.open(LOGIN_PATH);
            }
            ("open", [path]) => shell.open(path),
            ("get", [path]) => {
                let reloads = shell.nav.reload_count();
                match rt.block_on(shell.api.get_json::<Value>(path)) {
                    Ok(val) => println!("{}", serde_json::to_string_pretty(&val).unwrap_or_else(|_| val.to_string())),
                    Err(e) => eprintln!("error [{}]: {}", e.code_str(), e),
                }
                if shell.nav.reload_count() != reloads {
                    println!("session ended; reloaded to {}", shell.nav.current_path());
                }
            }
            _ => eprintln!("unrecognized command; type 'help'"),
        }
    }
    Ok(())
}
