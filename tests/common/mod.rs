//! In-process mock of the task backend's auth surface, bound to an ephemeral port.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use taskdesk::identity::{BearerToken, MemoryStorage, SessionStorage, StoredSession};
use taskdesk::{HistoryNavigator, Identity, Role, SessionStore};

pub const ADMIN_EMAIL: &str = "a@x.com";
pub const USER_EMAIL: &str = "u@x.com";
pub const PASSWORD: &str = "secret";

/// Holds a handler at its entry until the test releases it.
#[derive(Default)]
pub struct Gate {
    pub arrived: Notify,
    pub release: Notify,
}

pub struct MockState {
    users: Mutex<Vec<(Identity, String)>>,
    tokens: Mutex<HashMap<String, i64>>,
    next_token: AtomicU64,
    gates: Mutex<HashMap<&'static str, Arc<Gate>>>,
    /// Authorization header of every `/tasks` request, in arrival order.
    pub tasks_auth: Mutex<Vec<Option<String>>>,
    /// `/tasks` answers 401 regardless of the credential.
    pub reject_tasks: AtomicBool,
    /// `/user` answers 200 with a body that is not an identity.
    pub malformed_user: AtomicBool,
}

impl MockState {
    fn new() -> Self {
        let users = vec![
            (Identity { id: 1, email: ADMIN_EMAIL.into(), role: Role::Admin }, PASSWORD.to_string()),
            (Identity { id: 2, email: USER_EMAIL.into(), role: Role::User }, PASSWORD.to_string()),
        ];
        Self {
            users: Mutex::new(users),
            tokens: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
            gates: Mutex::new(HashMap::new()),
            tasks_auth: Mutex::new(Vec::new()),
            reject_tasks: AtomicBool::new(false),
            malformed_user: AtomicBool::new(false),
        }
    }

    pub fn issue_token(&self, user_id: i64) -> String {
        let n = self.next_token.fetch_add(1, Ordering::SeqCst);
        let token = format!("tok-{}-{}", user_id, n);
        self.tokens.lock().insert(token.clone(), user_id);
        token
    }

    pub fn revoke_all(&self) { self.tokens.lock().clear(); }

    /// Make the named endpoint (`"user"` or `"tasks"`) wait on a gate.
    pub fn gate(&self, name: &'static str) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.gates.lock().insert(name, gate.clone());
        gate
    }

    pub fn identity(&self, user_id: i64) -> Identity {
        self.users.lock().iter().find(|(u, _)| u.id == user_id).map(|(u, _)| u.clone()).expect("seeded user")
    }

    fn user_for(&self, headers: &HeaderMap) -> Option<Identity> {
        let token = bearer(headers)?;
        let id = *self.tokens.lock().get(&token)?;
        Some(self.identity(id))
    }

    async fn hold(&self, name: &'static str) {
        let gate = self.gates.lock().get(name).cloned();
        if let Some(g) = gate {
            g.arrived.notify_one();
            g.release.notified().await;
        }
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

#[derive(Deserialize)]
struct Creds {
    email: String,
    password: String,
}

type Reply = (StatusCode, Json<Value>);

async fn login(State(s): State<Arc<MockState>>, Json(c): Json<Creds>) -> Reply {
    let found = s.users.lock().iter().find(|(u, p)| u.email == c.email && *p == c.password).map(|(u, _)| u.clone());
    match found {
        Some(user) => {
            let token = s.issue_token(user.id);
            (StatusCode::OK, Json(json!({"token": token, "user": user})))
        }
        None => (StatusCode::UNAUTHORIZED, Json(json!({"error": "Credenciales invalidas"}))),
    }
}

async fn register(State(s): State<Arc<MockState>>, Json(c): Json<Creds>) -> Reply {
    let mut users = s.users.lock();
    if users.iter().any(|(u, _)| u.email == c.email) {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "El email ya está registrado"})));
    }
    let id = users.len() as i64 + 1;
    users.push((Identity { id, email: c.email, role: Role::User }, c.password));
    (StatusCode::CREATED, Json(json!({"message": "Usuario creado exitosamente"})))
}

async fn current_user(State(s): State<Arc<MockState>>, headers: HeaderMap) -> Reply {
    s.hold("user").await;
    if s.malformed_user.load(Ordering::SeqCst) {
        return (StatusCode::OK, Json(json!({"unexpected": true})));
    }
    match s.user_for(&headers) {
        Some(user) => (StatusCode::OK, Json(json!(user))),
        None => (StatusCode::UNAUTHORIZED, Json(json!({"msg": "Token has expired"}))),
    }
}

async fn tasks(State(s): State<Arc<MockState>>, headers: HeaderMap) -> Reply {
    s.tasks_auth.lock().push(headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()).map(|v| v.to_string()));
    s.hold("tasks").await;
    if s.reject_tasks.load(Ordering::SeqCst) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"msg": "Token has been revoked"})));
    }
    match s.user_for(&headers) {
        Some(user) => (StatusCode::OK, Json(json!([{"id": 10, "title": "write report", "user_id": user.id}]))),
        None => (StatusCode::UNAUTHORIZED, Json(json!({"msg": "Missing Authorization Header"}))),
    }
}

async fn admin_users(State(s): State<Arc<MockState>>, headers: HeaderMap) -> Reply {
    match s.user_for(&headers) {
        Some(user) if user.role == Role::Admin => {
            let all: Vec<Identity> = s.users.lock().iter().map(|(u, _)| u.clone()).collect();
            (StatusCode::OK, Json(json!(all)))
        }
        Some(_) => (StatusCode::FORBIDDEN, Json(json!({"error": "Acceso denegado"}))),
        None => (StatusCode::UNAUTHORIZED, Json(json!({"msg": "Missing Authorization Header"}))),
    }
}

pub struct MockBackend {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
    handle: JoinHandle<()>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::new());
        let app = Router::new()
            .route("/api/auth/login", post(login))
            .route("/api/register", post(register))
            .route("/api/user", get(current_user))
            .route("/api/tasks", get(tasks))
            .route("/api/admin/users", get(admin_users))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind 127.0.0.1:0");
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("mock backend error: {e:?}");
            }
        });
        Self { addr, state, handle }
    }

    pub fn base(&self) -> reqwest::Url {
        reqwest::Url::parse(&format!("http://{}/api/", self.addr)).unwrap()
    }

    pub fn store(&self, storage: Arc<dyn SessionStorage>) -> Arc<SessionStore> {
        self.store_with_timeout(storage, Duration::from_secs(5))
    }

    pub fn store_with_timeout(&self, storage: Arc<dyn SessionStorage>, timeout: Duration) -> Arc<SessionStore> {
        let http = reqwest::Client::builder().timeout(timeout).build().unwrap();
        Arc::new(SessionStore::new(http, self.base(), storage))
    }

    /// Durable storage already holding a server-valid session for `user_id`.
    pub fn persisted(&self, user_id: i64) -> Arc<MemoryStorage> {
        let token = self.state.issue_token(user_id);
        Arc::new(MemoryStorage::with_session(StoredSession {
            token: BearerToken::new(token),
            user: self.state.identity(user_id),
        }))
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) { self.handle.abort(); }
}

pub fn navigator_at(path: &str) -> Arc<HistoryNavigator> { Arc::new(HistoryNavigator::new(path)) }
