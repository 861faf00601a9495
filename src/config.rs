//! Client configuration read from the environment.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;

use crate::error::{ClientError, ClientResult};

pub const DEFAULT_API_BASE: &str = "http://localhost:5000/api";
pub const DEFAULT_STATE_FILE: &str = ".taskdesk/session.json";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL. Endpoint paths are joined beneath it.
    pub api_base: Url,
    /// Location of the durable session document.
    pub state_file: PathBuf,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_base: &str, state_file: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            api_base: parse_base(api_base)?,
            state_file: state_file.into(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// `TASKDESK_API_BASE`, `TASKDESK_STATE_FILE`, `TASKDESK_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        let base = std::env::var("TASKDESK_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        let state = std::env::var("TASKDESK_STATE_FILE").unwrap_or_else(|_| DEFAULT_STATE_FILE.to_string());
        let timeout = match std::env::var("TASKDESK_TIMEOUT_SECS") {
            Ok(v) => v.trim().parse::<u64>().with_context(|| format!("invalid TASKDESK_TIMEOUT_SECS: {}", v))?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };
        Ok(Self::new(&base, state)?.with_timeout(Duration::from_secs(timeout)))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Build the shared HTTP client used by both the session store and the interceptor.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
            .context("failed to build HTTP client")
    }
}

fn parse_base(base: &str) -> Result<Url> {
    // A trailing slash keeps the `/api` prefix when joining relative paths.
    let mut s = base.trim().to_string();
    if !s.ends_with('/') { s.push('/'); }
    Url::parse(&s).with_context(|| format!("invalid API base URL: {}", base))
}

/// Join an endpoint path such as `/auth/login` beneath the API base.
pub fn endpoint(base: &Url, path: &str) -> ClientResult<Url> {
    base.join(path.trim_start_matches('/'))
        .map_err(|e| ClientError::Endpoint(format!("{}: {}", path, e)))
}
