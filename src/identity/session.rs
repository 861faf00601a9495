//! Process-wide session state: credential, identity and bootstrap phase.
//!
//! All mutations go through named operations on `SessionStore`. Every
//! `login`/`logout` (and every central invalidation) advances a generation
//! counter; asynchronous results that were started under an older generation
//! are discarded instead of applied. The state lock is never held across an
//! await, so each commit is atomic with respect to other tasks.

use std::sync::Arc;

use parking_lot::RwLock;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::principal::{BearerToken, Identity};
use super::storage::{FileStorage, SessionStorage, StoredSession};
use crate::config::{endpoint, ClientConfig};
use crate::error::{classify_auth_failure, payload_message, AuthEndpoint, AuthError, ClientError, ClientResult};

pub const LOGIN_ENDPOINT: &str = "/auth/login";
pub const REGISTER_ENDPOINT: &str = "/register";
pub const CURRENT_USER_ENDPOINT: &str = "/user";

pub const MIN_PASSWORD_LEN: usize = 6;

/// Bootstrap phase. `restore_session` publishes `Resolving` and then `Resolved`,
/// even when nothing was persisted. Never reverts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Resolving,
    Resolved,
}

/// Read-only copy of the session handed to readers and subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub credential: Option<BearerToken>,
    pub identity: Option<Identity>,
    pub phase: Phase,
    pub generation: u64,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool { self.identity.is_some() }

    pub fn is_resolved(&self) -> bool { self.phase == Phase::Resolved }
}

#[derive(Debug)]
struct SessionState {
    credential: Option<BearerToken>,
    identity: Option<Identity>,
    phase: Phase,
    generation: u64,
}

impl SessionState {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            credential: self.credential.clone(),
            identity: self.identity.clone(),
            phase: self.phase,
            generation: self.generation,
        }
    }
}

/// What `restore_session` did.
#[derive(Debug, Clone, PartialEq)]
pub enum RestoreOutcome {
    /// A restore already ran (or is running) for this store.
    Skipped,
    /// Nothing was persisted.
    NoStoredSession,
    Verified(Identity),
    /// The server (or the network) did not confirm the stored credential; the session was cleared.
    Rejected { code: &'static str },
    /// A login/logout happened while verification was in flight; the result was dropped.
    Discarded,
}

#[derive(Debug, Deserialize)]
struct LoginAnswer {
    token: BearerToken,
    user: Identity,
}

pub struct SessionStore {
    http: reqwest::Client,
    base: Url,
    storage: Arc<dyn SessionStorage>,
    state: RwLock<SessionState>,
    events: watch::Sender<SessionSnapshot>,
}

impl SessionStore {
    pub fn new(http: reqwest::Client, base: Url, storage: Arc<dyn SessionStorage>) -> Self {
        let state = SessionState { credential: None, identity: None, phase: Phase::Uninitialized, generation: 0 };
        let (events, _rx) = watch::channel(state.snapshot());
        Self { http, base, storage, state: RwLock::new(state), events }
    }

    /// Store backed by the configured state file.
    pub fn from_config(cfg: &ClientConfig) -> anyhow::Result<Self> {
        let storage: Arc<dyn SessionStorage> = Arc::new(FileStorage::new(&cfg.state_file));
        Ok(Self::new(cfg.http_client()?, cfg.api_base.clone(), storage))
    }

    pub fn http(&self) -> &reqwest::Client { &self.http }

    pub fn api_base(&self) -> &Url { &self.base }

    pub fn snapshot(&self) -> SessionSnapshot { self.state.read().snapshot() }

    pub fn identity(&self) -> Option<Identity> { self.state.read().identity.clone() }

    pub fn credential(&self) -> Option<BearerToken> { self.state.read().credential.clone() }

    pub fn phase(&self) -> Phase { self.state.read().phase }

    pub fn generation(&self) -> u64 { self.state.read().generation }

    pub fn is_authenticated(&self) -> bool { self.state.read().identity.is_some() }

    /// Credential to attach to an outgoing request, with the generation it belongs to.
    pub fn credential_for_request(&self) -> (Option<BearerToken>, u64) {
        let st = self.state.read();
        (st.credential.clone(), st.generation)
    }

    pub fn is_current(&self, generation: u64) -> bool { self.state.read().generation == generation }

    /// Receives a snapshot after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> { self.events.subscribe() }

    fn publish(&self, st: &SessionState) {
        self.events.send_replace(st.snapshot());
    }

    fn advance_generation(&self) -> u64 {
        let mut st = self.state.write();
        st.generation += 1;
        self.publish(&st);
        st.generation
    }

    fn clear_locked(&self, st: &mut SessionState, reason: &str) {
        if let Err(first) = self.storage.clear() {
            warn!(target: "session", error = %first, "clearing persisted session failed, retrying");
            if let Err(e) = self.storage.clear() {
                error!(target: "session", error = %e, reason, "persisted session could not be cleared");
            }
        }
        let had_identity = st.identity.take().is_some();
        st.credential = None;
        info!(target: "session", reason, had_identity, generation = st.generation, "session cleared");
        self.publish(st);
    }

    /// Authenticate against the backend. On success the credential and identity are
    /// persisted and set in memory together; on failure nothing changes.
    /// Navigation after login is the caller's decision.
    pub async fn login(&self, email: &str, password: &str) -> ClientResult<Identity> {
        validate_credentials(email, password)?;
        let generation = self.advance_generation();
        let url = endpoint(&self.base, LOGIN_ENDPOINT)?;
        let resp = self.http
            .post(url)
            .json(&json!({"email": email, "password": password}))
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            let err = classify_auth_failure(AuthEndpoint::Login, status, &body);
            info!(target: "session", code = err.code_str(), status = status.as_u16(), "login rejected");
            return Err(err.into());
        }
        let answer: LoginAnswer = serde_json::from_str(&body)?;

        let mut st = self.state.write();
        if st.generation != generation {
            info!(target: "session", started = generation, current = st.generation, "login result superseded");
            return Err(ClientError::Superseded);
        }
        let stored = StoredSession { token: answer.token, user: answer.user };
        self.storage.save(&stored)?;
        st.credential = Some(stored.token);
        st.identity = Some(stored.user.clone());
        info!(target: "session", user_id = stored.user.id, role = %stored.user.role, generation, "login succeeded");
        self.publish(&st);
        Ok(stored.user)
    }

    /// Create an account. Never touches the session; the user logs in afterwards.
    pub async fn register(&self, email: &str, password: &str) -> ClientResult<()> {
        validate_credentials(email, password)?;
        let url = endpoint(&self.base, REGISTER_ENDPOINT)?;
        let resp = self.http
            .post(url)
            .json(&json!({"email": email, "password": password}))
            .send()
            .await?;
        let status = resp.status();
        if status.is_success() {
            info!(target: "session", "registration accepted");
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        let err = classify_auth_failure(AuthEndpoint::Register, status, &body);
        info!(target: "session", code = err.code_str(), status = status.as_u16(), "registration rejected");
        Err(err.into())
    }

    /// Clear the credential, the identity and their persisted copies. Idempotent.
    pub fn logout(&self) {
        let mut st = self.state.write();
        st.generation += 1;
        self.clear_locked(&mut st, "logout");
    }

    /// Clear the session as `logout` does, but only if nothing has changed since
    /// `generation`. Returns whether this call cleared it, so concurrent rejections
    /// of the same session collapse into one invalidation.
    pub fn invalidate(&self, generation: u64) -> bool {
        let mut st = self.state.write();
        if st.generation != generation {
            debug!(target: "session", stale = generation, current = st.generation, "ignoring stale invalidation");
            return false;
        }
        st.generation += 1;
        self.clear_locked(&mut st, "rejected by server");
        true
    }

    /// Hydrate the session from durable storage and confirm it with the server.
    /// Runs once per store; any verification failure clears the session.
    pub async fn restore_session(&self) -> RestoreOutcome {
        let started = {
            let mut st = self.state.write();
            if st.phase != Phase::Uninitialized {
                warn!(target: "session", phase = ?st.phase, "restore already attempted");
                return RestoreOutcome::Skipped;
            }
            st.phase = Phase::Resolving;
            self.publish(&st);
            st.generation
        };

        // Read the file without holding the state lock.
        let stored = self.storage.load().unwrap_or_else(|e| {
            warn!(target: "session", error = %e, "unreadable persisted session");
            None
        });

        let (token, generation) = {
            let mut st = self.state.write();
            if st.generation != started {
                st.phase = Phase::Resolved;
                info!(target: "session", started, current = st.generation, "restore superseded before verification");
                self.publish(&st);
                return RestoreOutcome::Discarded;
            }
            match stored {
                None => {
                    st.phase = Phase::Resolved;
                    self.publish(&st);
                    return RestoreOutcome::NoStoredSession;
                }
                Some(s) => {
                    st.credential = Some(s.token.clone());
                    self.publish(&st);
                    (s.token, st.generation)
                }
            }
        };

        let verified = self.fetch_identity(&token).await;

        let mut st = self.state.write();
        st.phase = Phase::Resolved;
        if st.generation != generation {
            info!(target: "session", started = generation, current = st.generation, "restore result discarded");
            if st.identity.is_none() && st.credential.as_ref() == Some(&token) {
                // Nothing newer replaced the staged credential: drop it with its
                // persisted copy and retire requests that carried it.
                st.generation += 1;
                self.clear_locked(&mut st, "restore superseded");
            } else {
                self.publish(&st);
            }
            return RestoreOutcome::Discarded;
        }
        match verified {
            Ok(identity) => {
                let refreshed = StoredSession { token, user: identity.clone() };
                if let Err(e) = self.storage.save(&refreshed) {
                    warn!(target: "session", error = %e, "failed to refresh persisted user");
                }
                st.identity = Some(identity.clone());
                info!(target: "session", user_id = identity.id, role = %identity.role, "session restored");
                self.publish(&st);
                RestoreOutcome::Verified(identity)
            }
            Err(e) => {
                let code = e.code_str();
                warn!(target: "session", code, error = %e, "stored session not confirmed");
                self.clear_locked(&mut st, "restore failed");
                RestoreOutcome::Rejected { code }
            }
        }
    }

    async fn fetch_identity(&self, token: &BearerToken) -> ClientResult<Identity> {
        let url = endpoint(&self.base, CURRENT_USER_ENDPOINT)?;
        let resp = self.http
            .get(url)
            .header(reqwest::header::AUTHORIZATION, token.header_value())
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        if status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::SessionInvalid);
        }
        if !status.is_success() {
            return Err(ClientError::Api { status: status.as_u16(), message: payload_message(status, &body) });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

/// Both fields are required before anything is sent.
pub fn validate_credentials(email: &str, password: &str) -> Result<(), AuthError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(AuthError::validation("email and password are required"));
    }
    Ok(())
}

/// Checks the registration form applies before calling `register`.
pub fn validate_registration(email: &str, password: &str, confirm: &str) -> Result<(), AuthError> {
    if email.trim().is_empty() || password.is_empty() || confirm.is_empty() {
        return Err(AuthError::validation("all fields are required"));
    }
    if password != confirm {
        return Err(AuthError::validation("passwords do not match"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::validation(format!("password must be at least {} characters", MIN_PASSWORD_LEN)));
    }
    Ok(())
}
