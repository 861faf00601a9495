//! Authenticated HTTP pipeline for everything that is not an auth endpoint.
//!
//! Outgoing: the current bearer credential, if any, is attached.
//! Incoming: a 401 from any endpoint means the whole session is dead. It is
//! cleared through the store and the application is reloaded on the login view,
//! unless it is already there. The generation captured when the request was sent
//! decides whether a late response may still act.

use std::sync::Arc;

use reqwest::header::AUTHORIZATION;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::navigator::Navigator;
use crate::config::endpoint;
use crate::error::{payload_message, ClientError, ClientResult};
use crate::identity::{SessionStore, LOGIN_PATH};

#[derive(Clone)]
pub struct ApiClient {
    session: Arc<SessionStore>,
    navigator: Arc<dyn Navigator>,
}

impl ApiClient {
    pub fn new(session: Arc<SessionStore>, navigator: Arc<dyn Navigator>) -> Self {
        Self { session, navigator }
    }

    pub fn session(&self) -> &Arc<SessionStore> { &self.session }

    pub fn navigator(&self) -> &Arc<dyn Navigator> { &self.navigator }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let text = self.execute::<Value>(Method::GET, path, None).await?;
        decode(&text)
    }

    pub async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ClientResult<T> {
        let text = self.execute(Method::POST, path, Some(body)).await?;
        decode(&text)
    }

    pub async fn put_json<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ClientResult<T> {
        let text = self.execute(Method::PUT, path, Some(body)).await?;
        decode(&text)
    }

    pub async fn patch_json<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ClientResult<T> {
        let text = self.execute(Method::PATCH, path, Some(body)).await?;
        decode(&text)
    }

    pub async fn delete(&self, path: &str) -> ClientResult<Value> {
        let text = self.execute::<Value>(Method::DELETE, path, None).await?;
        decode(&text)
    }

    async fn execute<B: Serialize + ?Sized>(&self, method: Method, path: &str, body: Option<&B>) -> ClientResult<String> {
        let url = endpoint(self.session.api_base(), path)?;
        let (credential, generation) = self.session.credential_for_request();
        let mut req = self.session.http().request(method.clone(), url);
        if let Some(token) = &credential {
            req = req.header(AUTHORIZATION, token.header_value());
        }
        if let Some(b) = body {
            req = req.json(b);
        }
        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        debug!(target: "http", %method, path, status = status.as_u16(), authenticated = credential.is_some(), "response");
        self.inspect(status, &text, credential.is_some(), generation)?;
        Ok(text)
    }

    fn inspect(&self, status: StatusCode, body: &str, authenticated: bool, generation: u64) -> ClientResult<()> {
        if status == StatusCode::UNAUTHORIZED {
            self.on_unauthorized(generation);
            return Err(ClientError::SessionInvalid);
        }
        // Data fetched for a session that no longer exists must not reach a view.
        if authenticated && !self.session.is_current(generation) {
            return Err(ClientError::Superseded);
        }
        if !status.is_success() {
            return Err(ClientError::Api { status: status.as_u16(), message: payload_message(status, body) });
        }
        Ok(())
    }

    fn on_unauthorized(&self, generation: u64) {
        let here = self.navigator.current_path();
        if strip_query(&here) == LOGIN_PATH {
            debug!(target: "http", "401 while on the login view; no action");
            return;
        }
        if self.session.invalidate(generation) {
            warn!(target: "http", from = %here, "session rejected by server; reloading to login");
            self.navigator.reload_to(LOGIN_PATH);
        }
    }
}

fn strip_query(path: &str) -> &str {
    path.split(['?', '#']).next().unwrap_or(path)
}

fn decode<T: DeserializeOwned>(text: &str) -> ClientResult<T> {
    if text.trim().is_empty() {
        return Ok(serde_json::from_value(Value::Null)?);
    }
    Ok(serde_json::from_str(text)?)
}
