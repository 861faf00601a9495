//! Client error model and backend status classification.
//! `AuthError` covers failures of the auth endpoints that callers display inline;
//! `ClientError` is what every operation of the crate returns.

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("{0}")]
    InvalidCredentials(String),
    #[error("{0}")]
    DuplicateEmail(String),
    #[error("{0}")]
    Validation(String),
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
}

impl AuthError {
    pub fn code_str(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials(_) => "invalid_credentials",
            AuthError::DuplicateEmail(_) => "duplicate_email",
            AuthError::Validation(_) => "validation_error",
            AuthError::Server { .. } => "server_error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AuthError::InvalidCredentials(m)
            | AuthError::DuplicateEmail(m)
            | AuthError::Validation(m)
            | AuthError::Server { message: m, .. } => m.as_str(),
        }
    }

    pub fn validation<S: Into<String>>(msg: S) -> Self { AuthError::Validation(msg.into()) }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// Any 401 on an authenticated call. The session has already been cleared
    /// centrally by the time a caller sees this.
    #[error("session is no longer valid")]
    SessionInvalid,
    #[error("request failed ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("invalid endpoint {0}")]
    Endpoint(String),
    #[error("session storage: {0}")]
    Storage(String),
    /// The result arrived after a later login/logout and was discarded.
    #[error("result discarded: session changed while the request was in flight")]
    Superseded,
}

impl ClientError {
    pub fn code_str(&self) -> &'static str {
        match self {
            ClientError::Network(_) => "network_error",
            ClientError::Auth(e) => e.code_str(),
            ClientError::SessionInvalid => "session_invalid",
            ClientError::Api { .. } => "api_error",
            ClientError::Decode(_) => "decode_error",
            ClientError::Endpoint(_) => "endpoint_error",
            ClientError::Storage(_) => "storage_error",
            ClientError::Superseded => "superseded",
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self { ClientError::Decode(err.to_string()) }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self { ClientError::Storage(err.to_string()) }
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Which auth endpoint produced a failure; the same status means different
/// things on login and register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEndpoint {
    Login,
    Register,
}

/// Pull a human readable message out of a backend error payload.
/// The backend answers `{"error": ...}`; the JWT layer answers `{"msg": ...}`.
pub fn payload_message(status: StatusCode, body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| {
            ["error", "msg", "message"]
                .iter()
                .find_map(|k| v.get(*k).and_then(|m| m.as_str()))
        })
        .map(|s| s.to_string())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string())
}

/// Map a failed auth endpoint response to an `AuthError`.
pub fn classify_auth_failure(endpoint: AuthEndpoint, status: StatusCode, body: &str) -> AuthError {
    let message = payload_message(status, body);
    if status.is_server_error() {
        return AuthError::Server { status: status.as_u16(), message };
    }
    match (endpoint, status.as_u16()) {
        (AuthEndpoint::Login, 401 | 403) => AuthError::InvalidCredentials(message),
        (AuthEndpoint::Login, 409) => AuthError::DuplicateEmail(message),
        (AuthEndpoint::Register, 400 | 409) => AuthError::DuplicateEmail(message),
        (_, s) if (400..500).contains(&s) => AuthError::Validation(message),
        (_, s) => AuthError::Server { status: s, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_status_mapping() {
        let e = classify_auth_failure(AuthEndpoint::Login, StatusCode::UNAUTHORIZED, r#"{"error":"Credenciales invalidas"}"#);
        assert_eq!(e, AuthError::InvalidCredentials("Credenciales invalidas".into()));
        let e = classify_auth_failure(AuthEndpoint::Login, StatusCode::UNPROCESSABLE_ENTITY, r#"{"error":"bad"}"#);
        assert_eq!(e.code_str(), "validation_error");
        let e = classify_auth_failure(AuthEndpoint::Login, StatusCode::INTERNAL_SERVER_ERROR, "");
        assert_eq!(e, AuthError::Server { status: 500, message: "Internal Server Error".into() });
    }

    #[test]
    fn register_status_mapping() {
        let e = classify_auth_failure(AuthEndpoint::Register, StatusCode::BAD_REQUEST, r#"{"error":"taken"}"#);
        assert_eq!(e, AuthError::DuplicateEmail("taken".into()));
        let e = classify_auth_failure(AuthEndpoint::Register, StatusCode::METHOD_NOT_ALLOWED, "");
        assert_eq!(e.code_str(), "validation_error");
        assert_eq!(e.message(), "Method Not Allowed");
    }

    #[test]
    fn payload_message_prefers_error_then_msg() {
        assert_eq!(payload_message(StatusCode::UNAUTHORIZED, r#"{"msg":"Token has expired"}"#), "Token has expired");
        assert_eq!(payload_message(StatusCode::BAD_REQUEST, r#"{"error":"a","msg":"b"}"#), "a");
        assert_eq!(payload_message(StatusCode::NOT_FOUND, "<html>"), "Not Found");
    }

    #[test]
    fn client_error_codes() {
        assert_eq!(ClientError::SessionInvalid.code_str(), "session_invalid");
        assert_eq!(ClientError::from(AuthError::validation("x")).code_str(), "validation_error");
        assert_eq!(ClientError::Superseded.code_str(), "superseded");
    }
}
