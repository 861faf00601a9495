//! taskdesk client core: the session a task manager front end runs on.
//!
//! - `identity`: session store (login/logout/register/restore), durable storage and the access guard.
//! - `client`: authenticated HTTP pipeline used by every resource call.
//! - `routes`: route table and per-navigation render decisions.
//! - `bootstrap`: one-shot startup verification of a persisted session.

pub mod error;
pub mod config;
pub mod identity;
pub mod client;
pub mod routes;
pub mod bootstrap;

pub use client::{ApiClient, HistoryNavigator, Navigator};
pub use config::ClientConfig;
pub use error::{AuthError, ClientError, ClientResult};
pub use identity::{Identity, Role, SessionSnapshot, SessionStore};
