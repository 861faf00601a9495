//! HTTP side of the session: the authenticated request pipeline and the
//! navigation seam it uses when the server rejects the session.

mod api;
mod navigator;

pub use api::ApiClient;
pub use navigator::{HistoryNavigator, Navigator};
