//! Startup session verification.
//!
//! Runs once, before the first real routing decision: hydrate the session from
//! durable storage and have the server confirm it. Until this settles the phase is
//! not `Resolved` and `routes::resolve` renders `Loading`.

use tokio::sync::watch;
use tracing::info;

use crate::identity::{Identity, RestoreOutcome, SessionSnapshot, SessionStore};

#[derive(Debug, Clone, PartialEq)]
pub enum BootstrapOutcome {
    Anonymous,
    Authenticated(Identity),
    /// Verification had already been run for this store.
    AlreadyResolved,
}

pub async fn verify(store: &SessionStore) -> BootstrapOutcome {
    let outcome = match store.restore_session().await {
        RestoreOutcome::Skipped => BootstrapOutcome::AlreadyResolved,
        RestoreOutcome::Verified(identity) => BootstrapOutcome::Authenticated(identity),
        RestoreOutcome::NoStoredSession | RestoreOutcome::Rejected { .. } => BootstrapOutcome::Anonymous,
        // Someone logged in or out meanwhile; report what the store holds now.
        RestoreOutcome::Discarded => match store.identity() {
            Some(identity) => BootstrapOutcome::Authenticated(identity),
            None => BootstrapOutcome::Anonymous,
        },
    };
    info!(target: "bootstrap", outcome = ?outcome, "session verification finished");
    outcome
}

/// Wait until the session phase is resolved and return that snapshot.
/// Returns `None` if the store was dropped first.
pub async fn wait_resolved(rx: &mut watch::Receiver<SessionSnapshot>) -> Option<SessionSnapshot> {
    rx.wait_for(|s| s.is_resolved()).await.ok().map(|s| s.clone())
}
