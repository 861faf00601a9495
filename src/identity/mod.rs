//! Client-side identity and session management.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod storage;
mod session;
mod authorizer;

pub use principal::{BearerToken, Identity, Role};
pub use storage::{FileStorage, MemoryStorage, SessionStorage, StoredSession};
pub use session::{
    validate_credentials, validate_registration, Phase, RestoreOutcome, SessionSnapshot, SessionStore,
    CURRENT_USER_ENDPOINT, LOGIN_ENDPOINT, MIN_PASSWORD_LEN, REGISTER_ENDPOINT,
};
pub use authorizer::{guard, Decision, Redirect, LANDING_PATH, LOGIN_PATH};
