use super::principal::Role;
use super::session::SessionSnapshot;

pub const LOGIN_PATH: &str = "/login";
/// Default landing view; it forwards each role to its home.
pub const LANDING_PATH: &str = "/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redirect {
    Login,
    Landing,
}

impl Redirect {
    pub fn path(&self) -> &'static str {
        match self {
            Redirect::Login => LOGIN_PATH,
            Redirect::Landing => LANDING_PATH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny { redirect: Redirect },
}

/// Access decision for a protected view. No I/O; rendering the redirect is the caller's job.
///
/// Anonymous sessions go to login. An authenticated user lacking `required`
/// goes to the landing view instead, since logging in again would not help.
pub fn guard(session: &SessionSnapshot, required: Option<Role>) -> Decision {
    let Some(identity) = session.identity.as_ref() else {
        return Decision::Deny { redirect: Redirect::Login };
    };
    match required {
        Some(role) if identity.role != role => {
            tracing::debug!(target: "routes", required = %role, actual = %identity.role, "access denied");
            Decision::Deny { redirect: Redirect::Landing }
        }
        _ => Decision::Allow,
    }
}
