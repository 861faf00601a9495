//! Application route table and the render decision for a path.
//!
//! `resolve` is what a renderer calls on every navigation. Until the bootstrap
//! phase is resolved it only ever answers `Loading`, so no guard or
//! redirect-if-authenticated rule runs against a session that is not settled yet.

use crate::identity::{guard, Decision, Role, SessionSnapshot, LANDING_PATH, LOGIN_PATH};

pub const REGISTER_PATH: &str = "/register";
pub const TASKS_PATH: &str = "/tasks";
pub const ADMIN_DASHBOARD_PATH: &str = "/admin/dashboard";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login,
    Register,
    Landing,
    Tasks,
    NewTask,
    TaskDetails(i64),
    EditTask(i64),
    AdminDashboard,
    NotFound,
}

/// Who may see a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Only while anonymous; authenticated users are sent to the landing view.
    AnonymousOnly,
    Authenticated,
    Role(Role),
    /// Redirects only, never rendered.
    Redirect,
}

impl Route {
    pub fn parse(path: &str) -> Route {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            [] => Route::Landing,
            ["login"] => Route::Login,
            ["register"] => Route::Register,
            ["tasks"] => Route::Tasks,
            ["tasks", "new"] => Route::NewTask,
            ["tasks", id] => id.parse().map(Route::TaskDetails).unwrap_or(Route::NotFound),
            ["tasks", id, "edit"] => id.parse().map(Route::EditTask).unwrap_or(Route::NotFound),
            ["admin", "dashboard"] => Route::AdminDashboard,
            _ => Route::NotFound,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Login => LOGIN_PATH.to_string(),
            Route::Register => REGISTER_PATH.to_string(),
            Route::Landing | Route::NotFound => LANDING_PATH.to_string(),
            Route::Tasks => TASKS_PATH.to_string(),
            Route::NewTask => format!("{}/new", TASKS_PATH),
            Route::TaskDetails(id) => format!("{}/{}", TASKS_PATH, id),
            Route::EditTask(id) => format!("{}/{}/edit", TASKS_PATH, id),
            Route::AdminDashboard => ADMIN_DASHBOARD_PATH.to_string(),
        }
    }

    pub fn access(&self) -> Access {
        match self {
            Route::Login | Route::Register => Access::AnonymousOnly,
            Route::Tasks | Route::NewTask | Route::TaskDetails(_) | Route::EditTask(_) => Access::Authenticated,
            Route::AdminDashboard => Access::Role(Role::Admin),
            Route::Landing | Route::NotFound => Access::Redirect,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Render {
    /// Session not settled yet; show a neutral loading state.
    Loading,
    Show(Route),
    Redirect(String),
}

/// Home view for a role, used after login and from the landing view.
pub fn landing_for(role: Role) -> &'static str {
    match role {
        Role::Admin => ADMIN_DASHBOARD_PATH,
        Role::User => TASKS_PATH,
    }
}

pub fn resolve(session: &SessionSnapshot, path: &str) -> Render {
    if !session.is_resolved() {
        return Render::Loading;
    }
    let route = Route::parse(path);
    match route.access() {
        Access::AnonymousOnly => {
            if session.is_authenticated() {
                Render::Redirect(LANDING_PATH.to_string())
            } else {
                Render::Show(route)
            }
        }
        Access::Redirect => {
            if route == Route::NotFound {
                return Render::Redirect(LANDING_PATH.to_string());
            }
            match session.identity.as_ref() {
                Some(identity) => Render::Redirect(landing_for(identity.role).to_string()),
                None => Render::Redirect(LOGIN_PATH.to_string()),
            }
        }
        Access::Authenticated => decide(session, None, route),
        Access::Role(role) => decide(session, Some(role), route),
    }
}

fn decide(session: &SessionSnapshot, required: Option<Role>, route: Route) -> Render {
    match guard(session, required) {
        Decision::Allow => Render::Show(route),
        Decision::Deny { redirect } => Render::Redirect(redirect.path().to_string()),
    }
}
