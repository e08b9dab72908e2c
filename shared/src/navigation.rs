use crate::error::ComplaintError;
use crate::session::Session;
use crate::types::{Role, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Register,
    /// Submission form and complaint history.
    Submission,
    Triage,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/auth/login",
            Route::Register => "/auth/register",
            Route::Submission => "/user",
            Route::Triage => "/admin",
        }
    }

    pub fn from_path(path: &str) -> Option<Route> {
        match path.trim_end_matches('/') {
            "/auth/login" => Some(Route::Login),
            "/auth/register" => Some(Route::Register),
            "/user" => Some(Route::Submission),
            "/admin" => Some(Route::Triage),
            _ => None,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Route::Login | Route::Register)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Render(Route),
    Redirect(Route),
    /// Rendered in place, no redirect.
    AccessDenied,
}

impl Navigation {
    pub fn action(&self) -> &'static str {
        match self {
            Navigation::Render(_) => "render",
            Navigation::Redirect(_) => "redirect",
            Navigation::AccessDenied => "accessDenied",
        }
    }

    /// Route to show; `None` when access is denied.
    pub fn route(&self) -> Option<Route> {
        match self {
            Navigation::Render(route) | Navigation::Redirect(route) => Some(*route),
            Navigation::AccessDenied => None,
        }
    }
}

/// Where a user lands after signing in.
pub fn landing_route(role: Role) -> Route {
    match role {
        Role::Faculty => Route::Triage,
        Role::Student | Role::Admin => Route::Submission,
    }
}

pub fn resolve(route: Route, user: Option<&User>) -> Navigation {
    match user {
        None if route.is_auth() => Navigation::Render(route),
        None => Navigation::Redirect(Route::Login),
        Some(user) if route.is_auth() => Navigation::Redirect(landing_route(user.role)),
        Some(user) if route == Route::Triage && !user.is_faculty() => Navigation::AccessDenied,
        Some(_) => Navigation::Render(route),
    }
}

/// Faculty of `department` may triage its complaints.
pub fn authorize_triage(session: &Session, department: &str) -> Result<(), ComplaintError> {
    if session.user.is_faculty() && session.user.department == department {
        Ok(())
    } else {
        tracing::warn!(
            "Triage denied for {} ({}) on department {}",
            session.user.user_id,
            session.user.role.as_str(),
            department
        );
        Err(ComplaintError::AccessDenied)
    }
}
