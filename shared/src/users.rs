use crate::navigation::{resolve, Route};
use crate::responses::{error_response, json_response, not_found};
use crate::session::Session;
use crate::types::User;
use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::Serialize;

#[derive(Serialize)]
pub struct NavigationResponse {
    /// `render`, `redirect` or `accessDenied`
    pub action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<&'static str>,
}

/// Get current user profile
pub fn get_me(session: &Session) -> Result<Response<Body>, Error> {
    json_response(StatusCode::OK, &session.user)
}

/// Decide what the client shows for `path`. `user` is `None` when signed out.
pub fn navigate(path: Option<&str>, user: Option<&User>) -> Result<Response<Body>, Error> {
    let Some(path) = path else {
        return error_response(StatusCode::BAD_REQUEST, "InvalidRequest", "path is required");
    };
    let Some(route) = Route::from_path(path) else {
        return not_found();
    };

    let decision = resolve(route, user);
    tracing::info!("Navigation to {} resolved to {}", path, decision.action());
    json_response(
        StatusCode::OK,
        &NavigationResponse {
            action: decision.action(),
            route: decision.route().map(|r| r.path()),
        },
    )
}
