use crate::identity::IdentityProvider;
use crate::navigation::landing_route;
use crate::responses::{auth_error_response, error_response, json_response, parse_body, unauthenticated};
use crate::session::Session;
use crate::types::{RegisterRequest, User};
use lambda_http::{http::HeaderMap, http::StatusCode, Body, Error, Response};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub id_token: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i32,
    pub user: User,
    /// Route the client should open after signing in.
    pub landing: &'static str,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub user_id: String,
    pub message: String,
}

/// Handle user login
pub async fn login(identity: &dyn IdentityProvider, body: &Body) -> Result<Response<Body>, Error> {
    tracing::info!("Login request received");

    let request: LoginRequest = match parse_body(body) {
        Ok(req) => req,
        Err(response) => return response,
    };

    match Session::establish(identity, &request.email, &request.password).await {
        Ok((session, credentials)) => {
            let landing = landing_route(session.user.role).path();
            tracing::info!("Login successful for {} ({})", request.email, session.user.role.as_str());
            json_response(
                StatusCode::OK,
                &LoginResponse {
                    id_token: credentials.id_token,
                    access_token: credentials.access_token,
                    refresh_token: credentials.refresh_token,
                    expires_in: credentials.expires_in,
                    user: session.user,
                    landing,
                },
            )
        }
        Err(e) => {
            tracing::error!("Login failed for {}: {}", request.email, e);
            auth_error_response(&e)
        }
    }
}

/// Handle account registration. New accounts are always students.
pub async fn register(identity: &dyn IdentityProvider, body: &Body) -> Result<Response<Body>, Error> {
    tracing::info!("Register request received");

    let request: RegisterRequest = match parse_body(body) {
        Ok(req) => req,
        Err(response) => return response,
    };

    if request.email.trim().is_empty() || request.department.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "InvalidRequest",
            "Email and department are required",
        );
    }

    match identity.register(&request).await {
        Ok(user_id) => json_response(
            StatusCode::CREATED,
            &RegisterResponse {
                user_id,
                message: "Account created successfully. You can now log in.".to_string(),
            },
        ),
        Err(e) => {
            tracing::error!("Registration failed for {}: {}", request.email, e);
            auth_error_response(&e)
        }
    }
}

/// Handle logout with the bearer access token.
pub async fn logout(identity: &dyn IdentityProvider, headers: &HeaderMap) -> Result<Response<Body>, Error> {
    let Some(token) = bearer_token(headers) else {
        return unauthenticated();
    };

    match identity.sign_out(token).await {
        Ok(()) => json_response(StatusCode::OK, &serde_json::json!({"message": "Signed out"})),
        Err(e) => {
            tracing::warn!("Sign out failed: {}", e);
            auth_error_response(&e)
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
