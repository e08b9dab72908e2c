use crate::error::{AuthError, ComplaintError};
use crate::navigation::Route;
use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    /// Where the client should navigate next.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(serde_json::to_string(value)?.into())
        .map_err(Box::new)?)
}

pub fn error_response(status: StatusCode, error: &str, message: impl Into<String>) -> Result<Response<Body>, Error> {
    json_response(
        status,
        &ErrorResponse {
            error: error.to_string(),
            message: message.into(),
            redirect: None,
        },
    )
}

/// 401 for a missing or expired session; the client goes back to login.
pub fn unauthenticated() -> Result<Response<Body>, Error> {
    json_response(
        StatusCode::UNAUTHORIZED,
        &ErrorResponse {
            error: "Unauthenticated".to_string(),
            message: AuthError::Unauthenticated.to_string(),
            redirect: Some(Route::Login.path().to_string()),
        },
    )
}

/// CORS preflight
pub fn preflight() -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET,POST,PATCH,OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type,Authorization,X-User-Id")
        .body(Body::Empty)
        .map_err(Box::new)?)
}

pub fn not_found() -> Result<Response<Body>, Error> {
    error_response(StatusCode::NOT_FOUND, "NotFound", "Not found")
}

pub fn method_not_allowed() -> Result<Response<Body>, Error> {
    error_response(StatusCode::METHOD_NOT_ALLOWED, "MethodNotAllowed", "Method not allowed")
}

/// Parse a JSON request body, or produce the 400 to return instead.
pub fn parse_body<T: DeserializeOwned>(body: &Body) -> Result<T, Result<Response<Body>, Error>> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::error!("Failed to parse request body: {}", e);
        error_response(
            StatusCode::BAD_REQUEST,
            "InvalidRequest",
            format!("Invalid request body: {}", e),
        )
    })
}

pub fn auth_error_response(error: &AuthError) -> Result<Response<Body>, Error> {
    let (status, code) = match error {
        AuthError::InvalidCredentials
        | AuthError::UserNotConfirmed
        | AuthError::UserNotFound
        | AuthError::PasswordResetRequired
        | AuthError::TooManyRequests => (StatusCode::UNAUTHORIZED, "AuthenticationFailed"),
        AuthError::Unauthenticated => return unauthenticated(),
        AuthError::AccountExists | AuthError::InvalidPassword => {
            (StatusCode::BAD_REQUEST, "SignupFailed")
        }
        AuthError::ProfileMissing(_) => (StatusCode::NOT_FOUND, "ProfileMissing"),
        AuthError::Provider(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ProviderError"),
    };
    if status.is_server_error() {
        tracing::error!("Identity provider failure: {}", error);
        return error_response(status, code, "Authentication service unavailable");
    }
    error_response(status, code, error.to_string())
}

pub fn complaint_error_response(error: &ComplaintError) -> Result<Response<Body>, Error> {
    match error {
        ComplaintError::Validation(message) => {
            error_response(StatusCode::BAD_REQUEST, "ValidationError", message.clone())
        }
        ComplaintError::Auth(auth) => auth_error_response(auth),
        ComplaintError::AccessDenied => {
            error_response(StatusCode::FORBIDDEN, "AccessDenied", error.to_string())
        }
        ComplaintError::NotFound(_) => {
            error_response(StatusCode::NOT_FOUND, "NotFound", error.to_string())
        }
        ComplaintError::Update(_) | ComplaintError::Store(_) => {
            tracing::error!("Store failure: {}", error);
            error_response(StatusCode::BAD_GATEWAY, "UpdateError", error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    fn decode(response: &Response<Body>) -> ErrorResponse {
        serde_json::from_slice(response.body()).unwrap()
    }

    #[test]
    fn test_unauthenticated_carries_login_redirect() {
        let response = complaint_error_response(&AuthError::Unauthenticated.into()).unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(decode(&response).redirect.as_deref(), Some("/auth/login"));
    }

    #[test]
    fn test_complaint_error_statuses() {
        let cases = [
            (ComplaintError::Validation("empty".to_string()), StatusCode::BAD_REQUEST),
            (ComplaintError::AccessDenied, StatusCode::FORBIDDEN),
            (ComplaintError::NotFound("c1".to_string()), StatusCode::NOT_FOUND),
            (
                ComplaintError::Update(StoreError::Backend("throttled".to_string())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ComplaintError::Auth(AuthError::Provider("timeout".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            let response = complaint_error_response(&error).unwrap();
            assert_eq!(response.status(), status, "{:?}", error);
            assert!(decode(&response).redirect.is_none());
        }
    }

    #[test]
    fn test_bad_credentials_do_not_redirect() {
        let response = auth_error_response(&AuthError::InvalidCredentials).unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = decode(&response);
        assert_eq!(body.message, "Incorrect email or password");
        assert!(body.redirect.is_none());
    }

    #[test]
    fn test_parse_body_rejects_bad_json() {
        let result: Result<crate::types::ReplyRequest, _> = parse_body(&Body::from("{oops"));
        let response = result.unwrap_err().unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(decode(&response).error, "InvalidRequest");
    }
}
