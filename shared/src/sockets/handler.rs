use super::connections::{remove_connection, save_connection};
use crate::navigation::authorize_triage;
use crate::responses::{auth_error_response, complaint_error_response, error_response};
use crate::AppState;
use lambda_http::request::RequestContext;
use lambda_http::{http::StatusCode, Body, Error, Request, RequestExt, Response};
use std::sync::Arc;

/// Route key and connection id of an API Gateway WebSocket event.
/// `None` for REST and HTTP API requests.
pub fn websocket_route(event: &Request) -> Option<(String, String)> {
    match event.request_context_ref()? {
        RequestContext::WebSocket(ctx) => Some((
            ctx.route_key.clone().unwrap_or_default(),
            ctx.connection_id.clone().unwrap_or_default(),
        )),
        _ => None,
    }
}

pub fn is_websocket_event(event: &Request) -> bool {
    websocket_route(event).is_some()
}

/// Handle WebSocket events ($connect, $disconnect, $default)
pub async fn handle_websocket_event(
    event: Request,
    state: Arc<AppState>,
) -> Result<Response<Body>, Error> {
    let Some((route_key, connection_id)) = websocket_route(&event) else {
        return error_response(StatusCode::BAD_REQUEST, "InvalidRequest", "Not a WebSocket event");
    };

    tracing::info!("WebSocket event: {} for connection: {}", route_key, connection_id);

    match route_key.as_str() {
        "$connect" if connection_id.is_empty() => {
            error_response(StatusCode::BAD_REQUEST, "InvalidRequest", "Missing connection id")
        }
        "$connect" => handle_connect(&event, &state, &connection_id).await,
        "$disconnect" => handle_disconnect(&state, &connection_id).await,
        _ => {
            // Clients only listen; the feed is server-pushed.
            tracing::warn!("Unsupported WebSocket route: {}", route_key);
            error_response(StatusCode::BAD_REQUEST, "InvalidRequest", "Unsupported route")
        }
    }
}

/// `$connect?department=<d>`: faculty of `d` subscribe to its live feed.
async fn handle_connect(
    event: &Request,
    state: &AppState,
    connection_id: &str,
) -> Result<Response<Body>, Error> {
    let session = match state.caller_session(event).await {
        Ok(session) => session,
        Err(e) => return auth_error_response(&e),
    };

    let department = event
        .query_string_parameters_ref()
        .and_then(|params| params.first("department"))
        .map(|s| s.to_string())
        .unwrap_or_else(|| session.user.department.clone());

    if let Err(e) = authorize_triage(&session, &department) {
        return complaint_error_response(&e);
    }

    let Some(dynamo_client) = &state.dynamo_client else {
        tracing::error!("No connection registry configured");
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Unavailable",
            "Live updates are not available",
        );
    };

    save_connection(
        dynamo_client,
        &state.config.table_name,
        connection_id,
        session.user_id(),
        &department,
    )
    .await?;

    Ok(Response::builder()
        .status(StatusCode::OK)
        .body(Body::Empty)
        .map_err(Box::new)?)
}

/// `$disconnect`: the client unsubscribed or went away.
async fn handle_disconnect(state: &AppState, connection_id: &str) -> Result<Response<Body>, Error> {
    tracing::info!("WebSocket disconnect: {}", connection_id);

    if let Some(dynamo_client) = &state.dynamo_client {
        remove_connection(dynamo_client, &state.config.table_name, connection_id).await?;
    }

    Ok(Response::builder()
        .status(StatusCode::OK)
        .body(Body::Empty)
        .map_err(Box::new)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::identity::MemoryIdentityProvider;
    use crate::store::MemoryComplaintStore;
    use crate::types::{Role, User};
    use lambda_http::request::LambdaRequest;
    use serde_json::json;

    fn config() -> Config {
        Config {
            table_name: "complaint-box".to_string(),
            owner_index: "GSI1".to_string(),
            department_index: "GSI2".to_string(),
            cognito_client_id: String::new(),
            cognito_client_secret: String::new(),
            cognito_user_pool_id: None,
            ws_api_endpoint: None,
            allow_user_header: true,
        }
    }

    async fn state() -> Arc<AppState> {
        let identity = Arc::new(MemoryIdentityProvider::new());
        for (user_id, role) in [("fac-cs", Role::Faculty), ("student-a", Role::Student)] {
            identity
                .insert_user(
                    User {
                        user_id: user_id.to_string(),
                        email: format!("{}@example.edu", user_id),
                        department: "CS".to_string(),
                        year: None,
                        section: None,
                        role,
                    },
                    "password1",
                )
                .await;
        }
        AppState::new(config(), Arc::new(MemoryComplaintStore::new()), identity, None)
    }

    /// An API Gateway WebSocket event as delivered to the function.
    fn websocket_event(
        route_key: &str,
        event_type: &str,
        user_id: Option<&str>,
        department: Option<&str>,
    ) -> Request {
        let mut headers = json!({
            "Host": "abc123.execute-api.us-east-1.amazonaws.com",
            "Sec-WebSocket-Key": "dGhlIHNhbXBsZSBub25jZQ==",
            "Sec-WebSocket-Version": "13"
        });
        if let Some(user_id) = user_id {
            headers["X-User-Id"] = json!(user_id);
        }
        let mut payload = json!({
            "headers": headers,
            "requestContext": {
                "routeKey": route_key,
                "eventType": event_type,
                "extendedRequestId": "ext-1",
                "requestTime": "01/Mar/2024:09:30:00 +0000",
                "messageDirection": "IN",
                "stage": "prod",
                "connectedAt": 1709285400000i64,
                "requestTimeEpoch": 1709285400000i64,
                "identity": {"sourceIp": "10.0.0.13"},
                "requestId": "req-1",
                "domainName": "abc123.execute-api.us-east-1.amazonaws.com",
                "connectionId": "conn-1",
                "apiId": "abc123"
            },
            "isBase64Encoded": false
        });
        if let Some(department) = department {
            payload["queryStringParameters"] = json!({ "department": department });
        }
        let request: LambdaRequest = serde_json::from_value(payload).unwrap();
        Request::from(request)
    }

    fn connect(user_id: Option<&str>, department: &str) -> Request {
        websocket_event("$connect", "CONNECT", user_id, Some(department))
    }

    #[test]
    fn test_route_and_connection_come_from_request_context() {
        let event = connect(Some("fac-cs"), "CS");
        assert!(is_websocket_event(&event));
        assert!(!event.headers().contains_key("routekey"));
        assert_eq!(
            websocket_route(&event),
            Some(("$connect".to_string(), "conn-1".to_string()))
        );
        assert_eq!(
            event
                .query_string_parameters_ref()
                .and_then(|params| params.first("department")),
            Some("CS")
        );
    }

    #[test]
    fn test_http_requests_are_not_websocket_events() {
        let event = lambda_http::http::Request::builder()
            .uri("/complaints")
            .header("routeKey", "$connect")
            .body(Body::Empty)
            .unwrap();
        assert!(!is_websocket_event(&event));
        assert_eq!(websocket_route(&event), None);
    }

    #[tokio::test]
    async fn test_connect_requires_identity() {
        let response = handle_websocket_event(connect(None, "CS"), state().await)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_connect_is_limited_to_department_faculty() {
        let state = state().await;

        let response = handle_websocket_event(connect(Some("student-a"), "CS"), state.clone())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = handle_websocket_event(connect(Some("fac-cs"), "EE"), state)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_faculty_connect_reaches_registry() {
        // Authorized; without a registry configured the connection cannot be stored.
        let response = handle_websocket_event(connect(Some("fac-cs"), "CS"), state().await)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let event = websocket_event("$connect", "CONNECT", Some("fac-cs"), None);
        let response = handle_websocket_event(event, state().await).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_disconnect_is_acknowledged() {
        let event = websocket_event("$disconnect", "DISCONNECT", None, None);
        let response = handle_websocket_event(event, state().await).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route_is_rejected() {
        let event = websocket_event("$default", "MESSAGE", Some("fac-cs"), None);
        let response = handle_websocket_event(event, state().await).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let event = lambda_http::http::Request::builder()
            .uri("/")
            .body(Body::Empty)
            .unwrap();
        let response = handle_websocket_event(event, state().await).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
