use complaint_box_shared::responses::{auth_error_response, method_not_allowed, not_found, preflight};
use complaint_box_shared::session::Session;
use complaint_box_shared::{auth, complaints, users, AppState};
use lambda_http::{http::Method, Body, Error, Request, RequestExt, Response};
use std::sync::Arc;

/// Main Lambda handler - routes requests to auth, user and complaint endpoints
pub(crate) async fn function_handler(
    event: Request,
    state: Arc<AppState>,
) -> Result<Response<Body>, Error> {
    let method = event.method();
    let path = event.uri().path();
    let body = event.body();
    tracing::info!("API invoked - Method: {} Path: {}", method, path);

    if *method == Method::OPTIONS {
        return preflight();
    }

    // Auth routes (no caller identity required)
    match path {
        "/login" | "/register" | "/logout" if *method != Method::POST => {
            return method_not_allowed()
        }
        "/login" => return auth::login(state.identity.as_ref(), body).await,
        "/register" => return auth::register(state.identity.as_ref(), body).await,
        "/logout" => return auth::logout(state.identity.as_ref(), event.headers()).await,
        // GET /navigation?path= - route gating, signed in or not
        "/navigation" if *method != Method::GET => return method_not_allowed(),
        "/navigation" => {
            let target = event
                .query_string_parameters_ref()
                .and_then(|params| params.first("path"));
            let user = match state.caller_id(&event) {
                Some(_) => state.caller_session(&event).await.ok().map(|s| s.user),
                None => None,
            };
            return users::navigate(target, user.as_ref());
        }
        _ => {}
    }

    // Everything else acts on behalf of the caller
    let session: Session = match state.caller_session(&event).await {
        Ok(session) => session,
        Err(e) => return auth_error_response(&e),
    };
    tracing::info!("Caller: {} ({})", session.user_id(), session.user.role.as_str());

    let service = &state.complaints;
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match (method, parts.as_slice()) {
        // GET /users/me - current profile
        (&Method::GET, ["users", "me"]) => users::get_me(&session),

        // POST /complaints - submit
        (&Method::POST, ["complaints"]) => complaints::submit(service, &session, body).await,
        // GET /complaints - caller's own complaints
        (&Method::GET, ["complaints"]) => complaints::list_own(service, &session).await,
        // GET /complaints/department?status= - triage listing
        (&Method::GET, ["complaints", "department"]) => {
            let status = event
                .query_string_parameters_ref()
                .and_then(|params| params.first("status"));
            complaints::list_department(service, &session, status).await
        }
        // GET /complaints/{id}
        (&Method::GET, ["complaints", id]) => complaints::get(service, &session, id).await,
        // PATCH /complaints/{id}/status
        (&Method::PATCH, ["complaints", id, "status"]) => {
            complaints::set_status(service, &session, id, body).await
        }
        // PATCH /complaints/{id}/reply
        (&Method::PATCH, ["complaints", id, "reply"]) => {
            complaints::set_reply(service, &session, id, body).await
        }
        _ => not_found(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use complaint_box_shared::config::Config;
    use complaint_box_shared::identity::MemoryIdentityProvider;
    use complaint_box_shared::store::MemoryComplaintStore;
    use complaint_box_shared::types::{Role, User};
    use lambda_http::http::StatusCode;
    use std::collections::HashMap;

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
        let accounts = [
            ("student-a", "CS", Role::Student),
            ("student-b", "EE", Role::Student),
            ("fac-cs", "CS", Role::Faculty),
            ("fac-ee", "EE", Role::Faculty),
        ];
        for (user_id, department, role) in accounts {
            identity
                .insert_user(
                    User {
                        user_id: user_id.to_string(),
                        email: format!("{}@example.edu", user_id),
                        department: department.to_string(),
                        year: Some("2".to_string()),
                        section: Some("A".to_string()),
                        role,
                    },
                    "password1",
                )
                .await;
        }
        AppState::new(config(), Arc::new(MemoryComplaintStore::new()), identity, None)
    }

    fn request(method: &str, path: &str, user_id: Option<&str>, body: &str) -> Request {
        let mut builder = lambda_http::http::Request::builder().method(method).uri(path);
        if let Some(user_id) = user_id {
            builder = builder.header("X-User-Id", user_id);
        }
        let body = if body.is_empty() {
            Body::Empty
        } else {
            Body::from(body)
        };
        builder.body(body).unwrap()
    }

    async fn call(state: &Arc<AppState>, event: Request) -> (StatusCode, serde_json::Value) {
        let response = function_handler(event, Arc::clone(state)).await.unwrap();
        let status = response.status();
        let value = if response.body().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(response.body()).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_requests_without_identity_are_sent_to_login() {
        let state = state().await;
        let (status, body) = call(&state, request("GET", "/complaints", None, "")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["redirect"], "/auth/login");
    }

    #[tokio::test]
    async fn test_user_header_ignored_unless_enabled() {
        let identity = Arc::new(MemoryIdentityProvider::new());
        let mut config = config();
        config.allow_user_header = false;
        let state = AppState::new(config, Arc::new(MemoryComplaintStore::new()), identity, None);

        let (status, _) = call(&state, request("GET", "/users/me", Some("student-a"), "")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_preflight_and_unknown_routes() {
        let state = state().await;
        let (status, _) = call(&state, request("OPTIONS", "/complaints", None, "")).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(&state, request("GET", "/login", None, "")).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

        let (status, _) = call(&state, request("DELETE", "/complaints/x", Some("fac-cs"), "")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_projector_flow_over_http() {
        let state = state().await;

        let (status, created) = call(
            &state,
            request(
                "POST",
                "/complaints",
                Some("student-a"),
                r#"{"message":"Projector broken","category":"academic","isAnonymous":false}"#,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "pending");
        let id = created["id"].as_str().unwrap().to_string();

        let (status, listing) = call(
            &state,
            request("GET", "/complaints/department", Some("fac-cs"), ""),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listing.as_array().unwrap().len(), 1);

        let (status, updated) = call(
            &state,
            request(
                "PATCH",
                &format!("/complaints/{}/status", id),
                Some("fac-cs"),
                r#"{"status":"inProgress"}"#,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["status"], "inProgress");

        let (status, _) = call(
            &state,
            request(
                "PATCH",
                &format!("/complaints/{}/reply", id),
                Some("fac-cs"),
                r#"{"reply":"Fixed"}"#,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, own) = call(&state, request("GET", "/complaints", Some("student-a"), "")).await;
        assert_eq!(own[0]["status"], "inProgress");
        assert_eq!(own[0]["reply"], "Fixed");
    }

    #[tokio::test]
    async fn test_department_listing_filters_and_gates() {
        let state = state().await;
        call(
            &state,
            request(
                "POST",
                "/complaints",
                Some("student-b"),
                r#"{"message":"Grades withheld","category":"academic","isAnonymous":true}"#,
            ),
        )
        .await;

        let (status, listing) = call(
            &state,
            request("GET", "/complaints/department", Some("fac-ee"), ""),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(listing[0].get("email").is_none());

        let (_, cs_listing) = call(
            &state,
            request("GET", "/complaints/department", Some("fac-cs"), ""),
        )
        .await;
        assert!(cs_listing.as_array().unwrap().is_empty());

        let (status, _) = call(
            &state,
            request("GET", "/complaints/department", Some("student-b"), ""),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let event = request("GET", "/complaints/department", Some("fac-ee"), "")
            .with_query_string_parameters(HashMap::from([(
                "status".to_string(),
                "resolved".to_string(),
            )]));
        let (_, resolved) = call(&state, event).await;
        assert!(resolved.as_array().unwrap().is_empty());

        let event = request("GET", "/complaints/department", Some("fac-ee"), "")
            .with_query_string_parameters(HashMap::from([(
                "status".to_string(),
                "closed".to_string(),
            )]));
        let (status, _) = call(&state, event).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_navigation_gates_routes_by_caller() {
        let state = state().await;
        let navigate = |user_id: Option<&str>, path: &str| {
            request("GET", "/navigation", user_id, "").with_query_string_parameters(HashMap::from([(
                "path".to_string(),
                path.to_string(),
            )]))
        };

        let (status, body) = call(&state, navigate(None, "/user")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["action"], "redirect");
        assert_eq!(body["route"], "/auth/login");

        let (_, body) = call(&state, navigate(Some("student-a"), "/admin")).await;
        assert_eq!(body["action"], "accessDenied");

        let (_, body) = call(&state, navigate(Some("fac-cs"), "/auth/login")).await;
        assert_eq!(body["action"], "redirect");
        assert_eq!(body["route"], "/admin");

        let (_, body) = call(&state, navigate(Some("fac-cs"), "/admin")).await;
        assert_eq!(body["action"], "render");

        let (status, _) = call(&state, request("POST", "/navigation", None, "")).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_blank_submission_is_rejected() {
        let state = state().await;
        let (status, body) = call(
            &state,
            request(
                "POST",
                "/complaints",
                Some("student-a"),
                r#"{"message":"   ","category":"other"}"#,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "ValidationError");

        let (_, own) = call(&state, request("GET", "/complaints", Some("student-a"), "")).await;
        assert!(own.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_students_cannot_triage() {
        let state = state().await;
        let (_, created) = call(
            &state,
            request(
                "POST",
                "/complaints",
                Some("student-a"),
                r#"{"message":"Wifi down","category":"facilities"}"#,
            ),
        )
        .await;
        let id = created["id"].as_str().unwrap();

        let (status, _) = call(
            &state,
            request(
                "PATCH",
                &format!("/complaints/{}/status", id),
                Some("student-a"),
                r#"{"status":"resolved"}"#,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = call(
            &state,
            request("GET", &format!("/complaints/{}", id), Some("fac-ee"), ""),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
