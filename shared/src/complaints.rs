use crate::lifecycle::ComplaintService;
use crate::responses::{complaint_error_response, error_response, json_response, parse_body};
use crate::session::Session;
use crate::types::{ReplyRequest, StatusFilter, SubmitComplaintRequest, UpdateStatusRequest};
use lambda_http::{http::StatusCode, Body, Error, Response};

/// POST /complaints
pub async fn submit(
    service: &ComplaintService,
    session: &Session,
    body: &Body,
) -> Result<Response<Body>, Error> {
    let request: SubmitComplaintRequest = match parse_body(body) {
        Ok(req) => req,
        Err(response) => return response,
    };

    match service
        .submit(session, &request.message, request.category, request.is_anonymous)
        .await
    {
        Ok(complaint) => json_response(StatusCode::CREATED, &complaint),
        Err(e) => complaint_error_response(&e),
    }
}

/// GET /complaints
pub async fn list_own(service: &ComplaintService, session: &Session) -> Result<Response<Body>, Error> {
    match service.list_own(session).await {
        Ok(complaints) => json_response(StatusCode::OK, &complaints),
        Err(e) => complaint_error_response(&e),
    }
}

/// GET /complaints/department?status=
///
/// Lists the caller's own department.
pub async fn list_department(
    service: &ComplaintService,
    session: &Session,
    status: Option<&str>,
) -> Result<Response<Body>, Error> {
    let filter: StatusFilter = match status.unwrap_or("").parse() {
        Ok(filter) => filter,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, "InvalidRequest", e),
    };

    match service
        .department_snapshot(session, &session.user.department, filter)
        .await
    {
        Ok(complaints) => json_response(StatusCode::OK, &complaints),
        Err(e) => complaint_error_response(&e),
    }
}

/// GET /complaints/{id}
pub async fn get(service: &ComplaintService, session: &Session, id: &str) -> Result<Response<Body>, Error> {
    match service.get(session, id).await {
        Ok(complaint) => json_response(StatusCode::OK, &complaint),
        Err(e) => complaint_error_response(&e),
    }
}

/// PATCH /complaints/{id}/status
pub async fn set_status(
    service: &ComplaintService,
    session: &Session,
    id: &str,
    body: &Body,
) -> Result<Response<Body>, Error> {
    let request: UpdateStatusRequest = match parse_body(body) {
        Ok(req) => req,
        Err(response) => return response,
    };

    match service.set_status(session, id, request.status).await {
        Ok(complaint) => json_response(StatusCode::OK, &complaint),
        Err(e) => complaint_error_response(&e),
    }
}

/// PATCH /complaints/{id}/reply
pub async fn set_reply(
    service: &ComplaintService,
    session: &Session,
    id: &str,
    body: &Body,
) -> Result<Response<Body>, Error> {
    let request: ReplyRequest = match parse_body(body) {
        Ok(req) => req,
        Err(response) => return response,
    };

    match service.set_reply(session, id, &request.reply).await {
        Ok(complaint) => json_response(StatusCode::OK, &complaint),
        Err(e) => complaint_error_response(&e),
    }
}
