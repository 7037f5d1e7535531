//! Visit request routes
//!
//! Creation and retrieval for residents; the accept/reject transition
//! is admin-only and ledger-first (see the coordinator).

use bson::doc;
use hyper::{Method, Request, Response, StatusCode};
use serde_json::json;

use crate::coordinator::{NewVisitRequest, StatusChange};
use crate::db::schemas::VisitRequestDoc;
use crate::routes::helpers::*;

pub async fn handle_request_routes(
    req: Request<hyper::body::Incoming>,
    state: State,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    let rest = subpath(&path, "/requests")?;

    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();

    let response = match (&method, segments.as_slice()) {
        (&Method::POST, []) => handle_create(req, state).await,
        (&Method::GET, []) => handle_list(req, state).await,
        (&Method::GET, ["mine"]) => handle_list_mine(req, state).await,
        (&Method::GET, [id]) => handle_get(req, state, id).await,
        (&Method::PUT, [id, "status"]) => handle_status(req, state, id).await,
        _ => error_response(StatusCode::NOT_FOUND, "Not found"),
    };

    Some(response)
}

fn render(request: &VisitRequestDoc) -> serde_json::Value {
    json!({
        "id": request._id.map(|id| id.to_hex()),
        "requestId": request.request_id,
        "createdBy": request.created_by.to_hex(),
        "targetResident": request.target_resident.to_hex(),
        "visitorName": request.visitor_name,
        "visitorPhone": request.visitor_phone,
        "type": request.request_type,
        "visitPurpose": request.visit_purpose,
        "customReason": request.custom_reason,
        "visitDate": request.visit_date,
        "visitTimeFrom": request.visit_time_from,
        "visitTimeTo": request.visit_time_to,
        "status": request.status.as_str(),
        "qrToken": request.qr_token,
        "qrImage": request.qr_image,
    })
}

async fn handle_create(req: Request<hyper::body::Incoming>, state: State) -> Response<BoxBody> {
    let claims = match require_auth(&state, &req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let created_by = match parse_object_id(&claims.sub) {
        Ok(o) => o,
        Err(resp) => return resp,
    };

    let input: NewVisitRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return map_error(&state, e),
    };

    match state.coordinator.create_visit_request(input, created_by).await {
        Ok(request_id) => json_response(
            StatusCode::CREATED,
            &json!({
                "success": true,
                "message": "Visit request created in both systems",
                "requestId": request_id,
            }),
        ),
        Err(e) => map_error(&state, e),
    }
}

async fn handle_list(req: Request<hyper::body::Incoming>, state: State) -> Response<BoxBody> {
    if let Err(resp) = require_admin(&state, &req) {
        return resp;
    }

    match state.store.visit_requests.find_many(doc! {}).await {
        Ok(requests) => {
            let rendered: Vec<_> = requests.iter().map(render).collect();
            success_response(&json!({ "success": true, "requests": rendered }))
        }
        Err(e) => map_error(&state, e),
    }
}

async fn handle_list_mine(req: Request<hyper::body::Incoming>, state: State) -> Response<BoxBody> {
    let claims = match require_auth(&state, &req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let user_oid = match parse_object_id(&claims.sub) {
        Ok(o) => o,
        Err(resp) => return resp,
    };

    let resident = match state
        .store
        .residents
        .find_one(doc! { "user_id": user_oid })
        .await
    {
        Ok(Some(r)) => r,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "Resident not found"),
        Err(e) => return map_error(&state, e),
    };

    let Some(resident_oid) = resident._id else {
        return error_response(StatusCode::NOT_FOUND, "Resident not found");
    };

    match state
        .store
        .visit_requests
        .find_many(doc! { "target_resident": resident_oid })
        .await
    {
        Ok(requests) => {
            let rendered: Vec<_> = requests.iter().map(render).collect();
            success_response(&json!({ "success": true, "requests": rendered }))
        }
        Err(e) => map_error(&state, e),
    }
}

async fn handle_get(
    req: Request<hyper::body::Incoming>,
    state: State,
    id: &str,
) -> Response<BoxBody> {
    if let Err(resp) = require_auth(&state, &req) {
        return resp;
    }

    let oid = match parse_object_id(id) {
        Ok(o) => o,
        Err(resp) => return resp,
    };

    match state.store.visit_requests.find_one(doc! { "_id": oid }).await {
        Ok(Some(r)) => success_response(&json!({ "success": true, "request": render(&r) })),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Request not found"),
        Err(e) => map_error(&state, e),
    }
}

async fn handle_status(
    req: Request<hyper::body::Incoming>,
    state: State,
    id: &str,
) -> Response<BoxBody> {
    let claims = match require_admin(&state, &req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let oid = match parse_object_id(id) {
        Ok(o) => o,
        Err(resp) => return resp,
    };

    let change: StatusChange = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return map_error(&state, e),
    };

    let status = match change.parse() {
        Ok(s) => s,
        Err(e) => return map_error(&state, e),
    };

    match state
        .coordinator
        .change_request_status(oid, status, claims.sub)
        .await
    {
        Ok(updated) => success_response(&json!({
            "success": true,
            "message": format!("Request {} in both systems", status.as_str()),
            "request": render(&updated),
        })),
        Err(e) => map_error(&state, e),
    }
}
