//! Visitor routes
//!
//! Visitors hang off a resident. Residents manage their own list;
//! admins can target any resident by id.

use bson::{doc, DateTime};
use hyper::{Method, Request, Response, StatusCode};
use serde_json::json;

use crate::coordinator::{BlockWindow, NewVisitor, VisitorUpdate};
use crate::db::schemas::VisitorDoc;
use crate::projection;
use crate::routes::helpers::*;

pub async fn handle_visitor_request(
    req: Request<hyper::body::Incoming>,
    state: State,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    let rest = subpath(&path, "/visitors")?;

    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();

    let response = match (&method, segments.as_slice()) {
        (&Method::POST, []) => handle_add(req, state).await,
        (&Method::GET, ["by-user", id]) => handle_list_by_user(req, state, id).await,
        (&Method::GET, ["by-resident", id]) => handle_list_by_resident(req, state, id).await,
        (&Method::GET, [id]) => handle_get(req, state, id).await,
        (&Method::PUT, [id]) => handle_update(req, state, id).await,
        (&Method::DELETE, [id]) => handle_delete(req, state, id).await,
        (&Method::POST, [id, "block"]) => handle_block(req, state, id).await,
        (&Method::POST, [id, "unblock"]) => handle_unblock(req, state, id).await,
        _ => error_response(StatusCode::NOT_FOUND, "Not found"),
    };

    Some(response)
}

async fn handle_add(req: Request<hyper::body::Incoming>, state: State) -> Response<BoxBody> {
    let claims = match require_auth(&state, &req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let input: NewVisitor = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return map_error(&state, e),
    };

    // Admins name the resident; residents default to their own record
    let resident_oid = match input.resident_id.as_deref() {
        Some(id) => match parse_object_id(id) {
            Ok(o) => o,
            Err(resp) => return resp,
        },
        None => {
            let user_oid = match parse_object_id(&claims.sub) {
                Ok(o) => o,
                Err(resp) => return resp,
            };
            match state
                .store
                .residents
                .find_one(doc! { "user_id": user_oid })
                .await
            {
                Ok(Some(r)) => match r._id {
                    Some(id) => id,
                    None => return error_response(StatusCode::NOT_FOUND, "Resident not found"),
                },
                Ok(None) => return error_response(StatusCode::NOT_FOUND, "Resident not found"),
                Err(e) => return map_error(&state, e),
            }
        }
    };

    match state.coordinator.add_visitor(input, resident_oid).await {
        Ok(external_id) => success_response(&json!({
            "success": true,
            "message": "Visitor created successfully in both systems",
            "externalId": external_id,
        })),
        Err(e) => map_error(&state, e),
    }
}

async fn enrich(state: &State, visitor: &VisitorDoc) -> serde_json::Value {
    let status = projection::subject_status(
        &state.store.blocks,
        &visitor.external_id,
        DateTime::now(),
    )
    .await
    .map(|s| s.as_str())
    .unwrap_or("Active");

    json!({
        "id": visitor._id.map(|id| id.to_hex()),
        "externalId": visitor.external_id,
        "fullName": visitor.full_name,
        "phone": visitor.phone,
        "visitTimeFrom": visitor.visit_time_from,
        "visitTimeTo": visitor.visit_time_to,
        "relationship": visitor.relationship,
        "residentExternalId": visitor.resident_external_id,
        "qrImage": visitor.qr_image,
        "status": status,
    })
}

async fn list_for_resident(state: &State, resident_oid: bson::oid::ObjectId) -> Response<BoxBody> {
    let visitors = match state
        .store
        .visitors
        .find_many(doc! { "resident_id": resident_oid })
        .await
    {
        Ok(v) => v,
        Err(e) => return map_error(state, e),
    };

    let mut enriched = Vec::with_capacity(visitors.len());
    for visitor in &visitors {
        enriched.push(enrich(state, visitor).await);
    }

    success_response(&json!({ "success": true, "visitors": enriched }))
}

async fn handle_list_by_user(
    req: Request<hyper::body::Incoming>,
    state: State,
    id: &str,
) -> Response<BoxBody> {
    if let Err(resp) = require_auth(&state, &req) {
        return resp;
    }

    let user_oid = match parse_object_id(id) {
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

    match resident._id {
        Some(oid) => list_for_resident(&state, oid).await,
        None => error_response(StatusCode::NOT_FOUND, "Resident not found"),
    }
}

async fn handle_list_by_resident(
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

    list_for_resident(&state, oid).await
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

    match state.store.visitors.find_one(doc! { "_id": oid }).await {
        Ok(Some(v)) => {
            let body = enrich(&state, &v).await;
            success_response(&json!({ "success": true, "visitor": body }))
        }
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Visitor not found"),
        Err(e) => map_error(&state, e),
    }
}

async fn handle_update(
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

    let input: VisitorUpdate = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return map_error(&state, e),
    };

    match state.coordinator.update_visitor(oid, input).await {
        Ok(()) => success_response(&json!({
            "success": true,
            "message": "Visitor updated successfully in both systems",
        })),
        Err(e) => map_error(&state, e),
    }
}

async fn handle_delete(
    req: Request<hyper::body::Incoming>,
    state: State,
    id: &str,
) -> Response<BoxBody> {
    if let Err(resp) = require_admin(&state, &req) {
        return resp;
    }

    let oid = match parse_object_id(id) {
        Ok(o) => o,
        Err(resp) => return resp,
    };

    match state.coordinator.delete_visitor(oid).await {
        Ok(()) => success_response(&json!({
            "success": true,
            "message": "Visitor and associated entry logs deleted successfully",
        })),
        Err(e) => map_error(&state, e),
    }
}

async fn handle_block(
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

    let window: BlockWindow = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return map_error(&state, e),
    };

    match state.coordinator.block_visitor(oid, window, claims.sub).await {
        Ok(()) => success_response(&json!({
            "success": true,
            "message": "Visitor blocked successfully in both systems",
        })),
        Err(e) => map_error(&state, e),
    }
}

async fn handle_unblock(
    req: Request<hyper::body::Incoming>,
    state: State,
    id: &str,
) -> Response<BoxBody> {
    if let Err(resp) = require_admin(&state, &req) {
        return resp;
    }

    let oid = match parse_object_id(id) {
        Ok(o) => o,
        Err(resp) => return resp,
    };

    match state.coordinator.unblock_visitor(oid).await {
        Ok(()) => success_response(&json!({
            "success": true,
            "message": "Visitor unblocked successfully in both systems",
        })),
        Err(e) => map_error(&state, e),
    }
}
