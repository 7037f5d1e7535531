//! Resident routes
//!
//! CRUD plus block/unblock. Mutations go through the dual-write
//! coordinator; list reads are enriched with the projected
//! Blocked/Active status.

use bson::{doc, DateTime};
use hyper::{Method, Request, Response, StatusCode};
use serde_json::json;

use crate::coordinator::{BlockWindow, NewResident, ResidentUpdate};
use crate::db::schemas::ResidentDoc;
use crate::projection;
use crate::routes::helpers::*;

pub async fn handle_resident_request(
    req: Request<hyper::body::Incoming>,
    state: State,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    let rest = subpath(&path, "/residents")?;

    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();

    let response = match (&method, segments.as_slice()) {
        (&Method::POST, []) => handle_add(req, state).await,
        (&Method::GET, []) => handle_list(req, state).await,
        (&Method::GET, ["by-apartment", apartment]) => {
            handle_list_by_apartment(req, state, apartment).await
        }
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
    if let Err(resp) = require_admin(&state, &req) {
        return resp;
    }

    let input: NewResident = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return map_error(&state, e),
    };

    match state.coordinator.register_resident(input).await {
        Ok(external_id) => success_response(&json!({
            "success": true,
            "message": "Resident created successfully",
            "externalId": external_id,
        })),
        Err(e) => map_error(&state, e),
    }
}

/// Serialize a resident with its projected block status
async fn enrich(state: &State, resident: &ResidentDoc) -> serde_json::Value {
    let status = projection::subject_status(
        &state.store.blocks,
        &resident.external_id,
        DateTime::now(),
    )
    .await
    .map(|s| s.as_str())
    .unwrap_or("Active");

    let user = state
        .store
        .users
        .find_one(doc! { "_id": resident.user_id })
        .await
        .ok()
        .flatten();

    json!({
        "id": resident._id.map(|id| id.to_hex()),
        "externalId": resident.external_id,
        "gender": resident.gender,
        "maritalStatus": resident.marital_status,
        "residentType": resident.resident_type,
        "apartment": resident.apartment,
        "qrImage": resident.qr_image,
        "name": user.as_ref().map(|u| u.name.clone()),
        "email": user.as_ref().map(|u| u.email.clone()),
        "phone": user.as_ref().map(|u| u.phone.clone()),
        "status": status,
    })
}

async fn handle_list(req: Request<hyper::body::Incoming>, state: State) -> Response<BoxBody> {
    if let Err(resp) = require_auth(&state, &req) {
        return resp;
    }

    let residents = match state.store.residents.find_many(doc! {}).await {
        Ok(r) => r,
        Err(e) => return map_error(&state, e),
    };

    let mut enriched = Vec::with_capacity(residents.len());
    for resident in &residents {
        enriched.push(enrich(&state, resident).await);
    }

    success_response(&json!({ "success": true, "residents": enriched }))
}

async fn handle_list_by_apartment(
    req: Request<hyper::body::Incoming>,
    state: State,
    apartment: &str,
) -> Response<BoxBody> {
    if let Err(resp) = require_auth(&state, &req) {
        return resp;
    }

    let residents = match state
        .store
        .residents
        .find_many(doc! { "apartment": apartment })
        .await
    {
        Ok(r) => r,
        Err(e) => return map_error(&state, e),
    };

    let mut enriched = Vec::with_capacity(residents.len());
    for resident in &residents {
        enriched.push(enrich(&state, resident).await);
    }

    success_response(&json!({ "success": true, "residents": enriched }))
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

    // The id may be a resident document id or its owning user's id
    let resident = match state.store.residents.find_one(doc! { "_id": oid }).await {
        Ok(Some(r)) => Some(r),
        Ok(None) => match state.store.residents.find_one(doc! { "user_id": oid }).await {
            Ok(r) => r,
            Err(e) => return map_error(&state, e),
        },
        Err(e) => return map_error(&state, e),
    };

    match resident {
        Some(r) => {
            let body = enrich(&state, &r).await;
            success_response(&json!({ "success": true, "resident": body }))
        }
        None => error_response(StatusCode::NOT_FOUND, "Resident not found"),
    }
}

async fn handle_update(
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

    let input: ResidentUpdate = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return map_error(&state, e),
    };

    match state.coordinator.update_resident(oid, input).await {
        Ok(()) => success_response(&json!({
            "success": true,
            "message": "Resident updated successfully",
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

    match state.coordinator.delete_resident(oid).await {
        Ok(()) => success_response(&json!({
            "success": true,
            "message": "Resident deleted successfully",
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

    match state.coordinator.block_resident(oid, window, claims.sub).await {
        Ok(()) => success_response(&json!({
            "success": true,
            "message": "Resident blocked successfully",
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

    match state.coordinator.unblock_resident(oid).await {
        Ok(()) => success_response(&json!({
            "success": true,
            "message": "Resident unblocked successfully",
        })),
        Err(e) => map_error(&state, e),
    }
}
