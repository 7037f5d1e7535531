//! Scanner routes
//!
//! - POST /scanner/verify - drive the entry verification state machine
//! - GET  /scanner/logs   - entry log retrieval with subject enrichment
//!
//! The verify endpoint is unauthenticated by design: it serves the
//! physical gate device, and the QR token itself is the credential the
//! machine validates against the ledger.

use bson::doc;
use hyper::{Method, Request, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;

use crate::db::schemas::{EntryLogDoc, EntrySubject};
use crate::routes::helpers::*;
use crate::scanner::{Rejection, ScanOutcome};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub qr_data: String,
}

pub async fn handle_scanner_request(
    req: Request<hyper::body::Incoming>,
    state: State,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path();
    let method = req.method();

    if !path.starts_with("/scanner") {
        return None;
    }

    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    let path = path.split('?').next().unwrap_or(path);

    let response = match (method, path) {
        (&Method::POST, "/scanner/verify") => handle_verify(req, state).await,
        (&Method::GET, "/scanner/logs") => handle_logs(req, state).await,
        _ => error_response(StatusCode::NOT_FOUND, "Not found"),
    };

    Some(response)
}

async fn handle_verify(req: Request<hyper::body::Incoming>, state: State) -> Response<BoxBody> {
    let body: VerifyRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return map_error(&state, e),
    };

    if body.qr_data.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "No QR data provided");
    }

    match state.scanner.verify(&body.qr_data).await {
        Ok(ScanOutcome::Admitted(admission)) => success_response(&json!({
            "success": true,
            "message": "Entry recorded",
            "admitted": true,
            "action": admission.action.as_str(),
            "subject": admission.display,
            "ledgerMirrored": admission.ledger_mirrored,
        })),
        Ok(ScanOutcome::Rejected(rejection)) => {
            let status = match &rejection {
                Rejection::InvalidToken => StatusCode::BAD_REQUEST,
                Rejection::NotFound(_) => StatusCode::NOT_FOUND,
                Rejection::Blocked(_)
                | Rejection::OutOfWindow { .. }
                | Rejection::NotAccepted => StatusCode::FORBIDDEN,
                // Promoted to a ledger error before reaching here
                Rejection::Malformed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            json_response(
                status,
                &json!({
                    "success": false,
                    "admitted": false,
                    "error": rejection.message(),
                }),
            )
        }
        Err(e) => map_error(&state, e),
    }
}

/// Attach a human-readable subject description to a log row
async fn enrich_log(state: &State, log: &EntryLogDoc) -> serde_json::Value {
    let subject = match &log.subject {
        EntrySubject::Resident { external_id, .. } => {
            let name = state
                .store
                .residents
                .find_one(doc! { "external_id": external_id })
                .await
                .ok()
                .flatten();
            let user = match &name {
                Some(r) => state
                    .store
                    .users
                    .find_one(doc! { "_id": r.user_id })
                    .await
                    .ok()
                    .flatten(),
                None => None,
            };
            json!({
                "kind": "resident",
                "externalId": external_id,
                "name": user.map(|u| u.name),
                "apartment": name.map(|r| r.apartment),
            })
        }
        EntrySubject::Visitor { external_id, .. } => {
            let visitor = state
                .store
                .visitors
                .find_one(doc! { "external_id": external_id })
                .await
                .ok()
                .flatten();
            json!({
                "kind": "visitor",
                "externalId": external_id,
                "name": visitor.as_ref().map(|v| v.full_name.clone()),
                "residentExternalId": visitor.map(|v| v.resident_external_id),
            })
        }
        EntrySubject::VisitRequest { request_id, .. } => {
            let request = state
                .store
                .visit_requests
                .find_one(doc! { "request_id": request_id })
                .await
                .ok()
                .flatten();
            json!({
                "kind": "visitRequest",
                "requestId": request_id,
                "name": request.as_ref().map(|r| r.visitor_name.clone()),
                "visitDate": request.map(|r| r.visit_date),
            })
        }
    };

    json!({
        "id": log._id.map(|id| id.to_hex()),
        "subject": subject,
        "type": log.action.as_str(),
        "timestamp": log.timestamp.try_to_rfc3339_string().ok(),
        "ledgerStatus": log.ledger_status,
    })
}

async fn handle_logs(req: Request<hyper::body::Incoming>, state: State) -> Response<BoxBody> {
    if let Err(resp) = require_auth(&state, &req) {
        return resp;
    }

    let logs = match state.store.entry_logs.find_many(doc! {}).await {
        Ok(l) => l,
        Err(e) => return map_error(&state, e),
    };

    let mut enriched = Vec::with_capacity(logs.len());
    for log in &logs {
        enriched.push(enrich_log(&state, log).await);
    }

    success_response(&json!({ "success": true, "entryLogs": enriched }))
}
