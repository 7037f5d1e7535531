//! Shared HTTP plumbing for route handlers
//!
//! Every endpoint answers the same envelope: `{"success": true, ...}`
//! on the happy path, `{"success": false, "error": "..."}` otherwise,
//! with the status code derived from the error taxonomy. Internal
//! details stay out of responses unless dev mode is on.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::error;

use crate::auth::{extract_token_from_header, Claims};
use crate::server::AppState;
use crate::types::GatekeeperError;

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .body(full_body(json))
        .unwrap()
}

pub fn success_response<T: Serialize>(payload: &T) -> Response<BoxBody> {
    json_response(StatusCode::OK, payload)
}

pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response<BoxBody> {
    json_response(
        status,
        &json!({ "success": false, "error": message.into() }),
    )
}

pub fn cors_preflight() -> Response<BoxBody> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .header("Access-Control-Max-Age", "86400")
        .body(empty_body())
        .unwrap()
}

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub fn empty_body() -> BoxBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed()
}

pub async fn parse_json_body<T: for<'de> Deserialize<'de>>(
    req: Request<hyper::body::Incoming>,
) -> Result<T, GatekeeperError> {
    let body = req
        .collect()
        .await
        .map_err(|e| GatekeeperError::Http(format!("Failed to read body: {}", e)))?;

    let bytes = body.to_bytes();
    if bytes.len() > 65536 {
        return Err(GatekeeperError::Http("Request body too large".into()));
    }

    serde_json::from_slice(&bytes)
        .map_err(|e| GatekeeperError::Http(format!("Invalid JSON: {}", e)))
}

/// Map an error onto the response envelope and status code.
///
/// An uncompensated partial failure is additionally logged here so it
/// cannot pass unnoticed even if the flow forgot to.
pub fn map_error(state: &AppState, e: GatekeeperError) -> Response<BoxBody> {
    if e.is_diverged() {
        error!(error = %e, "Stores diverged; manual reconciliation required");
    }

    let status = match &e {
        GatekeeperError::Validation(_) | GatekeeperError::Http(_) => StatusCode::BAD_REQUEST,
        GatekeeperError::Auth(_) => StatusCode::UNAUTHORIZED,
        GatekeeperError::NotFound(_) => StatusCode::NOT_FOUND,
        GatekeeperError::Ledger(_)
        | GatekeeperError::Database(_)
        | GatekeeperError::Config(_)
        | GatekeeperError::PartialFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    // Partial failures surface a stable client-facing shape that keeps
    // "failed in one of two systems" distinguishable from plain errors
    if let GatekeeperError::PartialFailure {
        flow, compensated, ..
    } = &e
    {
        let message = if *compensated {
            format!("{} failed on the ledger; local changes were rolled back", flow)
        } else {
            format!(
                "{} failed after the local commit and rollback also failed; operator attention required",
                flow
            )
        };
        return json_response(
            status,
            &json!({
                "success": false,
                "error": message,
                "partialFailure": { "compensated": compensated },
            }),
        );
    }

    let message = if state.args.dev_mode {
        e.to_string()
    } else {
        match &e {
            // Infrastructure detail is withheld outside dev mode
            GatekeeperError::Database(_) => "Internal storage error".to_string(),
            GatekeeperError::Config(_) => "Server configuration error".to_string(),
            other => other.to_string(),
        }
    };

    error_response(status, message)
}

/// Authenticate the request, returning claims or a ready error response
pub fn require_auth(
    state: &AppState,
    req: &Request<hyper::body::Incoming>,
) -> Result<Claims, Response<BoxBody>> {
    let header = req
        .headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "Missing Authorization header"))?;

    let token = extract_token_from_header(header)
        .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "Malformed Authorization header"))?;

    state
        .jwt
        .validate(token)
        .map_err(|e| error_response(StatusCode::UNAUTHORIZED, e.to_string()))
}

/// Authenticate and require the admin role
pub fn require_admin(
    state: &AppState,
    req: &Request<hyper::body::Incoming>,
) -> Result<Claims, Response<BoxBody>> {
    let claims = require_auth(state, req)?;
    if !claims.is_admin() {
        return Err(error_response(
            StatusCode::FORBIDDEN,
            "Admin role required",
        ));
    }
    Ok(claims)
}

/// Parse a path segment as an ObjectId
pub fn parse_object_id(segment: &str) -> Result<bson::oid::ObjectId, Response<BoxBody>> {
    segment
        .parse()
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, "Invalid document id"))
}

/// Internal helper shared by dispatchers: strip a prefix plus its
/// following slash, e.g. ("/residents/abc/block", "/residents") -> "abc/block"
pub fn subpath<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        return Some(rest);
    }
    rest.strip_prefix('/')
}

/// Convenience alias used across route modules
pub type State = Arc<AppState>;
