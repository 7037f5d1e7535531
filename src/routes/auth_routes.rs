//! Authentication routes
//!
//! - POST /auth/login  - verify credentials and ledger registration,
//!   return a JWT
//! - GET  /auth/verify - echo the authenticated user from the token
//!
//! Login is gated twice: the local password check, then a ledger
//! registration pre-check (residents under the write org by external
//! id, admins under the read org by name). A gateway outage fails the
//! login rather than skipping the check.

use bson::doc;
use hyper::{Method, Request, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::db::schemas::UserRole;
use crate::routes::helpers::*;
use crate::types::GatekeeperError;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn handle_auth_request(
    req: Request<hyper::body::Incoming>,
    state: State,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path();
    let method = req.method();

    if !path.starts_with("/auth") {
        return None;
    }

    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    let path = path.split('?').next().unwrap_or(path);

    let response = match (method, path) {
        (&Method::POST, "/auth/login") => handle_login(req, state).await,
        (&Method::GET, "/auth/verify") => handle_verify(req, state).await,
        (_, "/auth/login") | (_, "/auth/verify") => {
            error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
        }
        _ => error_response(StatusCode::NOT_FOUND, "Not found"),
    };

    Some(response)
}

async fn handle_login(req: Request<hyper::body::Incoming>, state: State) -> Response<BoxBody> {
    let body: LoginRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return map_error(&state, e),
    };

    let user = match state.store.users.find_one(doc! { "email": &body.email }).await {
        Ok(Some(u)) => u,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "User not found"),
        Err(e) => return map_error(&state, e),
    };

    match crate::auth::verify_password(&body.password, &user.password_hash) {
        Ok(true) => {}
        Ok(false) => return error_response(StatusCode::UNAUTHORIZED, "Wrong password"),
        Err(e) => return map_error(&state, e),
    }

    // Ledger registration pre-check before any token is issued
    let enrollment = match user.role {
        UserRole::Resident => {
            state
                .coordinator
                .identity
                .verify_enrolled(
                    &user.external_id,
                    &state.settings.write_org,
                    UserRole::Resident,
                )
                .await
        }
        UserRole::Admin => {
            state
                .coordinator
                .identity
                .verify_enrolled(&user.name, &state.settings.read_org, UserRole::Admin)
                .await
        }
    };

    match enrollment {
        Ok(()) => {}
        Err(GatekeeperError::Auth(msg)) => {
            warn!(user = %user.email, "Login rejected: {}", msg);
            return error_response(
                StatusCode::FORBIDDEN,
                format!("{} not registered in the ledger", user.role.as_str()),
            );
        }
        Err(_) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Ledger verification service unavailable",
            );
        }
    }

    let (token, expires_at) = match state.jwt.issue(&user) {
        Ok(t) => t,
        Err(e) => return map_error(&state, e),
    };

    success_response(&json!({
        "success": true,
        "token": token,
        "expiresAt": expires_at,
        "user": {
            "id": user._id.map(|id| id.to_hex()),
            "name": user.name,
            "role": user.role.as_str(),
            "externalId": user.external_id,
        },
    }))
}

async fn handle_verify(req: Request<hyper::body::Incoming>, state: State) -> Response<BoxBody> {
    let claims = match require_auth(&state, &req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    success_response(&json!({
        "success": true,
        "user": {
            "id": claims.sub,
            "name": claims.name,
            "role": claims.role.as_str(),
            "externalId": claims.external_id,
        },
    }))
}
