//! HTTP server implementation
//!
//! hyper http1 with TokioIo; each accepted connection is served on its
//! own task, so request handlers run concurrently with no global lock.

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::auth::JwtValidator;
use crate::config::Args;
use crate::coordinator::Coordinator;
use crate::db::{MongoClient, Store};
use crate::ledger::LedgerSettings;
use crate::routes;
use crate::routes::helpers::{error_response, BoxBody};
use crate::scanner::Scanner;
use crate::types::Result;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub mongo: MongoClient,
    pub store: Store,
    pub settings: LedgerSettings,
    pub coordinator: Coordinator,
    pub scanner: Scanner,
    pub jwt: JwtValidator,
}

impl AppState {
    pub fn new(
        args: Args,
        mongo: MongoClient,
        store: Store,
        settings: LedgerSettings,
        coordinator: Coordinator,
        scanner: Scanner,
    ) -> Self {
        let jwt = JwtValidator::new(&args.jwt_secret(), args.jwt_expiry_seconds);
        Self {
            args,
            mongo,
            store,
            settings,
            coordinator,
            scanner,
            jwt,
        }
    }
}

/// Route a request to the dispatcher owning its path prefix
async fn route(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let path = req.uri().path().to_string();
    debug!(method = %req.method(), path = %path, "Request");

    let response = if path == "/health" || path == "/version" {
        routes::handle_health_request(req, state).await
    } else if path.starts_with("/auth") {
        routes::handle_auth_request(req, state).await
    } else if path.starts_with("/residents") {
        routes::handle_resident_request(req, state).await
    } else if path.starts_with("/visitors") {
        routes::handle_visitor_request(req, state).await
    } else if path.starts_with("/requests") {
        routes::handle_request_routes(req, state).await
    } else if path.starts_with("/scanner") {
        routes::handle_scanner_request(req, state).await
    } else {
        None
    };

    response.unwrap_or_else(|| error_response(StatusCode::NOT_FOUND, "Not found"))
}

/// Run the HTTP server until the process exits
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await.map_err(|e| {
        crate::types::GatekeeperError::Config(format!(
            "Cannot bind {}: {}",
            state.args.listen, e
        ))
    })?;

    info!("Listening on {}", state.args.listen);

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Accept failed: {}", e);
                continue;
            }
        };

        let state = Arc::clone(&state);
        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |req| {
                let state = Arc::clone(&state);
                async move { Ok::<_, hyper::Error>(route(req, state).await) }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!(peer = %peer, "Connection error: {}", e);
            }
        });
    }
}
