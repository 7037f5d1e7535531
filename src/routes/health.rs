//! Health and version endpoints

use hyper::{Method, Request, Response, StatusCode};
use serde_json::json;

use crate::routes::helpers::*;

pub async fn handle_health_request(
    req: Request<hyper::body::Incoming>,
    state: State,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path();
    let method = req.method();

    let response = match (method, path) {
        (&Method::GET, "/health") => health_check(state).await,
        (&Method::GET, "/version") => version_info(),
        _ => return None,
    };

    Some(response)
}

async fn health_check(state: State) -> Response<BoxBody> {
    let mongo_ok = state
        .mongo
        .inner()
        .database(state.mongo.db_name())
        .run_command(bson::doc! { "ping": 1 })
        .await
        .is_ok();

    let status = if mongo_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    json_response(
        status,
        &json!({
            "success": mongo_ok,
            "mongo": mongo_ok,
            "nodeId": state.args.node_id,
        }),
    )
}

fn version_info() -> Response<BoxBody> {
    success_response(&json!({
        "success": true,
        "version": env!("CARGO_PKG_VERSION"),
        "commit": option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
        "builtAt": option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
    }))
}
