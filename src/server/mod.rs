//! HTTP server for Gatekeeper

mod http;

pub use http::{run, AppState};
