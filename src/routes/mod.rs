//! HTTP routes for Gatekeeper

pub mod auth_routes;
pub mod health;
pub mod helpers;
pub mod requests;
pub mod residents;
pub mod scanner_routes;
pub mod visitors;

pub use auth_routes::handle_auth_request;
pub use health::handle_health_request;
pub use requests::handle_request_routes;
pub use residents::handle_resident_request;
pub use scanner_routes::handle_scanner_request;
pub use visitors::handle_visitor_request;
