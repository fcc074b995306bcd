//! HTTP transport layer using Axum
//!
//! Delivers inbound health events and admin operations to the controller.
//! Kept deliberately thin: authentication and classification happen at the
//! boundary; everything stateful goes through the orchestrator.

pub mod auth;
pub mod handlers;
mod routes;

pub use handlers::ControllerState;

use axum::Router;
use tower_http::trace::TraceLayer;

/// Create the complete application router.
pub fn create_app(state: ControllerState) -> Router {
    routes::api_routes(state).layer(TraceLayer::new_for_http())
}
