//! API route definitions
//!
//! - POST /autoheal-event — health event intake
//! - POST /reset          — admin state reset
//! - GET  /status         — state snapshot + policy
//! - GET  /health         — liveness probe

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{self, ControllerState};

/// Create all controller routes.
pub fn api_routes(state: ControllerState) -> Router {
    Router::new()
        .route("/autoheal-event", post(handlers::handle_autoheal_event))
        .route("/reset", post(handlers::reset_state))
        .route("/status", get(handlers::get_status))
        .route("/health", get(handlers::health_check))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::NarrativeFirst;
    use crate::config::AppConfig;
    use crate::executor::DockerComposeExecutor;
    use crate::notifier::NullNotifier;
    use crate::orchestrator::RecoveryOrchestrator;
    use crate::store::{MemoryBackend, StateStore};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn create_test_state() -> ControllerState {
        let config = Arc::new(AppConfig::default());
        let store = Arc::new(StateStore::open(
            Box::new(MemoryBackend::new()),
            config.history_limit,
        ));
        let orchestrator = Arc::new(RecoveryOrchestrator::new(
            store.clone(),
            Arc::new(DockerComposeExecutor::new(
                "/nonexistent/compose.yml",
                Duration::from_secs(1),
            )),
            Arc::new(NullNotifier),
            config.clone(),
        ));
        ControllerState {
            orchestrator,
            store,
            classifier: Arc::new(NarrativeFirst::new()),
            config,
        }
    }

    #[tokio::test]
    async fn test_api_routes_health() {
        let app = api_routes(create_test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_routes_status() {
        let app = api_routes(create_test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_event_requires_json_body() {
        let app = api_routes(create_test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/autoheal-event")
                    .header("content-type", "application/json")
                    .body(Body::from("not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
