//! AgentMesh HTTP API
//!
//! | Route | Purpose |
//! |---|---|
//! | `GET /health` | liveness |
//! | `POST /api/v1/agents` | register an agent |
//! | `GET /api/v1/agents` | ranked discovery |
//! | `GET /api/v1/agents/:id` | agent, reputation and recent tasks |
//! | `POST /api/v1/orchestrate` | run a paid workflow (`X-Payment-Reference`) |
//!
//! A workflow without a payment reference, or with one the gate rejects,
//! gets `402 Payment Required` with a payment challenge in the body.

pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use config::{ApiSettings, ServerConfig};
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use state::AppState;

fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/agents",
            get(handlers::agents::list_agents).post(handlers::agents::register_agent),
        )
        .route("/agents/:id", get(handlers::agents::get_agent))
        .route("/orchestrate", post(handlers::orchestrate::orchestrate))
}

/// Create the application router
pub fn create_router(state: AppState, config: &ApiSettings) -> Router {
    let mut router = Router::new()
        .nest("/api/v1", api_v1_routes())
        .route("/health", get(handlers::health::health_check))
        .with_state(state);

    if config.enable_tracing {
        router = router.layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                )
            },
        ));
    }

    if config.enable_cors {
        let cors = if config.cors_origins.iter().any(|o| o == "*") {
            CorsLayer::permissive()
        } else {
            CorsLayer::new()
                .allow_origin(
                    config
                        .cors_origins
                        .iter()
                        .filter_map(|o| o.parse().ok())
                        .collect::<Vec<_>>(),
                )
                .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
                .allow_headers([
                    axum::http::header::CONTENT_TYPE,
                    axum::http::HeaderName::from_static("x-payment-reference"),
                    axum::http::HeaderName::from_static("x-requester-agent"),
                ])
        };
        router = router.layer(cors);
    }

    router
}
