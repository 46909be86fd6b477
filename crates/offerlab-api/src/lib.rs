//! OfferLab API /v1: REST endpoints over the stage pipeline
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod provider;
pub mod state;

pub use config::{ApiConfig, StartupError};
pub use error::ApiError;
pub use provider::AnthropicInference;
pub use state::AppState;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/v1/stages/{id}", post(handlers::run_stage))
        .route("/v1/stages/{id}/stream", post(handlers::stream_stage))
        .route("/v1/pipelines/{name}", post(handlers::run_pipeline))
        .route("/v1/registry/stages", get(handlers::list_stages))
        .route("/v1/registry/stages/{id}", get(handlers::get_stage))
        .route("/v1/registry/pipelines", get(handlers::list_pipelines))
        .route("/v1/registry/upgrade-status", get(handlers::upgrade_status))
        .route("/v1/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(axum::middleware::from_fn(middleware::log_requests))
        .layer(middleware::cors())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(config: ApiConfig) -> Result<(), StartupError> {
    let state = AppState::from_config(&config)?;
    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(&config.addr).await?;

    tracing::info!(addr = %config.addr, "OfferLab API listening");
    axum::serve(listener, app).await?;
    Ok(())
}
