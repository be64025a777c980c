//! HTTP API
//!
//! Read endpoints over the curated store plus a manual pipeline trigger.
//! All routes except `/health` sit behind the optional shared-secret
//! check; CORS and request tracing wrap the whole router.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, uri::Uri, HeaderName, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::config::CorsConfig;
use crate::error::ApiError;
use crate::orchestrator::{CycleSummary, PipelineRunner};
use crate::stores::CuratedStore;

pub mod analytics;
pub mod records;

const API_KEY_HEADER: &str = "x-api-key";

/// State shared across handlers.
#[derive(Clone)]
pub struct ApiState {
    pub curated: Arc<dyn CuratedStore>,
    pub runner: Arc<PipelineRunner>,
    pub api_key: Option<String>,
}

/// Build the application router with all routes and middleware.
pub fn create_router(state: ApiState, cors: &CorsConfig) -> Router {
    Router::new()
        .route("/records", get(records::list_records))
        .route("/records/:id", get(records::get_record))
        .route("/analytics", get(analytics::get_analytics))
        .route("/ingest/run", post(run_ingest))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .route("/health", get(health_check))
        .fallback(route_not_found)
        .layer(tracing_layer())
        .layer(cors_layer(cors))
        .with_state(state)
}

/// Reject requests without the configured shared secret. A missing
/// configuration means the deployment is trusted and every request passes.
async fn require_api_key(
    State(state): State<ApiState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(expected) = &state.api_key {
        let presented = request
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok());
        if presented != Some(expected.as_str()) {
            return Err(ApiError::Unauthorized);
        }
    }
    Ok(next.run(request).await)
}

/// Run one pipeline cycle on demand.
async fn run_ingest(State(state): State<ApiState>) -> Result<Json<CycleSummary>, ApiError> {
    let summary = state.runner.run_cycle().await?;
    Ok(Json(summary))
}

/// Liveness probe.
async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

async fn route_not_found(uri: Uri) -> ApiError {
    ApiError::RouteNotFound { path: uri.path().to_string() }
}

/// Create CORS layer from configuration.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::ACCEPT,
            header::CONTENT_TYPE,
            HeaderName::from_static(API_KEY_HEADER),
        ])
        .max_age(std::time::Duration::from_secs(3600));

    let wildcard =
        config.allowed_origins.is_empty() || config.allowed_origins.contains(&"*".to_string());
    if wildcard {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Vec<_> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        cors = cors.allow_origin(origins);
    }

    // Credentials cannot be combined with a wildcard origin.
    if config.allow_credentials && !wildcard {
        cors = cors.allow_credentials(true);
    }

    cors
}

/// Create request tracing layer.
pub fn tracing_layer(
) -> TraceLayer<tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>>
{
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(tower_http::LatencyUnit::Micros),
        )
}
