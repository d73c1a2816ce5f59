//! RQ API - HTTP server
//!
//! Exposes the resume question pipeline as a single JSON endpoint, plus
//! liveness and readiness checks and an OpenAPI document.

pub mod error;
pub mod handlers;
pub mod state;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use handlers::{health, query};
use state::AppState;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;

/// OpenAPI document
#[derive(OpenApi)]
#[openapi(
    paths(
        query::resume_query_handler,
        health::health_check,
        health::readiness_check
    ),
    components(schemas(
        query::QueryRequest,
        query::QueryResponse,
        error::ApiError,
        health::HealthResponse,
        health::ReadinessResponse,
        health::ReadinessChecks
    )),
    tags(
        (name = "query", description = "Questions about indexed resumes"),
        (name = "health", description = "Liveness and readiness checks")
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {origin}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route(
            "/api/resume-query-metadata",
            post(query::resume_query_handler),
        )
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
