//! Health endpoint

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::worker::WorkerPool;

/// Body of `GET /health`
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub active_jobs: usize,
}

async fn health(State(pool): State<WorkerPool>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        active_jobs: pool.active_jobs(),
    })
}

/// Router serving the liveness endpoint
pub fn health_router(pool: WorkerPool) -> Router {
    Router::new()
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(pool)
}
