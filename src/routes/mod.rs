//! HTTP routes for the annotation server

pub mod annotations;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check(State(_state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Health check plus the annotation API under `/api/annotations`
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/annotations", annotations::router())
}
