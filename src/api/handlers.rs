//! HTTP request handlers

use super::types::{HealthResponse, InfoResponse};
use super::AppState;
use crate::framer::sse_headers;
use axum::{
    body::{Body, Bytes},
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use std::convert::Infallible;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(info))
        .route("/health", get(health))
        .route("/version", get(get_version))
        // Run endpoint, plus the path older clients still post to
        .route("/agent", post(run_agent))
        .route("/agno-agent", post(run_agent))
        .with_state(state)
}

// ============================================================
// Runs
// ============================================================

/// Always answers 200 with an event stream. Bad requests are reported
/// in-band as `RUN_ERROR`, never as an HTTP error status.
async fn run_agent(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let records = state
        .controller
        .stream_body(&body)
        .map(Ok::<_, Infallible>);
    (sse_headers(), Body::from_stream(records))
}

// ============================================================
// Liveness
// ============================================================

async fn info() -> Json<InfoResponse> {
    Json(InfoResponse {
        message: "AG-UI stream server is running".to_string(),
    })
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let adapter = state.controller.adapter();
    Json(HealthResponse {
        status: "healthy",
        agent: "ready",
        protocol: "AG-UI",
        backend: adapter.backend().to_string(),
        model: adapter.model_id().to_string(),
    })
}

async fn get_version() -> &'static str {
    concat!("agui_stream ", env!("CARGO_PKG_VERSION"))
}
