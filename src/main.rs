//! AG-UI stream server
//!
//! Accepts a conversation over HTTP, asks a generation backend for a reply,
//! and streams the reply back as an ordered sequence of AG-UI events over
//! Server-Sent Events.

mod api;
mod chunker;
mod config;
mod controller;
mod framer;
mod generation;
mod ids;
mod protocol;
mod run;
mod shutdown;

use api::{create_router, AppState};
use config::ServerConfig;
use controller::{RunController, RunSettings};
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agui_stream=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = ServerConfig::from_env();

    let adapter = generation::build_adapter(&config)?;
    tracing::info!(
        backend = adapter.backend(),
        model = adapter.model_id(),
        timeout_secs = config.generation_timeout.as_secs(),
        chunk_policy = %config.chunk_policy,
        chunk_delay_ms = u64::try_from(config.chunk_delay.as_millis()).unwrap_or(u64::MAX),
        "Generation backend ready"
    );

    // Runs in flight watch this token; the signal handler cancels it
    let shutdown = CancellationToken::new();
    let controller =
        RunController::new(adapter, RunSettings::from(&config)).with_shutdown(shutdown.clone());

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(AppState::new(controller))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("AG-UI stream server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::shutdown_signal(shutdown))
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
