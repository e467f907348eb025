mod config;
mod error;
mod inference;
mod models;
mod prompt;
mod routes;
mod session;
mod validation;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use tower::ServiceBuilder;
use tower_http::{cors::{Any, CorsLayer}, trace::TraceLayer};
use tracing_subscriber::{fmt, EnvFilter};

use crate::{config::Config, inference::InferenceClient, routes::{router, spawn_session_sweeper, AppState}};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = Config::from_env();
    if config.api_token.is_none() {
        tracing::warn!("HF_API_TOKEN is not set; every generation will fail");
    }
    tracing::info!("Using API token: {}", config.masked_token());
    tracing::info!("Inference endpoint: {}", config.endpoint());

    let client = InferenceClient::new(&config).context("building inference HTTP client")?;
    let state = AppState::new(Arc::new(client));
    spawn_session_sweeper(state.clone(), config.session_ttl, Duration::from_secs(60));

    let app = router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("binding {}", addr))?;
    tracing::info!(%addr, "Starting server");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
