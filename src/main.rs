//! Neur - Solana assistant backend
//!
//! Serves chat pages backed by a bounded conversation lookup, verifies
//! Early Access Program payments on chain and proxies the Jupiter token APIs.

mod api;
mod chat;
mod config;
mod db;
mod eap;
mod notify;
mod poll;
mod runtime;
mod tokens;
mod verification;

use api::{create_router, AppState};
use config::AppConfig;
use db::Database;
use eap::HttpVerifier;
use notify::BroadcastNotifier;
use runtime::VerificationRegistry;
use std::net::SocketAddr;
use std::sync::Arc;
use tokens::JupiterClient;
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
                .unwrap_or_else(|_| "neur_gate=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = AppConfig::from_env();

    // Ensure database directory exists
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)?;

    let notifier = Arc::new(BroadcastNotifier::new(64));

    tracing::info!(url = %config.verify_url, "Using payment verification backend");
    let verifier = HttpVerifier::new(&config.verify_url)?;
    let verification = Arc::new(VerificationRegistry::new(
        config.verify_policy,
        Arc::new(verifier),
        Arc::clone(&notifier),
    ));

    let tokens = Arc::new(JupiterClient::new(&config.tokens_url, &config.quote_url)?);

    let state = AppState::new(db, Arc::clone(&verification), notifier, tokens, &config);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Neur server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Teardown: no check may fire after the page is gone
    verification.cancel_all().await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
