mod auth;
mod config;
mod error;
mod middleware;
mod routes;
mod state;

use std::sync::Arc;

use newsroom_core::clock::{Clock, SystemClock};
use newsroom_core::credentials::{AccessToken, TokenProvider};
use newsroom_core::identity::{GoogleIdTokenVerifier, IdentityVerifier, StaticVerifier};
use newsroom_core::queue::{InMemoryQueue, MessageQueue, PubSubQueue};
use newsroom_core::storage::{GcsObjectStore, InMemoryObjectStore, ObjectStore};
use tower_http::limit::RequestBodyLimitLayer;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

const MAX_BODY_BYTES: usize = 256 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience)
    let _ = dotenvy::dotenv();

    let config = AppConfig::from_env().map_err(|e| anyhow::anyhow!("Failed to load config: {e}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    tracing::info!("Starting newsroom API server");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    // One provider for storage and Pub/Sub so the metadata token is fetched once.
    let tokens = TokenProvider::new(AccessToken::from_config(config.gcs_access_token.clone()));
    let store = object_store(&config, tokens.clone())?;
    let queue = message_queue(&config, tokens);
    let verifier = identity_verifier(&config, clock.clone());

    let state = state::AppState::new(config.clone(), store, queue, verifier, clock);

    let app = routes::build_router(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(middleware::request_tracing::trace_layer())
        .layer(middleware::cors::cors_layer());

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

fn object_store(config: &AppConfig, tokens: TokenProvider) -> anyhow::Result<Arc<dyn ObjectStore>> {
    match &config.gcs_bucket {
        Some(bucket) => {
            let store = GcsObjectStore::new(bucket.clone(), tokens)
                .map_err(|e| anyhow::anyhow!("Failed to create object store client: {e}"))?;
            tracing::info!(bucket = bucket.as_str(), "Using Cloud Storage bucket");
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("GCS_BUCKET is not set, serving from an empty in-memory store");
            Ok(Arc::new(InMemoryObjectStore::new()))
        }
    }
}

fn message_queue(config: &AppConfig, tokens: TokenProvider) -> Arc<dyn MessageQueue> {
    match &config.pubsub_project {
        Some(project) => {
            tracing::info!(project = project.as_str(), "Publishing jobs to Pub/Sub");
            Arc::new(PubSubQueue::new(project.clone(), tokens))
        }
        None => {
            tracing::warn!("PUBSUB_PROJECT is not set, triggered jobs are only recorded in memory");
            Arc::new(InMemoryQueue::new())
        }
    }
}

fn identity_verifier(config: &AppConfig, clock: Arc<dyn Clock>) -> Arc<dyn IdentityVerifier> {
    match &config.google_client_id {
        Some(client_id) => Arc::new(GoogleIdTokenVerifier::new(client_id.clone(), clock)),
        None => {
            tracing::warn!("GOOGLE_CLIENT_ID is not set, all bearer tokens will be rejected");
            Arc::new(StaticVerifier::new())
        }
    }
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { tracing::info!("Received Ctrl+C, shutting down..."); }
        _ = terminate => { tracing::info!("Received SIGTERM, shutting down..."); }
    }
}
