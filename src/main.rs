//! PhotoRestore backend - main entry point
//!
//! HTTP service that accepts photo uploads, restores them in the
//! background with local filter chains and optional hosted AI models,
//! and serves job status to a polling frontend.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use photorestore::config::{Args, Config};
use photorestore::services::{HostedEnhancer, RemoteEnhancer, RestorationPipeline};
use photorestore::store::{MemStorage, Storage};
use photorestore::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "photorestore=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = Config::resolve(&args).context("Failed to resolve configuration")?;

    info!("Starting PhotoRestore backend on port {}", config.port);
    info!("Uploads directory: {}", config.uploads_dir.display());

    std::fs::create_dir_all(&config.uploads_dir).with_context(|| {
        format!(
            "Failed to create uploads directory {}",
            config.uploads_dir.display()
        )
    })?;

    let store: Arc<dyn Storage> = Arc::new(MemStorage::new());

    let remote = HostedEnhancer::from_keys(
        config.openai_api_key.clone(),
        config.replicate_api_token.clone(),
    )
    .context("Failed to initialize hosted enhancement clients")?
    .map(|enhancer| Arc::new(enhancer) as Arc<dyn RemoteEnhancer>);

    match &remote {
        Some(_) => info!("Hosted enhancement configured"),
        None => info!("No hosted enhancement keys found, running local-only"),
    }

    let pipeline = Arc::new(RestorationPipeline::new(
        store.clone(),
        remote,
        config.uploads_dir.clone(),
        config.retention(),
    ));

    let port = config.port;
    let state = AppState::new(store, pipeline, Arc::new(config));
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
