// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Simforge Server - HTTP API for CFD/FEA workload orchestration
//!
//! Accepts solver inputs over HTTP, runs them as Kubernetes Jobs, and opens
//! ParaView visualization sessions over their results.

use tracing::{info, warn};

use simforge_engine::EngineRuntime;
use simforge_server::config::ServerConfig;
use simforge_server::{AppState, app};

const DEFAULT_LOG_FILTER: &str = "simforge_server=info,simforge_engine=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    let config = ServerConfig::from_env()?;

    info!(
        http_addr = %config.http_addr,
        namespace = %config.engine.kube.namespace,
        storage_dir = %config.engine.storage_dir.display(),
        reconcile_mode = config.engine.reconcile_mode.as_str(),
        "Starting Simforge Server"
    );

    let runtime = EngineRuntime::from_config(&config.engine)?;
    let router = app(AppState::new(&runtime));

    let listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    info!(addr = %config.http_addr, "HTTP server ready");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped");

    // Stops monitor tasks
    runtime.shutdown().await;

    info!("Simforge Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
