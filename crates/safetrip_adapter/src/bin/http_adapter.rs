#![forbid(unsafe_code)]

use std::sync::Arc;

use safetrip_adapter::{build_router, AdapterConfig, AppRuntime, StoreBackend};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AdapterConfig::from_env()?;
    if config.jwt_secret_is_default {
        tracing::warn!("SAFETRIP_JWT_SECRET not set, signing tokens with the development secret");
    }
    match &config.store {
        StoreBackend::Memory => tracing::info!("using in-memory store"),
        StoreBackend::Sqlite(path) => {
            tracing::info!(path = %path.display(), "using sqlite document store")
        }
    }

    let runtime = Arc::new(AppRuntime::from_config(&config)?);
    let app = build_router(runtime);

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!(addr = %config.bind, "safetrip_adapter_http listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("safetrip_adapter_http stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
