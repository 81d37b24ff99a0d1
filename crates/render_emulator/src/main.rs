mod config;
mod emulator;
mod metrics;

use crate::config::Config;
use crate::emulator::Emulator;
use crate::metrics::EmulatorMetrics;
use anyhow::Context;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let cfg = Config::from_env()?;
    tracing::info!(config = ?cfg, "Starting render emulator");

    let metrics = Arc::new(EmulatorMetrics::new()?);

    // Start metrics server
    let router = metrics.router();
    let metrics_addr = cfg.metrics_listen_addr;
    tokio::spawn(async move {
        let result = async {
            let listener = TcpListener::bind(metrics_addr).await?;
            tracing::info!(addr = %metrics_addr, "Metrics server started");
            axum::serve(listener, router.into_make_service()).await?;
            Ok::<(), anyhow::Error>(())
        };
        if let Err(e) = result.await {
            tracing::error!(error = ?e, "Metrics server failed");
        }
    });

    let listen_addr = cfg.listen_addr;
    let app = emulator::router(Arc::new(Emulator::new(cfg, metrics)));
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("Failed to bind {listen_addr}"))?;
    tracing::info!(addr = %listen_addr, "Render emulator listening");

    axum::serve(listener, app.into_make_service())
        .await
        .context("Render emulator server failed")
}
