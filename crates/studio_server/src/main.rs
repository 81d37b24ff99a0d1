mod config;
mod metrics;
mod routes;
mod state;

use crate::config::Config;
use crate::metrics::Metrics;
use crate::state::AppState;
use angle_render::{AngleRenderer, HttpRenderApi};
use anyhow::Context;
use clap::Parser;
use persona_chat::{ChatClient, ChatService, InMemoryMessageStore};
use std::{net::SocketAddr, sync::Arc};
use tokio::{sync::watch, task::JoinHandle};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let config = Config::parse();
    tracing::info!(config = ?config, "Loaded configuration");

    let metrics = Arc::new(Metrics::new()?);

    let render_api = HttpRenderApi::new(config.render_endpoints())
        .context("Failed to build render service client")?;
    let renderer = AngleRenderer::new(
        Arc::new(render_api),
        config.render_config(),
        metrics.render.clone(),
    );

    let completion = ChatClient::new(config.chat_completion_url.clone(), config.chat_timeout())
        .context("Failed to build chat completion client")?;
    let chat = ChatService::new(Arc::new(completion), Arc::new(InMemoryMessageStore::new()));

    let state = AppState {
        renderer: Arc::new(renderer),
        chat: Arc::new(chat),
        metrics: metrics.clone(),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(());

    let api_handle = spawn_server(
        "API",
        routes::router(state),
        config.listen_addr,
        shutdown_rx.clone(),
    );
    let metrics_handle = spawn_server(
        "Metrics",
        metrics.router(),
        config.metrics_listen_addr,
        shutdown_rx,
    );

    tracing::info!("All services started. Awaiting shutdown signal...");
    shutdown_signal().await;

    tracing::info!("Shutdown signal received. Terminating services...");
    // Dropping the sender resolves every receiver's `changed()`.
    drop(shutdown_tx);

    let (api_res, metrics_res) = tokio::join!(api_handle, metrics_handle);
    log_exit("API server", api_res);
    log_exit("Metrics server", metrics_res);

    tracing::info!("Studio server shut down gracefully.");
    Ok(())
}

fn spawn_server(
    name: &'static str,
    router: axum::Router,
    addr: SocketAddr,
    mut shutdown: watch::Receiver<()>,
) -> JoinHandle<anyhow::Result<()>> {
    tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {name} listener on {addr}"))?;
        tracing::info!(addr = %addr, "{name} server started");
        let app = router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.changed().await;
            })
            .await
            .with_context(|| format!("{name} server failed"))?;
        Ok(())
    })
}

fn log_exit(name: &str, res: Result<anyhow::Result<()>, tokio::task::JoinError>) {
    match res {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = ?e, "{name} task failed."),
        Err(e) => tracing::error!(error = %e, "{name} task panicked."),
    }
}

/// Listens for OS shutdown signals (SIGINT, SIGTERM) and resolves when one is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
