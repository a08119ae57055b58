#![forbid(unsafe_code)]

//! HTTP entry point: resolves configuration, prepares the scratch directory
//! and serves the API until Ctrl+C.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use video_downloader_backend::{
    config::{AppConfig, BackendArgs},
    extractor::YtDlp,
    server::{AppState, router},
};

const DEFAULT_LOG_FILTER: &str = "video_downloader_backend=info,backend=info,tower_http=info";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let config = AppConfig::load(BackendArgs::parse())?;
    config.scratch.prepare()?;

    let ytdlp = YtDlp::new(&config.ytdlp_bin);
    match ytdlp.version() {
        Ok(version) => info!(%version, "using {}", ytdlp.program().display()),
        Err(err) => warn!(
            "{} is not usable yet, requests will fail until it is installed: {err}",
            ytdlp.program().display()
        ),
    }

    let state = AppState::new(Arc::new(ytdlp), config.scratch.clone());
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("binding to {}", config.listen))?;
    info!(
        scratch = %config.scratch.path().display(),
        "API server listening on http://{}",
        config.listen
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running API server")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        warn!("Failed to install Ctrl+C handler: {err}");
    }
}
