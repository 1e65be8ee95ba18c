// Copyright 2026 The Projexa Project
// SPDX-License-Identifier: Apache-2.0

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use projexa::backend::{GenerationBackend, OllamaBackend};
use projexa::config;
use projexa::server;
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "projexa", version, about = "Streaming code-summary service")]
struct Cli {
    /// Path to a projexa.yaml config file. Defaults apply when omitted.
    #[arg(long, env = "PROJEXA_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8000", env = "PROJEXA_BIND")]
    bind: SocketAddr,
}

/// `LOG_LEVEL` wins over `RUST_LOG`; `info` otherwise.
fn env_filter() -> EnvFilter {
    std::env::var("LOG_LEVEL")
        .ok()
        .and_then(|level| EnvFilter::try_new(level.to_ascii_lowercase()).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .json()
        .with_target(false)
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match config::load_from_path(cli.config.as_deref()) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            tracing::error!("failed to load config: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        display_name = %config.display_name,
        app_version = %config.app_version,
        backend_model = %config.backend.model,
        backend_host = %config.backend.host,
        max_bytes = config.limits.max_bytes,
        max_words_out = config.limits.max_words_out,
        stream_timeout_s = config.limits.stream_timeout.as_secs_f64(),
        backend_timeout_s = config.backend.timeout.as_secs_f64(),
        cors_origins = ?config.cors.allowed_origins,
        config_hash = %config.config_hash,
        "config loaded"
    );

    let backend: Arc<dyn GenerationBackend> = match OllamaBackend::from_config(&config.backend) {
        Ok(b) => Arc::new(b),
        Err(e) => {
            tracing::error!("failed to build backend client: {e}");
            std::process::exit(1);
        }
    };

    let app = server::build_router(Arc::clone(&config), backend);

    let listener = match tokio::net::TcpListener::bind(cli.bind).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(addr = %cli.bind, "failed to bind: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(addr = %cli.bind, "projexa listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("server error: {e}");
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received terminate signal, shutting down"),
    }
}
