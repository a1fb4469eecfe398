//! ebook-convert-server – entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables.
//! 2. Initialise structured tracing (JSON or plain text).
//! 3. Prepare the shared scratch directory.
//! 4. Start the janitor in a background task.
//! 5. Build the Axum router and start the HTTP server with graceful shutdown.

mod config;
mod error;
mod middleware;
mod routes;
mod schemas;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use ebook_convert_core::{Fb2cConverter, Janitor, JanitorConfig, Workspace};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cfg = Config::from_env();

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: EBOOK_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "ebook-convert-server starting");

    // ── 3. Scratch directory ───────────────────────────────────────────────────
    // Absolute paths, because the converter runs with the scratch directory as
    // its working directory.
    let work_dir = std::path::absolute(&cfg.work_dir)?;
    let workspace = Workspace::new(&work_dir);
    workspace.prepare().await?;
    info!(work_dir = %work_dir.display(), "workspace ready");

    let converter_bin = if cfg.converter_bin.components().count() > 1 {
        std::path::absolute(&cfg.converter_bin)?
    } else {
        // Bare program name: leave it to PATH lookup.
        cfg.converter_bin.clone()
    };
    let converter = Fb2cConverter::new(&converter_bin).with_working_dir(&work_dir);
    info!(converter = %converter_bin.display(), "converter configured");

    // ── 4. Janitor ─────────────────────────────────────────────────────────────
    let shutdown = CancellationToken::new();
    let janitor = Janitor::new(JanitorConfig {
        dir: work_dir.clone(),
        interval: cfg.janitor_interval,
        max_age: cfg.janitor_max_age,
        extra_paths: cfg.janitor_extra_paths.clone(),
    })
    .spawn(shutdown.clone());

    // ── 5. HTTP server with graceful shutdown ──────────────────────────────────
    let state = Arc::new(AppState {
        config: Arc::new(cfg.clone()),
        workspace,
        converter: Arc::new(converter),
    });

    let app = routes::build(Arc::clone(&state));
    let addr: SocketAddr = cfg.bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown.cancel();
    if let Err(e) = janitor.await {
        warn!(error = %e, "janitor task ended abnormally");
    }

    info!("ebook-convert-server stopped");
    Ok(())
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c   => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
