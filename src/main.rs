//! Session engine server.
//!
//! Serves the HTTP API and runs the background jobs until Ctrl+C or
//! SIGTERM.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use academy_sessions::api::{AppState, create_router};
use academy_sessions::config::ConfigLoader;
use academy_sessions::engine::Engine;
use academy_sessions::jobs::Scheduler;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "academy-sessions")]
#[command(about = "Session lifecycle and attendance engine")]
#[command(version)]
struct Args {
    /// Directory holding engine.yaml and academies.yaml
    #[arg(short, long, default_value = "./config/default", env = "ACADEMY_CONFIG_DIR")]
    config_dir: PathBuf,

    /// Port to listen on
    #[arg(short, long, default_value = "3000", env = "PORT")]
    port: u16,

    /// Serve the API without running background jobs
    #[arg(long, env = "ACADEMY_NO_JOBS")]
    no_jobs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "academy_sessions=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    info!(config_dir = %args.config_dir.display(), "Loading configuration");

    let config = ConfigLoader::load(&args.config_dir).context("Failed to load configuration")?;
    let engine = Engine::in_memory(config);

    let scheduler = if args.no_jobs {
        info!("Background jobs disabled");
        None
    } else {
        Some(Scheduler::start(engine.clone()))
    };

    let app = create_router(AppState::new(engine));
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(scheduler) = scheduler {
        scheduler.shutdown().await;
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
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
