//! Autoheal Controller — process bootstrap and task supervision
//!
//! # Usage
//!
//! ```bash
//! # Run with defaults (state under ./data/autoheal, listen on :5000)
//! cargo run --release
//!
//! # Override the bind address and state directory
//! ./autoheal-controller --addr 0.0.0.0:8080 --data-dir /var/lib/autoheal
//! ```
//!
//! # Environment Variables
//!
//! - `CRITICAL_SERVICE_NAME`: workload this controller acts on
//! - `CRITICAL_FAIL_COUNT`: failures before the restart triggers (default: 3)
//! - `COOLDOWN_PERIOD`: quiet period in seconds (default: 300)
//! - `WEBHOOK_SECRET`: shared secret; empty disables auth (dev only)
//! - `WEBHOOK_URL_CRITICAL` / `WEBHOOK_URL_FINAL`: alert webhook URLs
//! - `RUST_LOG`: logging level (default: info)

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use autoheal_controller::{
    create_app, AppConfig, ControllerState, DiscordNotifier, DockerComposeExecutor,
    NarrativeFirst, RecoveryOrchestrator, ResolutionSweeper, SledBackend, StateStore,
};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "autoheal-controller")]
#[command(about = "Auto-remediation controller for a critical containerized workload")]
#[command(version)]
struct CliArgs {
    /// Override the server address (default: "0.0.0.0:5000")
    #[arg(short, long)]
    addr: Option<String>,

    /// Override the state directory (default: STATE_PATH or ./data/autoheal)
    #[arg(long)]
    data_dir: Option<String>,

    /// Wipe persisted controller state on startup.
    /// WARNING: This is destructive and cannot be undone!
    #[arg(long)]
    reset_db: bool,
}

// ============================================================================
// Task Names for Supervisor Logging
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    HttpServer,
    ResolutionSweeper,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::HttpServer => write!(f, "HttpServer"),
            TaskName::ResolutionSweeper => write!(f, "ResolutionSweeper"),
        }
    }
}

/// Remove the state directory before startup when `--reset-db` is given.
fn reset_data_directory(path: &str) -> Result<()> {
    let data_path = std::path::Path::new(path);
    if !data_path.exists() {
        info!("State directory does not exist, nothing to reset");
        return Ok(());
    }
    warn!("--reset-db: removing {}", data_path.display());
    std::fs::remove_dir_all(data_path).context("Failed to remove state directory")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = CliArgs::parse();

    info!("🚀 Starting Autoheal Controller");

    let mut config = AppConfig::from_env();
    if let Some(dir) = args.data_dir {
        config.state_path = dir;
    }
    config.log_summary();
    let config = Arc::new(config);

    if args.reset_db {
        reset_data_directory(&config.state_path)?;
    }

    let backend = SledBackend::open(&config.state_path)
        .with_context(|| format!("Failed to open state database at {}", config.state_path))?;
    let store = Arc::new(StateStore::open(Box::new(backend), config.history_limit));

    let notifier = Arc::new(DiscordNotifier::new(
        config.webhook_url_critical.clone(),
        config.webhook_url_final.clone(),
    ));
    let executor = Arc::new(DockerComposeExecutor::new(
        config.compose_file.clone(),
        config.restart_step_timeout,
    ));

    let orchestrator = Arc::new(RecoveryOrchestrator::new(
        store.clone(),
        executor,
        notifier.clone(),
        config.clone(),
    ));

    // A restart interrupted by a previous crash surfaces as PAUSED now,
    // before any traffic is served.
    orchestrator.recover_interrupted().await;

    let state = ControllerState {
        orchestrator,
        store: store.clone(),
        classifier: Arc::new(NarrativeFirst::new()),
        config: config.clone(),
    };
    let app = create_app(state);

    let server_addr = args
        .addr
        .or_else(|| std::env::var("AUTOHEAL_SERVER_ADDR").ok())
        .unwrap_or_else(|| "0.0.0.0:5000".to_string());
    let listener = tokio::net::TcpListener::bind(&server_addr)
        .await
        .with_context(|| format!("Failed to bind to {server_addr}"))?;
    info!("✓ HTTP server listening on {}", server_addr);

    let cancel_token = CancellationToken::new();
    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();

    // HTTP server task
    {
        let cancel = cancel_token.clone();
        task_set.spawn(async move {
            info!("[HttpServer] Task starting");
            let result = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                cancel.cancelled().await;
                info!("[HttpServer] Received shutdown signal");
            })
            .await;

            match result {
                Ok(()) => Ok(TaskName::HttpServer),
                Err(e) => Err(anyhow::anyhow!("HTTP server error: {e}")),
            }
        });
    }

    // Resolution sweeper task
    {
        let sweeper = ResolutionSweeper::new(store, notifier, config);
        let cancel = cancel_token.clone();
        task_set.spawn(async move {
            sweeper.run(cancel).await;
            Ok(TaskName::ResolutionSweeper)
        });
    }

    // Supervisor: shut everything down on Ctrl-C or first task exit.
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl-C, shutting down");
            cancel_token.cancel();
        }
        Some(result) = task_set.join_next() => {
            match result {
                Ok(Ok(name)) => warn!("[{name}] Task exited unexpectedly"),
                Ok(Err(e)) => error!("Task failed: {e}"),
                Err(e) => error!("Task panicked: {e}"),
            }
            cancel_token.cancel();
        }
    }

    while let Some(result) = task_set.join_next().await {
        match result {
            Ok(Ok(name)) => info!("[{name}] Graceful shutdown complete"),
            Ok(Err(e)) => error!("Task failed during shutdown: {e}"),
            Err(e) => error!("Task panicked during shutdown: {e}"),
        }
    }

    info!("Autoheal Controller stopped");
    Ok(())
}
