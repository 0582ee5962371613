//! # Keel Agent
//!
//! Runs the auto-update engine against a SQLite store and drives it from a
//! line protocol on stdin.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  config ──► Database ──► SqlitePendingStore ──► AutoUpdateManager       │
//! │                                                    │                    │
//! │                                 attach(LoggingTransfer)                 │
//! │                                                    │                    │
//! │  stdin lines ──► Command ──► manager ◄─────────────┘                    │
//! │                                                                         │
//! │  quit / EOF / Ctrl+C / SIGTERM ──► shutdown ──► close database          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```text
//! keel-agent [config.toml]
//! ```

mod command;
mod transfer;

use anyhow::Context;
use serde::Serialize;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use keel_core::AccountIdentity;
use keel_db::{Database, DbConfig};
use keel_sync::{
    AutoUpdateManager, AutoUpdateStatus, NetworkFlag, PendingStore, SchedulerConfig,
    SqlitePendingStore,
};

use crate::command::Command;
use crate::transfer::LoggingTransfer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting Keel agent...");

    // Load configuration
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = SchedulerConfig::load(config_path).context("Failed to load configuration")?;

    let db_path = config
        .database_path()
        .context("No database path available on this platform")?;
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    info!(
        path = %db_path.display(),
        interval_ms = config.scheduler.check_interval_ms,
        "Configuration loaded"
    );

    // Open the durable store
    let db = Database::new(
        DbConfig::new(&db_path).max_connections(config.storage.max_connections),
    )
    .await
    .context("Failed to open database")?;
    match db.migration_status().await {
        Ok(status) => info!(applied = status.applied, embedded = status.embedded, "Schema ready"),
        Err(e) => warn!(error = %e, "Could not read migration status"),
    }
    let store = Arc::new(SqlitePendingStore::new(db.clone()));

    // Build the engine
    let network = NetworkFlag::new(true);
    let manager = AutoUpdateManager::new(store.clone(), Arc::new(network.clone()), config);
    manager
        .attach_transfer_service(Arc::new(LoggingTransfer))
        .await;

    let console = Console {
        manager: manager.clone(),
        network,
        store,
    };

    tokio::select! {
        result = console.run(spawn_stdin_reader()) => result?,
        _ = shutdown_signal() => {},
    }

    manager.shutdown().await;
    db.close().await;

    info!("Keel agent stopped");
    Ok(())
}

/// Initializes the tracing subscriber.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=keel=trace` - Show every submission
/// - Default: `info,keel=debug,sqlx=warn`
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,keel=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

// =============================================================================
// Console
// =============================================================================

/// Reads stdin on a plain thread so a pending read never holds up shutdown.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(64);

    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read stdin");
                    break;
                }
            }
        }
    });

    rx
}

struct Console {
    manager: AutoUpdateManager,
    network: NetworkFlag,
    store: Arc<SqlitePendingStore>,
}

#[derive(Serialize)]
struct StatusReport {
    #[serde(flatten)]
    engine: AutoUpdateStatus,
    stored: Option<u64>,
}

impl Console {
    /// Processes lines until `quit` or end of input.
    async fn run(&self, mut lines: mpsc::Receiver<String>) -> anyhow::Result<()> {
        while let Some(line) = lines.recv().await {
            match Command::parse(&line) {
                Ok(None) => {}
                Ok(Some(Command::Quit)) => {
                    info!("Quit requested");
                    return Ok(());
                }
                Ok(Some(command)) => self.execute(command).await?,
                Err(e) => warn!(error = %e, line = %line.trim(), "Ignoring malformed command"),
            }
        }

        info!("End of input");
        Ok(())
    }

    async fn execute(&self, command: Command) -> anyhow::Result<()> {
        match command {
            Command::Add {
                account,
                repo_id,
                repo_name,
                repo_file_path,
                local_path,
            } => {
                self.manager
                    .add_task(account, repo_id, repo_name, &repo_file_path, local_path)
                    .await;
            }
            Command::Done {
                account,
                repo_id,
                parent_dir,
                local_path,
            } => {
                let account = AccountIdentity::new(account);
                self.manager
                    .on_upload_succeeded(&account, &repo_id, &parent_dir, &local_path)
                    .await;
            }
            Command::Online => {
                self.network.set(true);
                self.manager.on_network_changed(true);
            }
            Command::Offline => {
                self.network.set(false);
                self.manager.on_network_changed(false);
            }
            Command::Status => {
                let stored = match self.store.count().await {
                    Ok(count) => Some(count),
                    Err(e) => {
                        warn!(error = %e, "Failed to count stored records");
                        None
                    }
                };
                let report = StatusReport {
                    engine: self.manager.status().await,
                    stored,
                };
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            Command::Quit => {}
        }
        Ok(())
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
