//! # keel-sync: Auto-Update Engine for Keel
//!
//! Tracks locally modified repository files and keeps handing them to the
//! transfer service until each upload is confirmed, across network outages
//! and process restarts.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Auto-Update Engine                                 │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                AutoUpdateManager (façade)                        │  │
//! │  │                                                                  │  │
//! │  │  add_task · on_upload_succeeded · on_network_changed · stop      │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │  PendingSet    │  │ SchedulerLoop  │  │     Dispatcher         │    │
//! │  │                │  │                │  │                        │    │
//! │  │ Dedup on the   │  │ Every 3s while │  │ Only caller of the     │    │
//! │  │ five-field key │  │ online: resub- │  │ TransferService        │    │
//! │  │ One lock       │  │ mit everything │  │                        │    │
//! │  └───────┬────────┘  └────────────────┘  └────────────────────────┘    │
//! │          ▼                                                              │
//! │  ┌────────────────┐       ┌──────────────────────────┐                 │
//! │  │ Persistence    │──────►│ PendingStore             │                 │
//! │  │ Writer (FIFO)  │       │ (SqlitePendingStore)     │                 │
//! │  └────────────────┘       └──────────────────────────┘                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`config`] - Scheduler and storage configuration
//! - [`error`] - Engine error types
//! - [`manager`] - `AutoUpdateManager` façade
//! - [`network`] - Connectivity oracle
//! - [`pending`] - The shared pending set
//! - [`scheduler`] - Scheduler state and passes
//! - [`store`] - Durable store trait and SQLite implementation
//! - [`transfer`] - Transfer service seam
//!
//! ## Usage
//!
//! ```rust,ignore
//! use keel_sync::{AutoUpdateManager, NetworkFlag, SchedulerConfig, SqlitePendingStore};
//!
//! let config = SchedulerConfig::load_or_default(None);
//! let network = NetworkFlag::new(true);
//! let manager = AutoUpdateManager::new(Arc::new(store), Arc::new(network.clone()), config);
//!
//! manager.attach_transfer_service(transfer).await;
//! manager.add_task(account, repo_id, repo_name, "/docs/a.txt", "/sdcard/docs/a.txt").await;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod manager;
pub mod network;
pub mod pending;
pub mod scheduler;
pub mod store;
pub mod transfer;

mod dispatcher;
mod persist;

#[cfg(test)]
mod test_support;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{SchedulerConfig, SchedulerSettings, StorageSettings};
pub use error::{SyncError, SyncResult};
pub use manager::{AutoUpdateManager, AutoUpdateStatus};
pub use network::{NetworkFlag, NetworkMonitor};
pub use pending::PendingSet;
pub use persist::BacklogRetry;
pub use scheduler::{PassOutcome, SchedulerState};
pub use store::{PendingStore, SqlitePendingStore};
pub use transfer::TransferService;
