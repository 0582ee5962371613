//! # Auto-Update Manager
//!
//! Public façade of the engine. The file watcher, the transfer service's
//! completion callback, the host's connectivity callback and the shutdown
//! path all go through a clone of [`AutoUpdateManager`].
//!
//! ## Data Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  watcher ──add_task──► PendingSet.try_add ──► store.save                │
//! │                              │                                          │
//! │                              └─ online & running? ──► submit            │
//! │                                                                         │
//! │  scheduler (every interval) ──► for_each_snapshot ──► submit            │
//! │                                                                         │
//! │  submit ──► Dispatcher ──► TransferService.add_upload_task              │
//! │                                    │                                    │
//! │  on_upload_succeeded ◄─────────────┘                                    │
//! │        └─► PendingSet.remove_matching ──► store.remove (background)     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use keel_core::UploadRequest;
//! use keel_db::{Database, DbConfig};
//! use keel_sync::{AutoUpdateManager, NetworkFlag, SchedulerConfig, SqlitePendingStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(DbConfig::new("keel.db")).await?;
//! let manager = AutoUpdateManager::new(
//!     Arc::new(SqlitePendingStore::new(db)),
//!     Arc::new(NetworkFlag::new(true)),
//!     SchedulerConfig::default(),
//! );
//!
//! manager
//!     .attach_transfer_service(Arc::new(|request: UploadRequest| {
//!         println!("upload {}", request.local_path);
//!     }))
//!     .await;
//!
//! manager
//!     .add_task("alice", "repo1", "Repo One", "/docs/a.txt", "/sdcard/docs/a.txt")
//!     .await;
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use keel_core::{parent_path, AccountIdentity, PendingRecord};

use crate::config::{SchedulerConfig, SchedulerSettings};
use crate::dispatcher::{Dispatcher, DispatcherHandle};
use crate::network::NetworkMonitor;
use crate::pending::PendingSet;
use crate::scheduler::{PassOutcome, SchedulerContext, SchedulerLoop, SchedulerState};
use crate::store::PendingStore;
use crate::transfer::{empty_slot, TransferService, TransferSlot};

// =============================================================================
// Status
// =============================================================================

/// Point-in-time view of the engine.
#[derive(Debug, Clone, Serialize)]
pub struct AutoUpdateStatus {
    /// Lifecycle state.
    pub state: SchedulerState,

    /// Whether a transfer service is attached.
    pub attached: bool,

    /// Current answer of the network monitor.
    pub network_available: bool,

    /// Records awaiting confirmation.
    pub pending: usize,

    /// Durable operations awaiting a retry.
    pub backlog: usize,

    /// Requests handed to the transfer service since start.
    pub submitted_total: u64,

    /// When the last scheduling pass finished.
    pub last_pass_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Manager
// =============================================================================

/// Coordinates the pending set, the scheduler loop and the dispatcher.
///
/// Clones share the same engine.
#[derive(Clone)]
pub struct AutoUpdateManager {
    inner: Arc<Inner>,
}

struct Inner {
    pending: Arc<PendingSet>,
    network: Arc<dyn NetworkMonitor>,
    transfer: TransferSlot,
    dispatcher: DispatcherHandle,
    context: Arc<SchedulerContext>,
    wake: Arc<Notify>,
    state_tx: watch::Sender<SchedulerState>,
    config: SchedulerConfig,
    startup: Mutex<Startup>,
}

/// Tasks that exist only once the manager has started.
struct Startup {
    dispatcher: Option<Dispatcher>,
    tasks: Vec<JoinHandle<()>>,
}

impl AutoUpdateManager {
    /// Creates a manager in the `NotStarted` state.
    ///
    /// A zero check interval is replaced by the default. Must be called
    /// from within a tokio runtime.
    pub fn new(
        store: Arc<dyn PendingStore>,
        network: Arc<dyn NetworkMonitor>,
        mut config: SchedulerConfig,
    ) -> Self {
        if config.scheduler.check_interval_ms == 0 {
            let fallback = SchedulerSettings::default().check_interval_ms;
            warn!(fallback_ms = fallback, "check_interval_ms is 0, using the default");
            config.scheduler.check_interval_ms = fallback;
        }

        let pending = Arc::new(PendingSet::new(store));
        let transfer = empty_slot();
        let (state_tx, state_rx) = watch::channel(SchedulerState::NotStarted);
        let (dispatcher, dispatcher_handle) = Dispatcher::new(transfer.clone(), state_rx);

        let context = Arc::new(SchedulerContext::new(
            pending.clone(),
            network.clone(),
            transfer.clone(),
            dispatcher_handle.clone(),
        ));

        AutoUpdateManager {
            inner: Arc::new(Inner {
                pending,
                network,
                transfer,
                dispatcher: dispatcher_handle,
                context,
                wake: Arc::new(Notify::new()),
                state_tx,
                config,
                startup: Mutex::new(Startup {
                    dispatcher: Some(dispatcher),
                    tasks: Vec::new(),
                }),
            }),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Attaches the transfer service and starts the scheduler.
    ///
    /// The first call spawns the dispatcher and the scheduler loop, which
    /// loads the durable set before its first pass. Later calls swap the
    /// service without starting anything. Ignored after [`stop`](Self::stop).
    pub async fn attach_transfer_service(&self, service: Arc<dyn TransferService>) {
        let mut startup = self.inner.startup.lock().await;

        let state = self.state();
        match state {
            SchedulerState::Stopped => {
                warn!("Transfer service attached after stop, ignoring");
                return;
            }
            SchedulerState::Running => {
                *self.inner.transfer.write().await = Some(service);
                info!("Transfer service replaced");
                return;
            }
            SchedulerState::NotStarted => {}
        }

        *self.inner.transfer.write().await = Some(service);

        let started = self.inner.state_tx.send_if_modified(|state| {
            if *state == SchedulerState::NotStarted {
                *state = SchedulerState::Running;
                true
            } else {
                false
            }
        });
        if !started {
            warn!("Stopped while attaching, scheduler not started");
            return;
        }

        if let Some(dispatcher) = startup.dispatcher.take() {
            startup.tasks.push(tokio::spawn(dispatcher.run()));
        }

        let scheduler = SchedulerLoop::new(
            self.inner.context.clone(),
            self.inner.config.check_interval(),
            self.inner.wake.clone(),
            self.inner.state_tx.subscribe(),
        );
        startup.tasks.push(tokio::spawn(scheduler.run()));

        info!("Transfer service attached, auto-update scheduler started");
    }

    /// Stops the scheduler and the dispatcher. Idempotent and non-blocking.
    ///
    /// Tasks added afterwards are still tracked and persisted, but never
    /// submitted.
    pub fn stop(&self) {
        let stopped = self.inner.state_tx.send_if_modified(|state| {
            if *state == SchedulerState::Stopped {
                false
            } else {
                *state = SchedulerState::Stopped;
                true
            }
        });

        if stopped {
            info!("Auto-update scheduler stopping");
        }
    }

    /// Stops, waits for the background tasks to exit and flushes pending
    /// durable operations.
    pub async fn shutdown(&self) {
        self.stop();

        let tasks = std::mem::take(&mut self.inner.startup.lock().await.tasks);
        for task in tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Background task failed");
            }
        }

        if let Err(e) = self.inner.pending.flush().await {
            error!(error = %e, "Failed to flush persistence on shutdown");
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SchedulerState {
        *self.inner.state_tx.borrow()
    }

    // =========================================================================
    // Watcher Side
    // =========================================================================

    /// Tracks a modified file.
    ///
    /// `repo_file_path` is the file's path inside the repository; its parent
    /// directory becomes the upload target. Returns true if the job was new.
    pub async fn add_task(
        &self,
        account: impl Into<AccountIdentity>,
        repo_id: impl Into<String>,
        repo_name: impl Into<String>,
        repo_file_path: &str,
        local_path: impl Into<String>,
    ) -> bool {
        let record = PendingRecord::new(
            account,
            repo_id,
            repo_name,
            parent_path(repo_file_path),
            local_path,
        );
        self.add_record(record).await
    }

    /// Tracks a prepared record. Invalid records are logged and dropped.
    pub async fn add_record(&self, record: PendingRecord) -> bool {
        if let Err(e) = record.validate() {
            warn!(error = %e, ?record, "Rejecting invalid auto-update record");
            return false;
        }

        if !self.inner.pending.try_add(record.clone()).await {
            debug!(local_path = %record.local_path(), "Already pending");
            return false;
        }

        info!(
            repo_id = %record.repo_id(),
            parent_dir = %record.parent_dir(),
            local_path = %record.local_path(),
            "Tracking auto-update"
        );

        if self.state() == SchedulerState::Running && self.inner.network.is_network_available() {
            self.submit(record);
        }
        true
    }

    // =========================================================================
    // Transfer Side
    // =========================================================================

    /// Handles a confirmed upload.
    ///
    /// Removes the matching record; the durable removal runs in the
    /// background. Unknown or repeated notifications are a no-op.
    pub async fn on_upload_succeeded(
        &self,
        account: &AccountIdentity,
        repo_id: &str,
        parent_dir: &str,
        local_path: &str,
    ) -> bool {
        match self
            .inner
            .pending
            .remove_matching(account, repo_id, parent_dir, local_path)
            .await
        {
            Some(record) => {
                info!(
                    repo_id = %record.repo_id(),
                    local_path = %record.local_path(),
                    "Auto-update confirmed"
                );
                true
            }
            None => {
                debug!(repo_id, local_path, "No pending record for completion");
                false
            }
        }
    }

    /// Hands one record to the transfer service through the dispatcher.
    ///
    /// Returns false if the manager is not running.
    pub fn submit(&self, record: PendingRecord) -> bool {
        if self.state() != SchedulerState::Running {
            return false;
        }
        self.inner.dispatcher.post(record)
    }

    // =========================================================================
    // Host Side
    // =========================================================================

    /// Reacts to a connectivity change reported by the host.
    ///
    /// The network monitor stays the source of truth; this only wakes the
    /// scheduler when connectivity returns.
    pub fn on_network_changed(&self, available: bool) {
        info!(available, "Network availability changed");

        if available && self.inner.config.scheduler.wake_on_network_change {
            self.inner.wake.notify_one();
        }
    }

    /// Runs a scheduling pass right now, outside the loop.
    pub async fn schedule_now(&self) -> PassOutcome {
        match self.state() {
            SchedulerState::NotStarted => PassOutcome::Detached,
            SchedulerState::Stopped => PassOutcome::Stopped,
            SchedulerState::Running => self.inner.context.run_pass().await,
        }
    }

    /// Snapshot of the engine.
    pub async fn status(&self) -> AutoUpdateStatus {
        AutoUpdateStatus {
            state: self.state(),
            attached: self.inner.transfer.read().await.is_some(),
            network_available: self.inner.network.is_network_available(),
            pending: self.inner.pending.len().await,
            backlog: self.inner.pending.backlog_len(),
            submitted_total: self.inner.dispatcher.submitted_total(),
            last_pass_at: self.inner.context.last_pass_at().await,
        }
    }

    /// The shared pending set.
    pub fn pending(&self) -> &PendingSet {
        &self.inner.pending
    }
}
