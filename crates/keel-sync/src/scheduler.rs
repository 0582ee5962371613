//! # Scheduler Loop
//!
//! Periodically resubmits every pending record while the network is up.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   NotStarted ──attach_transfer_service──► Running ──stop──► Stopped     │
//! │        │                                                     ▲          │
//! │        └────────────────────stop─────────────────────────────┘          │
//! │                                                                         │
//! │  Stopped is terminal.                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## One Pass
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Load the durable set if that has not succeeded yet                  │
//! │  2. Retry the persistence backlog                                       │
//! │  3. Offline, or no transfer service?  → skip (not an error)             │
//! │  4. for_each_snapshot → dispatcher.post(record)                         │
//! │                                                                         │
//! │  Between passes: select! { tick | wake | stop }. The set lock is        │
//! │  never held while waiting.                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, Notify, RwLock};
use tracing::{debug, error, info};

use crate::dispatcher::DispatcherHandle;
use crate::network::NetworkMonitor;
use crate::pending::PendingSet;
use crate::transfer::TransferSlot;

// =============================================================================
// State
// =============================================================================

/// Lifecycle state of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    /// No transfer service attached yet; tasks are only persisted.
    NotStarted,
    /// Loop and dispatcher are running.
    Running,
    /// Stopped for good.
    Stopped,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SchedulerState::NotStarted => "not_started",
            SchedulerState::Running => "running",
            SchedulerState::Stopped => "stopped",
        };
        write!(f, "{}", s)
    }
}

/// What a single scheduling pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Network unavailable; nothing submitted.
    Offline,
    /// No transfer service attached; nothing submitted.
    Detached,
    /// The scheduler has been stopped.
    Stopped,
    /// This many records were posted to the dispatcher.
    Submitted(usize),
}

// =============================================================================
// Pass Context
// =============================================================================

/// Everything a pass needs. Shared by the loop and `schedule_now`.
pub(crate) struct SchedulerContext {
    pending: Arc<PendingSet>,
    network: Arc<dyn NetworkMonitor>,
    transfer: TransferSlot,
    dispatcher: DispatcherHandle,
    loaded: Mutex<bool>,
    last_pass_at: RwLock<Option<DateTime<Utc>>>,
}

impl SchedulerContext {
    pub(crate) fn new(
        pending: Arc<PendingSet>,
        network: Arc<dyn NetworkMonitor>,
        transfer: TransferSlot,
        dispatcher: DispatcherHandle,
    ) -> Self {
        SchedulerContext {
            pending,
            network,
            transfer,
            dispatcher,
            loaded: Mutex::new(false),
            last_pass_at: RwLock::new(None),
        }
    }

    /// Merges the durable set into memory once.
    ///
    /// Returns false if the load failed; the next pass tries again.
    pub(crate) async fn ensure_loaded(&self) -> bool {
        let mut loaded = self.loaded.lock().await;
        if *loaded {
            return true;
        }

        match self.pending.load_from_store().await {
            Ok(inserted) => {
                *loaded = true;
                let pending = self.pending.len().await;
                info!(restored = inserted, pending, "Restored pending records from store");
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to load pending records, retrying next pass");
                false
            }
        }
    }

    /// Runs one scheduling pass.
    pub(crate) async fn run_pass(&self) -> PassOutcome {
        self.ensure_loaded().await;

        if let Err(e) = self.pending.retry_persistence().await {
            error!(error = %e, "Persistence backlog retry failed");
        }

        let outcome = if !self.network.is_network_available() {
            let pending = self.pending.len().await;
            debug!(pending, "Network unavailable, skipping pass");
            PassOutcome::Offline
        } else if self.transfer.read().await.is_none() {
            let pending = self.pending.len().await;
            debug!(pending, "No transfer service, skipping pass");
            PassOutcome::Detached
        } else {
            let dispatcher = &self.dispatcher;
            let count = self
                .pending
                .for_each_snapshot(|record| {
                    dispatcher.post(record.clone());
                })
                .await;
            if count > 0 {
                debug!(count, "Resubmitted pending records");
            }
            PassOutcome::Submitted(count)
        };

        *self.last_pass_at.write().await = Some(Utc::now());
        outcome
    }

    /// Completion time of the most recent pass.
    pub(crate) async fn last_pass_at(&self) -> Option<DateTime<Utc>> {
        *self.last_pass_at.read().await
    }
}

// =============================================================================
// Loop
// =============================================================================

/// The long-lived background worker.
pub(crate) struct SchedulerLoop {
    context: Arc<SchedulerContext>,
    interval: Duration,
    wake: Arc<Notify>,
    state_rx: watch::Receiver<SchedulerState>,
}

impl SchedulerLoop {
    pub(crate) fn new(
        context: Arc<SchedulerContext>,
        interval: Duration,
        wake: Arc<Notify>,
        state_rx: watch::Receiver<SchedulerState>,
    ) -> Self {
        SchedulerLoop {
            context,
            interval,
            wake,
            state_rx,
        }
    }

    /// Runs passes until stopped.
    ///
    /// This should be spawned as a background task. The first tick fires
    /// immediately, so the durable set is loaded before anything else.
    pub(crate) async fn run(mut self) {
        info!(interval_ms = self.interval.as_millis() as u64, "Auto-update scheduler starting");

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            if self.is_stopped() {
                break;
            }

            tokio::select! {
                _ = interval.tick() => {}

                _ = self.wake.notified() => {
                    debug!("Woken for an immediate pass");
                }

                changed = self.state_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }

            if self.is_stopped() {
                break;
            }

            self.context.run_pass().await;
        }

        info!("Auto-update scheduler stopped");
    }

    fn is_stopped(&self) -> bool {
        *self.state_rx.borrow() == SchedulerState::Stopped
    }
}
