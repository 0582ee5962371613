//! # Persistence Writer
//!
//! Serializes every durable operation through one background task.
//!
//! ## Ordering
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Persistence Writer Flow                              │
//! │                                                                         │
//! │  PendingSet (lock held)          PersistenceWriter (own task)           │
//! │  ──────────────────────          ────────────────────────────           │
//! │  insert r ──► Save(r) ─────┐                                            │
//! │  remove r ──► Remove(r) ───┼──►  FIFO ──► store.save / store.remove     │
//! │  insert r ──► Save(r) ─────┘                                            │
//! │                                                                         │
//! │  Ops are enqueued while the set lock is held, so the store sees them    │
//! │  in the order the in-memory changes were committed. The I/O itself     │
//! │  runs here, never under the set lock.                                   │
//! │                                                                         │
//! │  BACKLOG:                                                               │
//! │  • failed save   → unsaved    (cleared by a later Remove)               │
//! │  • failed remove → unremoved  (cleared by a later Save)                 │
//! │  • RetryBacklog re-attempts both, once per scheduler pass               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use keel_core::PendingRecord;

use crate::error::{SyncError, SyncResult};
use crate::store::PendingStore;

// =============================================================================
// Operations
// =============================================================================

enum PersistOp {
    Save {
        record: PendingRecord,
        reply: oneshot::Sender<SyncResult<()>>,
    },
    Remove {
        record: PendingRecord,
    },
    LoadAll {
        reply: oneshot::Sender<SyncResult<Vec<PendingRecord>>>,
    },
    RetryBacklog {
        reply: oneshot::Sender<BacklogRetry>,
    },
    Flush {
        reply: oneshot::Sender<()>,
    },
}

/// Result of one backlog retry round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BacklogRetry {
    /// Saves that went through this round.
    pub saved: usize,

    /// Removals that went through this round.
    pub removed: usize,

    /// Operations still waiting.
    pub remaining: usize,
}

impl BacklogRetry {
    /// Returns true if nothing was attempted.
    pub fn is_idle(&self) -> bool {
        self.saved == 0 && self.removed == 0 && self.remaining == 0
    }
}

// =============================================================================
// Handle
// =============================================================================

/// Sending side of the writer. Cheap to clone.
#[derive(Clone)]
pub(crate) struct PersistenceHandle {
    tx: mpsc::UnboundedSender<PersistOp>,
    backlog: Arc<AtomicUsize>,
}

impl PersistenceHandle {
    /// Queues a save. Never blocks; the receiver resolves once the store has
    /// answered.
    pub(crate) fn enqueue_save(
        &self,
        record: PendingRecord,
    ) -> oneshot::Receiver<SyncResult<()>> {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(PersistOp::Save { record, reply }).is_err() {
            warn!("Persistence writer is gone, save dropped");
        }
        rx
    }

    /// Queues a removal. Never blocks.
    pub(crate) fn enqueue_remove(&self, record: PendingRecord) {
        if self.tx.send(PersistOp::Remove { record }).is_err() {
            warn!("Persistence writer is gone, removal dropped");
        }
    }

    /// Loads the durable set after every previously queued op has been applied.
    pub(crate) async fn load_all(&self) -> SyncResult<Vec<PendingRecord>> {
        let (reply, rx) = oneshot::channel();
        self.send(PersistOp::LoadAll { reply })?;
        rx.await.map_err(|_| SyncError::WriterStopped)?
    }

    /// Re-attempts every failed save and removal.
    pub(crate) async fn retry_backlog(&self) -> SyncResult<BacklogRetry> {
        let (reply, rx) = oneshot::channel();
        self.send(PersistOp::RetryBacklog { reply })?;
        rx.await.map_err(|_| SyncError::WriterStopped)
    }

    /// Waits until every op queued so far has been applied.
    pub(crate) async fn flush(&self) -> SyncResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(PersistOp::Flush { reply })?;
        rx.await.map_err(|_| SyncError::WriterStopped)
    }

    /// Number of operations waiting for a retry.
    pub(crate) fn backlog_len(&self) -> usize {
        self.backlog.load(Ordering::Acquire)
    }

    fn send(&self, op: PersistOp) -> SyncResult<()> {
        self.tx.send(op).map_err(|_| SyncError::WriterStopped)
    }
}

// =============================================================================
// Writer
// =============================================================================

/// Background task owning all store I/O.
pub(crate) struct PersistenceWriter {
    store: Arc<dyn PendingStore>,
    rx: mpsc::UnboundedReceiver<PersistOp>,
    unsaved: HashSet<PendingRecord>,
    unremoved: HashSet<PendingRecord>,
    backlog: Arc<AtomicUsize>,
}

impl PersistenceWriter {
    /// Spawns the writer on the current tokio runtime.
    ///
    /// The task exits once every handle has been dropped.
    pub(crate) fn spawn(store: Arc<dyn PendingStore>) -> PersistenceHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let backlog = Arc::new(AtomicUsize::new(0));

        let writer = PersistenceWriter {
            store,
            rx,
            unsaved: HashSet::new(),
            unremoved: HashSet::new(),
            backlog: backlog.clone(),
        };
        tokio::spawn(writer.run());

        PersistenceHandle { tx, backlog }
    }

    async fn run(mut self) {
        debug!("Persistence writer started");

        while let Some(op) = self.rx.recv().await {
            self.apply(op).await;
        }

        if !self.unsaved.is_empty() || !self.unremoved.is_empty() {
            warn!(
                unsaved = self.unsaved.len(),
                unremoved = self.unremoved.len(),
                "Persistence writer stopped with a backlog"
            );
        }
        debug!("Persistence writer stopped");
    }

    async fn apply(&mut self, op: PersistOp) {
        match op {
            PersistOp::Save { record, reply } => {
                let result = self.save(record).await;
                self.publish_backlog();
                let _ = reply.send(result);
            }
            PersistOp::Remove { record } => {
                self.remove(record).await;
                self.publish_backlog();
            }
            PersistOp::LoadAll { reply } => {
                let result = self.store.load_all().await.map(|mut records| {
                    // Rows whose removal is still pending are already done.
                    records.retain(|r| !self.unremoved.contains(r));
                    records
                });
                let _ = reply.send(result);
            }
            PersistOp::RetryBacklog { reply } => {
                let report = self.retry_backlog().await;
                self.publish_backlog();
                let _ = reply.send(report);
            }
            PersistOp::Flush { reply } => {
                let _ = reply.send(());
            }
        }
    }

    async fn save(&mut self, record: PendingRecord) -> SyncResult<()> {
        self.unremoved.remove(&record);

        match self.store.save(&record).await {
            Ok(()) => {
                self.unsaved.remove(&record);
                debug!(local_path = %record.local_path(), "Record persisted");
                Ok(())
            }
            Err(e) => {
                error!(
                    error = %e,
                    repo_id = %record.repo_id(),
                    local_path = %record.local_path(),
                    "Failed to persist record, will retry"
                );
                self.unsaved.insert(record);
                Err(e)
            }
        }
    }

    async fn remove(&mut self, record: PendingRecord) {
        self.unsaved.remove(&record);

        match self.store.remove(&record).await {
            Ok(()) => {
                self.unremoved.remove(&record);
                debug!(local_path = %record.local_path(), "Record removed from store");
            }
            Err(e) => {
                error!(
                    error = %e,
                    repo_id = %record.repo_id(),
                    local_path = %record.local_path(),
                    "Failed to remove record from store, will retry"
                );
                self.unremoved.insert(record);
            }
        }
    }

    async fn retry_backlog(&mut self) -> BacklogRetry {
        let mut report = BacklogRetry::default();

        let unsaved: Vec<_> = self.unsaved.iter().cloned().collect();
        for record in unsaved {
            if self.store.save(&record).await.is_ok() {
                self.unsaved.remove(&record);
                report.saved += 1;
            }
        }

        let unremoved: Vec<_> = self.unremoved.iter().cloned().collect();
        for record in unremoved {
            if self.store.remove(&record).await.is_ok() {
                self.unremoved.remove(&record);
                report.removed += 1;
            }
        }

        report.remaining = self.unsaved.len() + self.unremoved.len();
        if report.saved > 0 || report.removed > 0 {
            info!(
                saved = report.saved,
                removed = report.removed,
                remaining = report.remaining,
                "Persistence backlog retried"
            );
        }
        report
    }

    fn publish_backlog(&self) {
        self.backlog
            .store(self.unsaved.len() + self.unremoved.len(), Ordering::Release);
    }
}
