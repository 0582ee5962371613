//! # Dispatcher
//!
//! The only place that calls into the transfer service. Everyone else posts
//! records onto an unbounded channel and returns immediately.
//!
//! ```text
//! add_task ─────┐
//!               ├──► mpsc<PendingRecord> ──► Dispatcher task ──► TransferService
//! scheduler ────┘                                                 add_upload_task
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

use keel_core::PendingRecord;

use crate::scheduler::SchedulerState;
use crate::transfer::TransferSlot;

/// Posting side of the dispatcher.
#[derive(Clone)]
pub(crate) struct DispatcherHandle {
    tx: mpsc::UnboundedSender<PendingRecord>,
    submitted: Arc<AtomicU64>,
}

impl DispatcherHandle {
    /// Queues a record for submission. Never blocks.
    ///
    /// Returns false if the dispatcher has stopped.
    pub(crate) fn post(&self, record: PendingRecord) -> bool {
        match self.tx.send(record) {
            Ok(()) => true,
            Err(mpsc::error::SendError(record)) => {
                debug!(local_path = %record.local_path(), "Dispatcher stopped, submission dropped");
                false
            }
        }
    }

    /// Total requests handed to the transfer service.
    pub(crate) fn submitted_total(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }
}

/// Background task forwarding posted records to the transfer service.
pub(crate) struct Dispatcher {
    rx: mpsc::UnboundedReceiver<PendingRecord>,
    transfer: TransferSlot,
    submitted: Arc<AtomicU64>,
    state_rx: watch::Receiver<SchedulerState>,
}

impl Dispatcher {
    /// Creates the dispatcher and its handle. Nothing runs until
    /// [`Dispatcher::run`] is spawned.
    pub(crate) fn new(
        transfer: TransferSlot,
        state_rx: watch::Receiver<SchedulerState>,
    ) -> (Self, DispatcherHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let submitted = Arc::new(AtomicU64::new(0));

        let dispatcher = Dispatcher {
            rx,
            transfer,
            submitted: submitted.clone(),
            state_rx,
        };

        (dispatcher, DispatcherHandle { tx, submitted })
    }

    /// Runs until stopped or until every handle is dropped.
    pub(crate) async fn run(mut self) {
        info!("Dispatcher starting");

        loop {
            if *self.state_rx.borrow() == SchedulerState::Stopped {
                self.drain().await;
                break;
            }

            tokio::select! {
                biased;

                record = self.rx.recv() => match record {
                    Some(record) => self.dispatch(record).await,
                    None => break,
                },

                changed = self.state_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(submitted = self.submitted.load(Ordering::Relaxed), "Dispatcher stopped");
    }

    /// Hands over whatever was posted before the stop.
    async fn drain(&mut self) {
        let mut drained = 0usize;
        while let Ok(record) = self.rx.try_recv() {
            self.dispatch(record).await;
            drained += 1;
        }
        if drained > 0 {
            debug!(drained, "Dispatched queued submissions on stop");
        }
    }

    async fn dispatch(&self, record: PendingRecord) {
        let transfer = self.transfer.read().await.clone();

        match transfer {
            Some(transfer) => {
                trace!(
                    repo_id = %record.repo_id(),
                    local_path = %record.local_path(),
                    "Submitting upload"
                );
                self.submitted.fetch_add(1, Ordering::Relaxed);
                transfer.add_upload_task(record.to_upload_request());
            }
            None => warn!(local_path = %record.local_path(), "No transfer service attached, submission dropped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ChannelTransfer;
    use crate::transfer::{empty_slot, TransferService};

    #[tokio::test]
    async fn test_posts_reach_transfer_service() {
        let slot = empty_slot();
        let (transfer, mut uploads) = ChannelTransfer::new();
        *slot.write().await = Some(Arc::new(transfer) as Arc<dyn TransferService>);

        let (state_tx, state_rx) = watch::channel(SchedulerState::Running);
        let (dispatcher, handle) = Dispatcher::new(slot, state_rx);
        let task = tokio::spawn(dispatcher.run());

        let record = PendingRecord::new("alice", "repo1", "Repo One", "/docs", "/sd/a.txt");
        assert!(handle.post(record.clone()));

        let request = uploads.recv().await.unwrap();
        assert_eq!(request, record.to_upload_request());
        assert!(request.is_auto_update);
        assert_eq!(handle.submitted_total(), 1);

        state_tx.send_replace(SchedulerState::Stopped);
        task.await.unwrap();
        assert!(!handle.post(record));
    }

    #[tokio::test]
    async fn test_queued_posts_are_delivered_on_stop() {
        let slot = empty_slot();
        let (transfer, mut uploads) = ChannelTransfer::new();
        *slot.write().await = Some(Arc::new(transfer) as Arc<dyn TransferService>);

        let (state_tx, state_rx) = watch::channel(SchedulerState::Running);
        let (dispatcher, handle) = Dispatcher::new(slot, state_rx);

        for path in ["/sd/a.txt", "/sd/b.txt", "/sd/c.txt"] {
            assert!(handle.post(PendingRecord::new("alice", "repo1", "Repo One", "/docs", path)));
        }
        state_tx.send_replace(SchedulerState::Stopped);

        dispatcher.run().await;

        let mut delivered = Vec::new();
        while let Ok(request) = uploads.try_recv() {
            delivered.push(request.local_path);
        }
        assert_eq!(delivered, vec!["/sd/a.txt", "/sd/b.txt", "/sd/c.txt"]);
        assert_eq!(handle.submitted_total(), 3);
    }
}
