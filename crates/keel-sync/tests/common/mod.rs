//! Shared doubles for the end-to-end scenarios.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use keel_core::{PendingRecord, UploadRequest};
use keel_sync::{
    AutoUpdateManager, NetworkFlag, PendingStore, SchedulerConfig, SyncError, SyncResult,
    TransferService,
};

/// In-memory durable store with switchable save failures.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<PendingRecord>>,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn with_records(records: Vec<PendingRecord>) -> Self {
        let store = Self::default();
        *store.records.lock().unwrap() = records;
        store
    }

    pub fn records(&self) -> Vec<PendingRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn save_calls(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl PendingStore for MemoryStore {
    async fn save(&self, record: &PendingRecord) -> SyncResult<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(SyncError::Persistence("disk full".into()));
        }
        let mut records = self.records.lock().unwrap();
        if !records.contains(record) {
            records.push(record.clone());
        }
        Ok(())
    }

    async fn remove(&self, record: &PendingRecord) -> SyncResult<()> {
        self.records.lock().unwrap().retain(|r| r != record);
        Ok(())
    }

    async fn load_all(&self) -> SyncResult<Vec<PendingRecord>> {
        Ok(self.records())
    }

    async fn count(&self) -> SyncResult<u64> {
        Ok(self.records.lock().unwrap().len() as u64)
    }
}

/// Transfer service recording every request on a channel.
pub struct RecordingTransfer {
    tx: mpsc::UnboundedSender<UploadRequest>,
}

impl TransferService for RecordingTransfer {
    fn add_upload_task(&self, request: UploadRequest) {
        let _ = self.tx.send(request);
    }
}

pub fn recording_transfer() -> (Arc<RecordingTransfer>, mpsc::UnboundedReceiver<UploadRequest>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(RecordingTransfer { tx }), rx)
}

pub fn manager(store: Arc<dyn PendingStore>, network: &NetworkFlag) -> AutoUpdateManager {
    AutoUpdateManager::new(store, Arc::new(network.clone()), SchedulerConfig::default())
}

/// Everything received within `window`.
pub async fn drain_for(
    rx: &mut mpsc::UnboundedReceiver<UploadRequest>,
    window: Duration,
) -> Vec<UploadRequest> {
    let mut received = Vec::new();
    let deadline = tokio::time::Instant::now() + window;
    while let Ok(Some(request)) = tokio::time::timeout_at(deadline, rx.recv()).await {
        received.push(request);
    }
    received
}
