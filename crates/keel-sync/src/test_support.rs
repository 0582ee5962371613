//! Test doubles shared by the unit tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

use keel_core::{PendingRecord, UploadRequest};

use crate::error::{SyncError, SyncResult};
use crate::store::PendingStore;
use crate::transfer::TransferService;

/// In-memory store with switchable failures.
#[derive(Default)]
pub(crate) struct MemoryStore {
    records: Mutex<Vec<PendingRecord>>,
    fail_saves: AtomicBool,
    fail_removes: AtomicBool,
    fail_loads: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_records(records: Vec<PendingRecord>) -> Self {
        let store = Self::default();
        *store.records.lock().unwrap() = records;
        store
    }

    pub(crate) fn records(&self) -> Vec<PendingRecord> {
        self.records.lock().unwrap().clone()
    }

    pub(crate) fn save_calls(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_removes(&self, fail: bool) {
        self.fail_removes.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
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
        if self.fail_removes.load(Ordering::SeqCst) {
            return Err(SyncError::Persistence("disk full".into()));
        }
        self.records.lock().unwrap().retain(|r| r != record);
        Ok(())
    }

    async fn load_all(&self) -> SyncResult<Vec<PendingRecord>> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(SyncError::Persistence("database locked".into()));
        }
        Ok(self.records())
    }

    async fn count(&self) -> SyncResult<u64> {
        Ok(self.records.lock().unwrap().len() as u64)
    }
}

/// Transfer service that forwards every request to a channel.
pub(crate) struct ChannelTransfer {
    tx: mpsc::UnboundedSender<UploadRequest>,
}

impl ChannelTransfer {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<UploadRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelTransfer { tx }, rx)
    }
}

impl TransferService for ChannelTransfer {
    fn add_upload_task(&self, request: UploadRequest) {
        let _ = self.tx.send(request);
    }
}
