//! # Pending Set
//!
//! The single shared mutable resource of the engine: the set of records that
//! still need an upload confirmation.
//!
//! ## Locking
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          PendingSet                                     │
//! │                                                                         │
//! │   watcher ──try_add──────┐                                              │
//! │   completion ──remove────┼──► Mutex<HashSet<PendingRecord>>             │
//! │   scheduler ──for_each───┘          │                                   │
//! │                                     │ enqueue (under lock)              │
//! │                                     ▼                                   │
//! │                            PersistenceWriter ──► PendingStore           │
//! │                                                                         │
//! │  One exclusive lock over the whole set. Check-then-insert and           │
//! │  find-then-remove are atomic. Store I/O happens in the writer task.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error};

use keel_core::{AccountIdentity, PendingRecord};

use crate::error::SyncResult;
use crate::persist::{BacklogRetry, PersistenceHandle, PersistenceWriter};
use crate::store::PendingStore;

/// Thread-safe set of pending records backed by a [`PendingStore`].
pub struct PendingSet {
    records: Mutex<HashSet<PendingRecord>>,
    persistence: PersistenceHandle,
}

impl PendingSet {
    /// Creates an empty set and spawns its persistence writer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(store: Arc<dyn PendingStore>) -> Self {
        PendingSet {
            records: Mutex::new(HashSet::new()),
            persistence: PersistenceWriter::spawn(store),
        }
    }

    /// Tracks a record unless an equal one is already present.
    ///
    /// Returns once the store has answered the save. A failed save is
    /// logged and queued for retry; the record stays tracked and the call
    /// still returns `true`.
    pub async fn try_add(&self, record: PendingRecord) -> bool {
        let ack = {
            let mut records = self.records.lock().await;
            if records.contains(&record) {
                return false;
            }
            let ack = self.persistence.enqueue_save(record.clone());
            records.insert(record);
            ack
        };

        match ack.await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => {
                // Already logged by the writer; the backlog holds it.
            }
            Err(_) => error!("Persistence writer stopped, record is only tracked in memory"),
        }
        true
    }

    /// Removes the record a completion notification refers to.
    ///
    /// Matches on everything but `repo_name`. If several records match, the
    /// first one found goes. The durable removal is queued before the lock
    /// is released and applied in the background.
    pub async fn remove_matching(
        &self,
        account: &AccountIdentity,
        repo_id: &str,
        parent_dir: &str,
        local_path: &str,
    ) -> Option<PendingRecord> {
        let mut records = self.records.lock().await;

        let found = records
            .iter()
            .find(|r| r.matches(account, repo_id, parent_dir, local_path))
            .cloned()?;

        records.remove(&found);
        self.persistence.enqueue_remove(found.clone());
        Some(found)
    }

    /// Calls `f` once per pending record while holding the lock.
    ///
    /// `f` must not block. Returns the number of records visited.
    pub async fn for_each_snapshot<F>(&self, mut f: F) -> usize
    where
        F: FnMut(&PendingRecord),
    {
        let records = self.records.lock().await;
        for record in records.iter() {
            f(record);
        }
        records.len()
    }

    /// Bulk-inserts records already known to be durable.
    ///
    /// Returns how many were new to the set.
    pub async fn initial_load(&self, loaded: impl IntoIterator<Item = PendingRecord>) -> usize {
        let mut records = self.records.lock().await;
        insert_all(&mut records, loaded)
    }

    /// Loads the durable set and merges it in.
    ///
    /// The lock is held across the load so no add or removal can interleave
    /// with it.
    pub async fn load_from_store(&self) -> SyncResult<usize> {
        let mut records = self.records.lock().await;
        let loaded = self.persistence.load_all().await?;
        let inserted = insert_all(&mut records, loaded);
        debug!(inserted, pending = records.len(), "Merged durable records");
        Ok(inserted)
    }

    /// Number of pending records.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    /// Returns true if nothing is pending.
    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Returns true if an equal record is pending.
    pub async fn contains(&self, record: &PendingRecord) -> bool {
        self.records.lock().await.contains(record)
    }

    /// Copies the current contents.
    pub async fn snapshot(&self) -> Vec<PendingRecord> {
        self.records.lock().await.iter().cloned().collect()
    }

    // =========================================================================
    // Persistence Backlog
    // =========================================================================

    /// Re-attempts failed saves and removals.
    pub async fn retry_persistence(&self) -> SyncResult<BacklogRetry> {
        self.persistence.retry_backlog().await
    }

    /// Number of durable operations waiting for a retry.
    pub fn backlog_len(&self) -> usize {
        self.persistence.backlog_len()
    }

    /// Waits until every queued durable operation has been applied.
    pub async fn flush(&self) -> SyncResult<()> {
        self.persistence.flush().await
    }
}

fn insert_all(
    records: &mut HashSet<PendingRecord>,
    loaded: impl IntoIterator<Item = PendingRecord>,
) -> usize {
    let before = records.len();
    records.extend(loaded);
    records.len() - before
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryStore;

    fn record(path: &str) -> PendingRecord {
        PendingRecord::new("alice", "repo1", "Repo One", "/docs", path)
    }

    fn alice() -> AccountIdentity {
        AccountIdentity::new("alice")
    }

    #[tokio::test]
    async fn test_try_add_deduplicates() {
        let store = Arc::new(MemoryStore::new());
        let set = PendingSet::new(store.clone());

        assert!(set.try_add(record("/sd/a.txt")).await);
        assert!(!set.try_add(record("/sd/a.txt")).await);

        assert_eq!(set.len().await, 1);
        assert_eq!(store.save_calls(), 1);
        assert_eq!(store.records().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_track_one_record() {
        let store = Arc::new(MemoryStore::new());
        let set = Arc::new(PendingSet::new(store.clone()));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let set = set.clone();
            handles.push(tokio::spawn(async move { set.try_add(record("/sd/a.txt")).await }));
        }

        let mut added = 0;
        for handle in handles {
            if handle.await.unwrap() {
                added += 1;
            }
        }

        assert_eq!(added, 1);
        assert_eq!(set.len().await, 1);
        assert_eq!(store.save_calls(), 1);
    }

    #[tokio::test]
    async fn test_repo_name_is_part_of_identity() {
        let set = PendingSet::new(Arc::new(MemoryStore::new()));

        assert!(set.try_add(record("/sd/a.txt")).await);
        assert!(
            set.try_add(PendingRecord::new("alice", "repo1", "Renamed", "/docs", "/sd/a.txt"))
                .await
        );
        assert_eq!(set.len().await, 2);
    }

    #[tokio::test]
    async fn test_remove_matching_removes_and_persists() {
        let store = Arc::new(MemoryStore::new());
        let set = PendingSet::new(store.clone());
        set.try_add(record("/sd/a.txt")).await;
        set.try_add(record("/sd/b.txt")).await;

        let removed = set
            .remove_matching(&alice(), "repo1", "/docs", "/sd/a.txt")
            .await;
        assert_eq!(removed, Some(record("/sd/a.txt")));

        set.flush().await.unwrap();
        assert_eq!(store.records(), vec![record("/sd/b.txt")]);
        assert!(set.contains(&record("/sd/b.txt")).await);
    }

    #[tokio::test]
    async fn test_remove_matching_without_match_is_noop() {
        let set = PendingSet::new(Arc::new(MemoryStore::new()));
        set.try_add(record("/sd/a.txt")).await;

        assert!(set
            .remove_matching(&alice(), "repo1", "/other", "/sd/a.txt")
            .await
            .is_none());
        assert!(set
            .remove_matching(&AccountIdentity::new("bob"), "repo1", "/docs", "/sd/a.txt")
            .await
            .is_none());
        assert_eq!(set.len().await, 1);
    }

    #[tokio::test]
    async fn test_remove_matching_takes_one_of_several() {
        let set = PendingSet::new(Arc::new(MemoryStore::new()));
        set.try_add(record("/sd/a.txt")).await;
        set.try_add(PendingRecord::new("alice", "repo1", "Renamed", "/docs", "/sd/a.txt"))
            .await;

        assert!(set.remove_matching(&alice(), "repo1", "/docs", "/sd/a.txt").await.is_some());
        assert_eq!(set.len().await, 1);
        assert!(set.remove_matching(&alice(), "repo1", "/docs", "/sd/a.txt").await.is_some());
        assert!(set.is_empty().await);
    }

    #[tokio::test]
    async fn test_for_each_snapshot_visits_everything() {
        let set = PendingSet::new(Arc::new(MemoryStore::new()));
        set.try_add(record("/sd/a.txt")).await;
        set.try_add(record("/sd/b.txt")).await;

        let mut seen = Vec::new();
        let visited = set
            .for_each_snapshot(|r| seen.push(r.local_path().to_string()))
            .await;

        seen.sort();
        assert_eq!(visited, 2);
        assert_eq!(seen, vec!["/sd/a.txt", "/sd/b.txt"]);
    }

    #[tokio::test]
    async fn test_initial_load_absorbs_duplicates() {
        let set = PendingSet::new(Arc::new(MemoryStore::new()));
        set.try_add(record("/sd/a.txt")).await;

        let inserted = set
            .initial_load(vec![record("/sd/a.txt"), record("/sd/b.txt"), record("/sd/b.txt")])
            .await;

        assert_eq!(inserted, 1);
        assert_eq!(set.len().await, 2);
    }

    #[tokio::test]
    async fn test_load_from_store() {
        let store = Arc::new(MemoryStore::with_records(vec![
            record("/sd/a.txt"),
            record("/sd/b.txt"),
        ]));
        let set = PendingSet::new(store.clone());

        assert_eq!(set.load_from_store().await.unwrap(), 2);
        assert_eq!(set.len().await, 2);

        store.fail_loads(true);
        assert!(set.load_from_store().await.is_err());
        assert_eq!(set.len().await, 2);
    }

    #[tokio::test]
    async fn test_failed_save_keeps_record_and_retries() {
        let store = Arc::new(MemoryStore::new());
        let set = PendingSet::new(store.clone());

        store.fail_saves(true);
        assert!(set.try_add(record("/sd/a.txt")).await);
        assert!(set.contains(&record("/sd/a.txt")).await);
        assert!(store.records().is_empty());
        assert_eq!(set.backlog_len(), 1);

        store.fail_saves(false);
        let report = set.retry_persistence().await.unwrap();
        assert_eq!(report.saved, 1);
        assert_eq!(set.backlog_len(), 0);
        assert_eq!(store.records(), vec![record("/sd/a.txt")]);
    }

    #[tokio::test]
    async fn test_failed_remove_is_retried() {
        let store = Arc::new(MemoryStore::new());
        let set = PendingSet::new(store.clone());
        set.try_add(record("/sd/a.txt")).await;

        store.fail_removes(true);
        set.remove_matching(&alice(), "repo1", "/docs", "/sd/a.txt").await;
        set.flush().await.unwrap();
        assert_eq!(set.backlog_len(), 1);
        assert_eq!(store.records().len(), 1);

        store.fail_removes(false);
        let report = set.retry_persistence().await.unwrap();
        assert_eq!(report.removed, 1);
        assert!(store.records().is_empty());
    }

    #[tokio::test]
    async fn test_readd_after_failed_remove_keeps_row() {
        let store = Arc::new(MemoryStore::new());
        let set = PendingSet::new(store.clone());
        set.try_add(record("/sd/a.txt")).await;

        store.fail_removes(true);
        set.remove_matching(&alice(), "repo1", "/docs", "/sd/a.txt").await;
        assert!(set.try_add(record("/sd/a.txt")).await);
        store.fail_removes(false);

        set.retry_persistence().await.unwrap();
        assert_eq!(set.backlog_len(), 0);
        assert_eq!(store.records(), vec![record("/sd/a.txt")]);
    }
}
