//! # Pending Store
//!
//! Durable storage for the set of pending records.
//!
//! ## Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        PendingStore                                     │
//! │                                                                         │
//! │  save(record)    upsert keyed by all five fields; repeat = no-op;       │
//! │                  invalid records are refused                            │
//! │  remove(record)  delete by all five fields; missing = Ok(())            │
//! │  load_all()      full durable set, called at scheduler start            │
//! │  count()         diagnostics                                            │
//! │                                                                         │
//! │  A record for which save() returned Ok must survive a crash right       │
//! │  after.                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use tracing::debug;

use keel_core::PendingRecord;
use keel_db::Database;

use crate::error::SyncResult;

/// Durable storage for pending records.
#[async_trait]
pub trait PendingStore: Send + Sync {
    /// Persists a record. Saving an already stored record is a no-op.
    async fn save(&self, record: &PendingRecord) -> SyncResult<()>;

    /// Deletes a record. Deleting a missing record is a no-op.
    async fn remove(&self, record: &PendingRecord) -> SyncResult<()>;

    /// Loads every stored record, oldest first.
    async fn load_all(&self) -> SyncResult<Vec<PendingRecord>>;

    /// Counts stored records.
    async fn count(&self) -> SyncResult<u64>;
}

// =============================================================================
// SQLite Store
// =============================================================================

/// [`PendingStore`] backed by the `pending_uploads` SQLite table.
#[derive(Debug, Clone)]
pub struct SqlitePendingStore {
    db: Database,
}

impl SqlitePendingStore {
    /// Wraps an open database.
    pub fn new(db: Database) -> Self {
        SqlitePendingStore { db }
    }

    /// Returns the underlying database handle.
    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl PendingStore for SqlitePendingStore {
    async fn save(&self, record: &PendingRecord) -> SyncResult<()> {
        record.validate()?;
        let inserted = self.db.pending_uploads().save(record).await?;
        if !inserted {
            debug!(local_path = %record.local_path(), "Record already stored");
        }
        Ok(())
    }

    async fn remove(&self, record: &PendingRecord) -> SyncResult<()> {
        self.db.pending_uploads().remove(record).await?;
        Ok(())
    }

    async fn load_all(&self) -> SyncResult<Vec<PendingRecord>> {
        Ok(self.db.pending_uploads().load_all().await?)
    }

    async fn count(&self) -> SyncResult<u64> {
        let count = self.db.pending_uploads().count().await?;
        Ok(count.max(0) as u64)
    }
}
