//! # Pending Upload Repository
//!
//! Durable set of auto-update jobs that have not been confirmed yet.
//!
//! ## Table Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         pending_uploads                                 │
//! │                                                                         │
//! │  id | account | repo_id | repo_name | parent_dir | local_path | created │
//! │  ───┼─────────┼─────────┼───────────┼────────────┼────────────┼──────── │
//! │  u1 │ alice   │ repo1   │ Repo One  │ /docs      │ /sd/a.txt  │ ...     │
//! │  u2 │ alice   │ repo1   │ Repo One  │ /          │ /sd/b.txt  │ ...     │
//! │                                                                         │
//! │  UNIQUE (account, repo_id, repo_name, parent_dir, local_path)           │
//! │                                                                         │
//! │  • save twice      → one row (ON CONFLICT DO NOTHING)                   │
//! │  • remove missing  → zero rows affected, not an error                   │
//! │  • load_all        → insertion order                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use keel_core::{AccountIdentity, PendingRecord};

// =============================================================================
// Row Type
// =============================================================================

/// A stored pending upload, as read back from SQLite.
#[derive(Debug, Clone, FromRow)]
pub struct StoredUpload {
    /// Row identifier (UUID v4).
    pub id: String,
    pub account: String,
    pub repo_id: String,
    pub repo_name: String,
    pub parent_dir: String,
    pub local_path: String,
    /// When the job was first persisted.
    pub created_at: DateTime<Utc>,
}

impl StoredUpload {
    /// Rebuilds the domain record.
    pub fn into_record(self) -> PendingRecord {
        PendingRecord::new(
            AccountIdentity::new(self.account),
            self.repo_id,
            self.repo_name,
            self.parent_dir,
            self.local_path,
        )
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for pending upload operations.
#[derive(Debug, Clone)]
pub struct PendingUploadRepository {
    pool: SqlitePool,
}

impl PendingUploadRepository {
    /// Creates a new PendingUploadRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PendingUploadRepository { pool }
    }

    /// Persists a pending job.
    ///
    /// ## Returns
    /// `true` if a new row was written, `false` if the job was already stored.
    pub async fn save(&self, record: &PendingRecord) -> DbResult<bool> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO pending_uploads (
                id, account, repo_id, repo_name, parent_dir, local_path, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (account, repo_id, repo_name, parent_dir, local_path) DO NOTHING
            "#,
        )
        .bind(&id)
        .bind(record.account().as_str())
        .bind(record.repo_id())
        .bind(record.repo_name())
        .bind(record.parent_dir())
        .bind(record.local_path())
        .bind(now)
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() == 1;

        debug!(
            repo_id = %record.repo_id(),
            local_path = %record.local_path(),
            inserted,
            "Saved pending upload"
        );

        Ok(inserted)
    }

    /// Deletes a pending job.
    ///
    /// ## Returns
    /// Number of rows deleted (0 if the job was not stored).
    pub async fn remove(&self, record: &PendingRecord) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM pending_uploads
            WHERE account = ?1
              AND repo_id = ?2
              AND repo_name = ?3
              AND parent_dir = ?4
              AND local_path = ?5
            "#,
        )
        .bind(record.account().as_str())
        .bind(record.repo_id())
        .bind(record.repo_name())
        .bind(record.parent_dir())
        .bind(record.local_path())
        .execute(&self.pool)
        .await?;

        debug!(
            repo_id = %record.repo_id(),
            local_path = %record.local_path(),
            deleted = result.rows_affected(),
            "Removed pending upload"
        );

        Ok(result.rows_affected())
    }

    /// Lists stored rows in insertion order.
    pub async fn list(&self) -> DbResult<Vec<StoredUpload>> {
        let rows = sqlx::query_as::<_, StoredUpload>(
            r#"
            SELECT id, account, repo_id, repo_name, parent_dir, local_path, created_at
            FROM pending_uploads
            ORDER BY rowid ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Loads every pending job, oldest first.
    pub async fn load_all(&self) -> DbResult<Vec<PendingRecord>> {
        let rows = self.list().await?;
        Ok(rows.into_iter().map(StoredUpload::into_record).collect())
    }

    /// Counts stored pending jobs.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pending_uploads")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Tests
// =============================================================================
