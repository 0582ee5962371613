//! # Engine Errors
//!
//! Nothing in this enum crosses the public manager surface: `add_task`,
//! `on_upload_succeeded` and the scheduler log failures and keep going. The
//! type exists for the store seam, the persistence writer and config
//! loading.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  config file ──► ConfigRead / ConfigParse / ConfigWrite / InvalidConfig │
//! │                                                                         │
//! │  PendingStore ──► Persistence ──► kept in the writer backlog,           │
//! │                                   retried on the next pass              │
//! │                                                                         │
//! │  writer task gone ──► WriterStopped                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use thiserror::Error;

use keel_core::ValidationError;

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    /// A setting is out of range after all layers were applied.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Cannot read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Cannot write config {path}: {reason}")]
    ConfigWrite { path: PathBuf, reason: String },

    /// The durable store rejected or failed an operation.
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Invalid record: {0}")]
    Validation(#[from] ValidationError),

    /// The persistence writer task has exited.
    #[error("Persistence writer stopped")]
    WriterStopped,
}

impl From<keel_db::DbError> for SyncError {
    fn from(err: keel_db::DbError) -> Self {
        SyncError::Persistence(err.to_string())
    }
}

impl SyncError {
    /// True for failures the scheduler retries on its next pass.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Persistence(_) | SyncError::WriterStopped)
    }

    /// True for failures in locating, parsing or validating the config.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::ConfigRead { .. }
                | SyncError::ConfigParse(_)
                | SyncError::ConfigWrite { .. }
        )
    }
}
