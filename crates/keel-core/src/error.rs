//! # Record Validation Errors
//!
//! keel-core does no I/O, so the only thing that can fail here is a record
//! built from bad input. keel-sync wraps this as `SyncError::Validation`.

use thiserror::Error;

/// Why a [`PendingRecord`](crate::PendingRecord) was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// An identifying field is empty or whitespace.
    #[error("{field} is required")]
    Required { field: &'static str },

    /// The field is present but unusable as given.
    #[error("{field} is malformed: {reason}")]
    Malformed { field: &'static str, reason: &'static str },
}

impl ValidationError {
    pub fn required(field: &'static str) -> Self {
        ValidationError::Required { field }
    }

    /// Name of the offending field.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::Required { field } | ValidationError::Malformed { field, .. } => field,
        }
    }
}
