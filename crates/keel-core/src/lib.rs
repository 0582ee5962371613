//! # keel-core: Pure Domain Types for Keel
//!
//! This crate holds the identity of an auto-update job and the small amount of
//! pure logic around it. It has zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Keel Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │          File Watcher (external)  /  Transfer Service (external)│   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ add_task / on_upload_succeeded         │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 keel-sync (scheduler engine)                    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                ★ keel-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────────┐  ┌──────────────┐  ┌──────────────────┐     │   │
//! │  │   │    types     │  │    paths     │  │      error       │     │   │
//! │  │   │PendingRecord │  │ parent_path  │  │ ValidationError  │     │   │
//! │  │   │UploadRequest │  │              │  │                  │     │   │
//! │  │   └──────────────┘  └──────────────┘  └──────────────────┘     │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - `AccountIdentity`, `PendingRecord`, `UploadRequest`
//! - [`paths`] - Repository path helpers
//! - [`error`] - Record validation errors
//!
//! ## Example Usage
//!
//! ```rust
//! use keel_core::{parent_path, AccountIdentity, PendingRecord};
//!
//! let record = PendingRecord::new(
//!     AccountIdentity::new("alice@cloud.example.com"),
//!     "repo1",
//!     "Repo One",
//!     parent_path("/docs/a.txt"),
//!     "/sdcard/docs/a.txt",
//! );
//!
//! assert_eq!(record.parent_dir(), "/docs");
//! assert!(record.to_upload_request().is_auto_update);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod paths;
pub mod types;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::ValidationError;
pub use paths::parent_path;
pub use types::{AccountIdentity, PendingRecord, UploadRequest};
