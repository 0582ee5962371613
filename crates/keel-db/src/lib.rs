//! # keel-db: Database Layer for Keel
//!
//! This crate provides durable storage for pending auto-update jobs.
//! It uses SQLite with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           Keel Data Flow                                │
//! │                                                                         │
//! │  keel-sync (SqlitePendingStore)                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                      keel-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌──────────────────┐   ┌──────────────┐ │   │
//! │  │   │   Database    │    │  Repositories    │   │  Migrations  │ │   │
//! │  │   │   (pool.rs)   │    │  (pending.rs)    │   │  (embedded)  │ │   │
//! │  │   │               │    │                  │   │              │ │   │
//! │  │   │ SqlitePool    │◄───│ PendingUpload    │   │ 001_pending_ │ │   │
//! │  │   │ Connection    │    │ Repository       │   │ uploads.sql  │ │   │
//! │  │   └───────────────┘    └──────────────────┘   └──────────────┘ │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   ~/.local/share/keel/keel.db                                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use keel_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/keel.db")).await?;
//! let pending = db.pending_uploads().load_all().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use migrations::MigrationStatus;
pub use pool::{Database, DbConfig, DbLocation};
pub use repository::pending::PendingUploadRepository;
