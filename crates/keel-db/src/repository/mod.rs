//! # Repository Module
//!
//! Database repository implementations for Keel.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  SqlitePendingStore (keel-sync)                                        │
//! │       │                                                                 │
//! │       │  db.pending_uploads().save(&record)                            │
//! │       ▼                                                                 │
//! │  PendingUploadRepository                                               │
//! │  ├── save(&self, record)      upsert on the five-field key             │
//! │  ├── remove(&self, record)    delete by the five-field key             │
//! │  ├── load_all(&self)          everything, oldest first                 │
//! │  └── count(&self)                                                       │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`PendingUploadRepository`](pending::PendingUploadRepository) - Pending auto-update jobs

pub mod pending;
