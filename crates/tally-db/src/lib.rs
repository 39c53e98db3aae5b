//! # tally-db: Durable Local Store for Tally POS
//!
//! SQLite persistence for the offline sync core, built on sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally Data Flow                                  │
//! │                                                                         │
//! │  record_transaction / sync_all / on_trigger                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     tally-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐   ┌──────────────┐   │   │
//! │  │   │   Database    │    │  Repositories  │   │  Migrations  │   │   │
//! │  │   │   (pool.rs)   │◄───│ Transactions   │   │  (embedded)  │   │   │
//! │  │   │  SqlitePool   │    │ References     │   │ 0001_initial │   │   │
//! │  │   │  DbConfig     │    │ Settings       │   │              │   │   │
//! │  │   └───────────────┘    └────────────────┘   └──────────────┘   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  tally.db (WAL) in the platform data directory                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - One repository per record family
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_db::{Database, DbConfig, TransactionIndex};
//!
//! let db = Database::open(DbConfig::new("tally.db")).await?;
//! db.transactions().put(&tx).await?;
//! let pending = db.transactions().query_by_index(TransactionIndex::Synced(false)).await?;
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
pub use pool::{Database, DbConfig};

pub use repository::reference::ReferenceRepository;
pub use repository::settings::{SettingsRepository, LAST_SUCCESSFUL_SYNC_TIME, LAST_SYNC_TIME};
pub use repository::transaction::{
    PutOutcome, SyncAttempts, TransactionIndex, TransactionRepository,
};
