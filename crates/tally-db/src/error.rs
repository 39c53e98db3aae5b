//! # Database Error Types
//!
//! Error types for Durable Local Store operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  CoreError (contract)  ─┐                                               │
//! │  sqlx::Error           ─┼──► DbError (this module)                      │
//! │  serde_json::Error     ─┘         │                                     │
//! │                                   ▼                                     │
//! │                       SyncError::Storage ← always escalated            │
//! │                                   │                                     │
//! │                                   ▼                                     │
//! │         UI shows "storage failure", never "offline, will sync later"   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tally_core::CoreError;
use thiserror::Error;

/// Durable Local Store errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Persistent storage could not be opened.
    ///
    /// ## When This Occurs
    /// - The platform denied access to the database file
    /// - Directory missing / read-only file system
    /// - Pool was closed
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A write could not be made durable.
    ///
    /// ## When This Occurs
    /// - Disk/quota exhausted (`SQLITE_FULL`)
    /// - Record could not be serialized
    #[error("Write failed: {0}")]
    WriteError(String),

    /// The record violates the data contract; nothing was written.
    #[error("Invalid record: {0}")]
    Validation(#[from] CoreError),

    /// No record with this id exists in the family.
    #[error("{family} record not found: {id}")]
    NotFound { family: String, id: String },

    /// A transaction with this id already exists with different content.
    #[error("Transaction {id} already exists with different content")]
    ImmutableRecord { id: String },

    /// A setting that only moves forward was written through `set`.
    #[error("Setting {key} is monotonic; write it with advance_millis")]
    MonotonicSetting { key: String },

    /// A stored record could not be decoded.
    #[error("Corrupted {family} record {id}: {reason}")]
    Corrupted {
        family: String,
        id: String,
        reason: String,
    },

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a Corrupted error for a record that failed to decode.
    pub fn corrupted(
        family: impl Into<String>,
        id: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        DbError::Corrupted {
            family: family.into(),
            id: id.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a NotFound error.
    pub fn not_found(family: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            family: family.into(),
            id: id.into(),
        }
    }

    /// True for contract violations (caller bug, not a storage fault).
    pub fn is_contract_error(&self) -> bool {
        matches!(
            self,
            DbError::Validation(_)
                | DbError::ImmutableRecord { .. }
                | DbError::MonotonicSetting { .. }
        )
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// "database or disk is full"      → DbError::WriteError
/// "unable to open" / "readonly"   → DbError::StorageUnavailable
/// sqlx::Error::Io / Configuration → DbError::StorageUnavailable
/// sqlx::Error::PoolTimedOut       → DbError::PoolExhausted
/// Other database errors           → DbError::QueryFailed
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                if msg.contains("database or disk is full") {
                    DbError::WriteError(msg.to_string())
                } else if msg.contains("unable to open database")
                    || msg.contains("readonly database")
                {
                    DbError::StorageUnavailable(msg.to_string())
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::Io(io) => DbError::StorageUnavailable(io.to_string()),

            sqlx::Error::Configuration(e) => DbError::StorageUnavailable(e.to_string()),

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::StorageUnavailable("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
