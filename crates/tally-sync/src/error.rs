//! # Sync Error Types
//!
//! Error types for sync operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │  Remote/Network │  │  Local (escalated)      │ │
//! │  │                 │  │  (per item)     │  │                         │ │
//! │  │  InvalidConfig  │  │  Connection     │  │  Storage(DbError)       │ │
//! │  │  MissingDeviceId│  │  Timeout        │  │  SerializationFailed    │ │
//! │  │  InvalidUrl     │  │  RemoteUnavail. │  │                         │ │
//! │  │                 │  │  Rejected       │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Remote/Network: logged, the transaction stays unsynced, pass goes on. │
//! │  Local: the pass stops and the error reaches the UI as a storage       │
//! │  failure, never as "offline, will sync later".                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use tally_core::CoreError;
use tally_db::DbError;
use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering all possible sync failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Missing device ID.
    #[error("Device ID not configured. Run initial setup first.")]
    MissingDeviceId,

    /// Invalid endpoint URL.
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Remote / Network Errors
    // =========================================================================
    /// The request never reached the remote system.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Submission did not finish in time.
    #[error("Submission timed out after {0:?}")]
    Timeout(Duration),

    /// Remote system answered with a 5xx status.
    #[error("Remote unavailable (HTTP {status})")]
    RemoteUnavailable { status: u16 },

    /// Remote system refused the transaction.
    #[error("Remote rejected transaction (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    /// This transaction cannot be put on the wire (e.g. its id is not a
    /// valid header value). Affects only this item.
    #[error("Transaction cannot be sent: {0}")]
    Unsendable(String),

    // =========================================================================
    // Local Errors
    // =========================================================================
    /// The local store failed.
    #[error("Local storage failure: {0}")]
    Storage(#[from] DbError),

    /// A record could not be encoded for the wire.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// The draft could not become a valid transaction.
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(#[from] CoreError),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal sync error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) if status.is_server_error() => SyncError::RemoteUnavailable {
                status: status.as_u16(),
            },
            _ => SyncError::ConnectionFailed(err.to_string()),
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// True if a later attempt may succeed without anything changing locally.
    ///
    /// ## Retryable Errors
    /// - Connection failures (network issues)
    /// - Timeouts
    /// - Remote 5xx
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::ConnectionFailed(_)
                | SyncError::Timeout(_)
                | SyncError::RemoteUnavailable { .. }
        )
    }

    /// True for local failures that must be escalated instead of retried.
    pub fn is_storage_error(&self) -> bool {
        matches!(
            self,
            SyncError::Storage(_) | SyncError::SerializationFailed(_)
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::MissingDeviceId
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }
}
