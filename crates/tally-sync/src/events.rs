//! # Sync Status Events
//!
//! What the UI gets to see: a coarse status plus counts.
//!
//! ```text
//!           sync_all()                 pass ends
//!  Idle ───────────────► Syncing ───┬──────────────► Success   (no failures)
//!   ▲                               └──────────────► Error     (≥1 failure or
//!   │                                                           storage fault)
//!   └──── next pass starts from Success / Error ───► Syncing
//! ```
//!
//! ## Event Channels
//! ```text
//! "sync://status"   - "syncing"
//! "sync://progress" - { pending: 5, synced: 100 }
//! "sync://error"    - { message: "HTTP 503", retryable: true }
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Coarse sync state for the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// No pass has run yet.
    #[default]
    Idle,
    /// A pass is draining the queue.
    Syncing,
    /// Last pass submitted everything it attempted.
    Success,
    /// Last pass had failures or hit a storage fault.
    Error,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStatus::Idle => write!(f, "idle"),
            SyncStatus::Syncing => write!(f, "syncing"),
            SyncStatus::Success => write!(f, "success"),
            SyncStatus::Error => write!(f, "error"),
        }
    }
}

/// Trait for emitting sync events to the UI layer.
pub trait SyncEventEmitter: Send + Sync {
    /// Emits a sync status change event.
    fn emit_status(&self, status: SyncStatus);

    /// Emits a sync progress event.
    fn emit_progress(&self, pending: usize, synced: usize);

    /// Emits a sync error event.
    fn emit_error(&self, message: &str, retryable: bool);
}

/// No-op event emitter.
pub struct NoOpEmitter;

impl SyncEventEmitter for NoOpEmitter {
    fn emit_status(&self, _status: SyncStatus) {}
    fn emit_progress(&self, _pending: usize, _synced: usize) {}
    fn emit_error(&self, _message: &str, _retryable: bool) {}
}
