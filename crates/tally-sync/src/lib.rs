//! # tally-sync: Offline Sync Core for Tally POS
//!
//! Gets locally recorded sales to the remote system, whenever and from
//! wherever the device happens to be online.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        tally-sync Architecture                          │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                         SyncService                              │  │
//! │  │  record_transaction · list_transactions · get_sync_stats ·       │  │
//! │  │  manual_sync · cached_references                                 │  │
//! │  └───────┬──────────────────────┬──────────────────────┬────────────┘  │
//! │          │                      │                      │               │
//! │          ▼                      ▼                      ▼               │
//! │  ┌──────────────┐     ┌──────────────────┐    ┌──────────────────┐    │
//! │  │  SyncAgent   │────►│   SyncEngine     │◄───│ BackgroundTrigger│    │
//! │  │ (foreground) │     │ sync_all/sync_one│    │ (own store pool) │    │
//! │  └──────┬───────┘     └────────┬─────────┘    └────────┬─────────┘    │
//! │         │                      │                       │              │
//! │         │             ┌────────▼─────────┐             │              │
//! │         └────────────►│ConnectivityMonitor│◄───────────┘              │
//! │                       └──────────────────┘                            │
//! │                                                                         │
//! │  SyncEngine ──► RemoteEndpoint (HTTP POST, Idempotency-Key)             │
//! │  SyncEngine ──► tally-db (Transactions · ReferenceRecords · Settings)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`connectivity`] - Online/offline state with deduplicated notifications
//! - [`endpoint`] - Remote transaction sink and reference sources
//! - [`engine`] - Sync passes with a per-instance single-flight flag
//! - [`background`] - Deferred, connectivity-gated passes
//! - [`agent`] - Foreground reconnect and polling loop
//! - [`service`] - UI-facing facade
//! - [`stats`] - Queue depth and sync timestamps
//! - [`events`] - Status enum and emitter trait
//! - [`config`] - TOML + environment configuration
//! - [`error`] - Sync error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tally_sync::{ConnectivityMonitor, ConnectivityStatus, HttpEndpoint, SyncConfig,
//!                  SyncEngine, SyncService};
//! use tally_db::Database;
//!
//! let config = SyncConfig::load_or_default(None);
//! let db = Database::open(config.db_config()).await?;
//! let connectivity = ConnectivityMonitor::new(ConnectivityStatus::Offline);
//! let endpoint = Arc::new(HttpEndpoint::new(url, config.submit_timeout())?);
//!
//! let engine = Arc::new(SyncEngine::new(db.clone(), endpoint, connectivity.clone()));
//! let service = SyncService::new(db, engine, connectivity);
//!
//! let tx = service.record_transaction(draft).await?;
//! println!("{:?}", service.get_sync_stats().await?);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod agent;
pub mod background;
pub mod config;
pub mod connectivity;
pub mod endpoint;
pub mod engine;
pub mod error;
pub mod events;
pub mod service;
pub mod stats;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use agent::{SyncAgent, SyncAgentHandle};
pub use background::{
    BackgroundScheduler, BackgroundTrigger, NoopScheduler, TokioBackgroundScheduler,
    TriggerCompletion, DEFAULT_BACKGROUND_TAG,
};
pub use config::SyncConfig;
pub use connectivity::{ConnectivityMonitor, ConnectivityStatus, Subscription};
pub use endpoint::{HttpEndpoint, HttpReferenceSource, ReferenceSource, RemoteEndpoint};
pub use engine::{PassOutcome, SyncEngine, SyncReport};
pub use error::{SyncError, SyncResult};
pub use events::{NoOpEmitter, SyncEventEmitter, SyncStatus};
pub use service::SyncService;
pub use stats::SyncStats;

use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set. Calling this twice leaves the first subscriber
/// in place.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tally=debug,sqlx=warn"));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
