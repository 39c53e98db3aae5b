//! # Sync Engine
//!
//! Drains unsynced transactions from the local store to the remote endpoint.
//!
//! ## Sync Pass
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           sync_all()                                    │
//! │                                                                         │
//! │  offline?                  ──► PassOutcome::Offline        (no-op)      │
//! │  pass already running?     ──► PassOutcome::AlreadyRunning (no-op)      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  query_by_index(Synced(false))      creation order                     │
//! │       │                                                                 │
//! │       ▼  for each transaction                                           │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │ already synced by another context?  ──► skip                    │   │
//! │  │ timeout(submit(tx))                                             │   │
//! │  │   ok            ──► mark_synced(id)                             │   │
//! │  │   network/5xx   ──► record_failure(id), warn!, continue         │   │
//! │  │   storage fault ──► abort pass, escalate                        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  advance lastSyncTime (always)                                         │
//! │  advance lastSuccessfulSyncTime (only when nothing failed)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The single-flight flag belongs to one engine instance. The foreground and
//! background contexts each own an engine, so two passes can overlap; the
//! conditional `mark_synced` and the pre-submit re-check keep that safe, and
//! the idempotency key covers the remaining double-submit window.

use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tally_core::Transaction;
use tally_db::{Database, LAST_SUCCESSFUL_SYNC_TIME, LAST_SYNC_TIME};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use ts_rs::TS;

use crate::connectivity::ConnectivityMonitor;
use crate::endpoint::RemoteEndpoint;
use crate::error::{SyncError, SyncResult};
use crate::events::{NoOpEmitter, SyncEventEmitter, SyncStatus};

/// Default per-submission timeout.
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Pass Results
// =============================================================================

/// Counts for one completed pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Submissions made.
    pub attempted: usize,
    /// Transactions this pass flipped to synced.
    pub synced: usize,
    /// Submissions that failed; those rows stay unsynced.
    pub failed: usize,
    /// Rows another context synced while this pass was running.
    pub skipped: usize,
    /// Epoch ms written to `lastSyncTime`.
    pub finished_at: i64,
}

/// What `sync_all` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// A pass ran to the end.
    Completed(SyncReport),
    /// Device offline; nothing was attempted.
    Offline,
    /// Another pass on this engine is in progress.
    AlreadyRunning,
}

impl PassOutcome {
    /// The report, if a pass ran.
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            PassOutcome::Completed(report) => Some(report),
            _ => None,
        }
    }
}

/// Clears the single-flight flag on every exit path, panics included.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// =============================================================================
// Sync Engine
// =============================================================================

/// Submits unsynced transactions and records the results.
pub struct SyncEngine {
    db: Database,
    endpoint: Arc<dyn RemoteEndpoint>,
    connectivity: ConnectivityMonitor,
    submit_timeout: Duration,
    emitter: Arc<dyn SyncEventEmitter>,
    in_flight: AtomicBool,
    status: watch::Sender<SyncStatus>,
}

impl SyncEngine {
    /// Creates an engine with the default timeout and no event emitter.
    pub fn new(
        db: Database,
        endpoint: Arc<dyn RemoteEndpoint>,
        connectivity: ConnectivityMonitor,
    ) -> Self {
        let (status, _) = watch::channel(SyncStatus::Idle);

        SyncEngine {
            db,
            endpoint,
            connectivity,
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
            emitter: Arc::new(NoOpEmitter),
            in_flight: AtomicBool::new(false),
            status,
        }
    }

    /// Sets the per-submission timeout.
    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = timeout;
        self
    }

    /// Sets the UI event emitter.
    pub fn with_emitter(mut self, emitter: Arc<dyn SyncEventEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    /// Current coarse status.
    pub fn status(&self) -> SyncStatus {
        *self.status.borrow()
    }

    /// Receiver that tracks status changes.
    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// True while a `sync_all` pass is running on this engine.
    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// The store this engine drains.
    pub fn database(&self) -> &Database {
        &self.db
    }

    fn set_status(&self, status: SyncStatus) {
        self.status.send_replace(status);
        self.emitter.emit_status(status);
    }

    fn begin_pass(&self) -> Option<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(&self.in_flight))
    }

    /// Runs one sync pass.
    ///
    /// Per-transaction network failures are logged and counted; only local
    /// storage failures come back as `Err`.
    pub async fn sync_all(&self) -> SyncResult<PassOutcome> {
        if !self.connectivity.is_online() {
            debug!("Offline, skipping sync pass");
            return Ok(PassOutcome::Offline);
        }

        let Some(_guard) = self.begin_pass() else {
            debug!("Sync pass already in progress");
            return Ok(PassOutcome::AlreadyRunning);
        };

        self.set_status(SyncStatus::Syncing);

        match self.run_pass().await {
            Ok(report) => {
                let status = if report.failed == 0 {
                    SyncStatus::Success
                } else {
                    SyncStatus::Error
                };
                self.set_status(status);
                info!(
                    attempted = report.attempted,
                    synced = report.synced,
                    failed = report.failed,
                    skipped = report.skipped,
                    "Sync pass complete"
                );
                Ok(PassOutcome::Completed(report))
            }
            Err(e) => {
                error!(error = %e, "Sync pass aborted");
                self.set_status(SyncStatus::Error);
                self.emitter.emit_error(&e.to_string(), false);
                Err(e)
            }
        }
    }

    async fn run_pass(&self) -> SyncResult<SyncReport> {
        let transactions = self.db.transactions();
        let pending = transactions.get_unsynced().await?;
        let total = pending.len();
        let mut report = SyncReport::default();

        debug!(pending = total, "Starting sync pass");

        for (done, tx) in pending.into_iter().enumerate() {
            // Another context may have synced it since the query.
            if transactions.is_synced(&tx.id).await? == Some(true) {
                report.skipped += 1;
                self.emitter.emit_progress(total - done - 1, report.synced);
                continue;
            }

            report.attempted += 1;
            match self.submit(&tx).await {
                Ok(()) => {
                    if transactions.mark_synced(&tx.id).await? {
                        report.synced += 1;
                    } else {
                        report.skipped += 1;
                    }
                }
                Err(e) if e.is_storage_error() => return Err(e),
                Err(e) => {
                    warn!(
                        id = %tx.id,
                        error = %e,
                        retryable = e.is_retryable(),
                        "Submission failed"
                    );
                    report.failed += 1;
                    transactions.record_failure(&tx.id, &e.to_string()).await?;
                    self.emitter.emit_error(&e.to_string(), e.is_retryable());
                }
            }

            self.emitter.emit_progress(total - done - 1, report.synced);
        }

        let settings = self.db.settings();
        let now = Utc::now().timestamp_millis();
        report.finished_at = settings.advance_millis(LAST_SYNC_TIME, now).await?;
        if report.failed == 0 {
            settings.advance_millis(LAST_SUCCESSFUL_SYNC_TIME, now).await?;
        }

        Ok(report)
    }

    /// Submits one transaction right away, outside any pass.
    ///
    /// No single-flight guard; may overlap a running `sync_all`. Returns
    /// `true` if this call flipped the transaction to synced.
    pub async fn sync_one(&self, tx: &Transaction) -> SyncResult<bool> {
        if !self.connectivity.is_online() {
            return Ok(false);
        }

        let transactions = self.db.transactions();
        if transactions.is_synced(&tx.id).await? != Some(false) {
            return Ok(false);
        }

        match self.submit(tx).await {
            Ok(()) => Ok(transactions.mark_synced(&tx.id).await?),
            Err(e) if e.is_storage_error() => Err(e),
            Err(e) => {
                warn!(id = %tx.id, error = %e, "Immediate submission failed, left for next pass");
                transactions.record_failure(&tx.id, &e.to_string()).await?;
                Ok(false)
            }
        }
    }

    async fn submit(&self, tx: &Transaction) -> SyncResult<()> {
        match tokio::time::timeout(self.submit_timeout, self.endpoint.submit(tx)).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout(self.submit_timeout)),
        }
    }
}
