//! # Sync Service
//!
//! The surface the UI and business layer call.
//!
//! ```text
//! record_transaction(draft) ──► Store.put ──► online? ──► spawn sync_one ──► scheduler.arm(tag)
//!                                                └ no ─────────────────────► scheduler.arm(tag)
//! list_transactions()       ──► Store.get_all (newest first)
//! get_sync_stats()          ──► SyncStats::collect
//! manual_sync()             ──► SyncEngine::sync_all
//! cached_references(src)    ──► fetch → put_all, else cached copy
//! ```
//!
//! A sale is durable once `record_transaction` returns; whether it reaches
//! the remote right away is best effort.

use chrono::Utc;
use std::sync::Arc;
use tally_core::{ReferenceRecord, Transaction, TransactionDraft};
use tally_db::Database;
use tracing::{debug, info, warn};

use crate::background::{BackgroundScheduler, NoopScheduler, DEFAULT_BACKGROUND_TAG};
use crate::connectivity::ConnectivityMonitor;
use crate::endpoint::ReferenceSource;
use crate::engine::{PassOutcome, SyncEngine};
use crate::error::SyncResult;
use crate::stats::SyncStats;

/// UI-facing facade over the store, engine and scheduler.
#[derive(Clone)]
pub struct SyncService {
    db: Database,
    engine: Arc<SyncEngine>,
    connectivity: ConnectivityMonitor,
    scheduler: Arc<dyn BackgroundScheduler>,
    background_tag: String,
}

impl SyncService {
    /// Creates a service with no background scheduling.
    pub fn new(db: Database, engine: Arc<SyncEngine>, connectivity: ConnectivityMonitor) -> Self {
        SyncService {
            db,
            engine,
            connectivity,
            scheduler: Arc::new(NoopScheduler),
            background_tag: DEFAULT_BACKGROUND_TAG.to_string(),
        }
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn BackgroundScheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_background_tag(mut self, tag: impl Into<String>) -> Self {
        self.background_tag = tag.into();
        self
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    /// Records a sale and starts getting it to the remote.
    ///
    /// Returns once the sale is stored. A background pass is armed either
    /// way: offline right away, online once the immediate submission in a
    /// spawned task has finished, whatever its outcome.
    pub async fn record_transaction(&self, draft: TransactionDraft) -> SyncResult<Transaction> {
        let tx = draft.into_transaction(Utc::now())?;
        self.db.transactions().put(&tx).await?;

        info!(id = %tx.id, total = tx.total().minor(), "Transaction recorded");

        if self.connectivity.is_online() {
            let engine = Arc::clone(&self.engine);
            let scheduler = Arc::clone(&self.scheduler);
            let tag = self.background_tag.clone();
            let pending = tx.clone();
            tokio::spawn(async move {
                if let Err(e) = engine.sync_one(&pending).await {
                    warn!(id = %pending.id, error = %e, "Immediate sync failed");
                }
                arm_background(scheduler.as_ref(), &tag);
            });
        } else {
            arm_background(self.scheduler.as_ref(), &self.background_tag);
        }

        Ok(tx)
    }

    /// All recorded transactions, newest first.
    pub async fn list_transactions(&self) -> SyncResult<Vec<Transaction>> {
        let mut all = self.db.transactions().get_all().await?;
        all.reverse();
        Ok(all)
    }

    pub async fn get_sync_stats(&self) -> SyncResult<SyncStats> {
        SyncStats::collect(&self.db).await
    }

    /// Runs a pass now. Offline or already running is not an error.
    pub async fn manual_sync(&self) -> SyncResult<PassOutcome> {
        self.engine.sync_all().await
    }

    /// Reference records, fresh from `source` when possible.
    ///
    /// Online, a successful fetch replaces the cache and is returned.
    /// Offline or on any fetch failure, the cached copy is returned.
    pub async fn cached_references<R: ReferenceRecord>(
        &self,
        source: &dyn ReferenceSource<R>,
    ) -> SyncResult<Vec<R>> {
        let references = self.db.references();

        if self.connectivity.is_online() {
            match source.fetch_all().await {
                Ok(fresh) => {
                    let stored = references.put_all(&fresh).await?;
                    debug!(kind = R::KIND, stored, "Reference cache refreshed");
                    return Ok(fresh);
                }
                Err(e) => {
                    warn!(kind = R::KIND, error = %e, "Reference fetch failed, using cache")
                }
            }
        }

        Ok(references.get_all::<R>().await?)
    }
}

fn arm_background(scheduler: &dyn BackgroundScheduler, tag: &str) {
    if scheduler.arm(tag) {
        debug!(tag, "Background sync armed");
    }
}
