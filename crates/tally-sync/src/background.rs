//! # Background Sync Trigger
//!
//! Lets the platform run a sync pass after the app is no longer in the
//! foreground.
//!
//! ## Flow
//! ```text
//! record_transaction() while offline
//!        │
//!        ▼
//! scheduler.arm("sync-transactions")     one-shot, deduplicated per tag
//!        │
//!        │   ... platform waits for network ...
//!        ▼
//! trigger.on_trigger(tag)
//!        │
//!        ├── Database::open(db_config)   own connection pool, own context
//!        ├── SyncEngine::sync_all()      own single-flight flag
//!        └── close, report completion
//! ```
//!
//! Platforms without deferred tasks use [`NoopScheduler`]; the foreground
//! agent then covers reconnects on its own.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tally_db::{Database, DbConfig};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::connectivity::ConnectivityMonitor;
use crate::endpoint::RemoteEndpoint;
use crate::engine::{PassOutcome, SyncEngine, DEFAULT_SUBMIT_TIMEOUT};
use crate::error::SyncResult;

/// Tag used for the transaction sync task.
pub const DEFAULT_BACKGROUND_TAG: &str = "sync-transactions";

/// Platform capability for deferred, connectivity-gated work.
pub trait BackgroundScheduler: Send + Sync {
    /// Registers a one-shot task under `tag`.
    ///
    /// Returns `true` if a new task was registered; `false` when the tag is
    /// already armed or the platform cannot schedule.
    fn arm(&self, tag: &str) -> bool;

    /// Whether this platform can run deferred tasks at all.
    fn is_supported(&self) -> bool {
        true
    }
}

/// Scheduler for platforms without background tasks.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopScheduler;

impl BackgroundScheduler for NoopScheduler {
    fn arm(&self, tag: &str) -> bool {
        debug!(tag, "Background sync not supported, arm ignored");
        false
    }

    fn is_supported(&self) -> bool {
        false
    }
}

// =============================================================================
// Trigger
// =============================================================================

/// Everything a background context needs to run a pass from scratch.
///
/// Holds the store's configuration rather than an open handle, so each
/// trigger works against its own pool. An in-memory `DbConfig` would open an
/// empty store here; background work needs an on-disk path.
pub struct BackgroundTrigger {
    db_config: DbConfig,
    endpoint: Arc<dyn RemoteEndpoint>,
    connectivity: ConnectivityMonitor,
    submit_timeout: Duration,
}

impl BackgroundTrigger {
    pub fn new(
        db_config: DbConfig,
        endpoint: Arc<dyn RemoteEndpoint>,
        connectivity: ConnectivityMonitor,
    ) -> Self {
        BackgroundTrigger {
            db_config,
            endpoint,
            connectivity,
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
        }
    }

    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = timeout;
        self
    }

    /// Re-opens the store and runs one pass.
    pub async fn on_trigger(&self, tag: &str) -> SyncResult<PassOutcome> {
        info!(tag, "Background sync triggered");

        let db = Database::open(self.db_config.clone()).await?;
        let engine = SyncEngine::new(
            db.clone(),
            Arc::clone(&self.endpoint),
            self.connectivity.clone(),
        )
        .with_submit_timeout(self.submit_timeout);

        let outcome = engine.sync_all().await;
        db.close().await;

        match &outcome {
            Ok(PassOutcome::Completed(report)) => {
                info!(tag, synced = report.synced, failed = report.failed, "Background sync done")
            }
            Ok(other) => debug!(tag, ?other, "Background sync did not run a pass"),
            Err(e) => warn!(tag, error = %e, "Background sync failed"),
        }

        outcome
    }
}

// =============================================================================
// Tokio Scheduler
// =============================================================================

/// Completion signal for one trigger run.
#[derive(Debug, Clone)]
pub struct TriggerCompletion {
    pub tag: String,
    pub result: Result<PassOutcome, String>,
}

/// In-process scheduler: a spawned task that waits for the online signal.
///
/// Stands in for the platform's deferred-task service on desktops and in
/// tests.
#[derive(Clone)]
pub struct TokioBackgroundScheduler {
    trigger: Arc<BackgroundTrigger>,
    armed: Arc<Mutex<HashSet<String>>>,
    completions: broadcast::Sender<TriggerCompletion>,
}

impl TokioBackgroundScheduler {
    pub fn new(trigger: BackgroundTrigger) -> Self {
        let (completions, _) = broadcast::channel(16);

        TokioBackgroundScheduler {
            trigger: Arc::new(trigger),
            armed: Arc::new(Mutex::new(HashSet::new())),
            completions,
        }
    }

    /// Receiver for completion signals.
    pub fn completions(&self) -> broadcast::Receiver<TriggerCompletion> {
        self.completions.subscribe()
    }

    /// Whether a task is waiting under `tag`.
    pub fn is_armed(&self, tag: &str) -> bool {
        lock(&self.armed).contains(tag)
    }
}

fn lock(armed: &Mutex<HashSet<String>>) -> MutexGuard<'_, HashSet<String>> {
    armed.lock().unwrap_or_else(PoisonError::into_inner)
}

impl BackgroundScheduler for TokioBackgroundScheduler {
    fn arm(&self, tag: &str) -> bool {
        let Ok(handle) = Handle::try_current() else {
            warn!(tag, "No async runtime, cannot arm background sync");
            return false;
        };

        if !lock(&self.armed).insert(tag.to_string()) {
            debug!(tag, "Background sync already armed");
            return false;
        }

        let tag = tag.to_string();
        let trigger = Arc::clone(&self.trigger);
        let armed = Arc::clone(&self.armed);
        let completions = self.completions.clone();
        let mut online = trigger.connectivity.watch();

        debug!(tag = %tag, "Background sync armed");

        handle.spawn(async move {
            // `trigger` owns the monitor, so the sender outlives this wait.
            let _ = online.wait_for(|status| status.is_online()).await;

            // One-shot: a later arm registers a fresh task.
            lock(&armed).remove(&tag);

            let result = trigger.on_trigger(&tag).await.map_err(|e| e.to_string());
            // No receivers is fine.
            let _ = completions.send(TriggerCompletion { tag, result });
        });

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::ConnectivityStatus;
    use crate::testing::{sale_at, ScriptedEndpoint};
    use tempfile::TempDir;

    async fn on_disk_store() -> (TempDir, DbConfig, Database) {
        let dir = TempDir::new().unwrap();
        let config = DbConfig::new(dir.path().join("tally.db"));
        let db = Database::open(config.clone()).await.unwrap();
        (dir, config, db)
    }

    #[test]
    fn test_noop_scheduler() {
        let scheduler = NoopScheduler;
        assert!(!scheduler.is_supported());
        assert!(!scheduler.arm(DEFAULT_BACKGROUND_TAG));
    }

    #[tokio::test]
    async fn test_on_trigger_reopens_store() {
        let (_dir, config, db) = on_disk_store().await;
        for ms in [1_000, 2_000] {
            db.transactions().put(&sale_at(ms)).await.unwrap();
        }

        let trigger = BackgroundTrigger::new(
            config,
            Arc::new(ScriptedEndpoint::accepting()),
            ConnectivityMonitor::new(ConnectivityStatus::Online),
        );
        let outcome = trigger.on_trigger(DEFAULT_BACKGROUND_TAG).await.unwrap();
        assert_eq!(outcome.report().unwrap().synced, 2);

        // The foreground pool sees the background writes.
        assert_eq!(db.transactions().count_unsynced().await.unwrap(), 0);
        assert!(db.settings().last_sync_time().await.unwrap() > 0);
    }

    #[tokio::test]
    async fn test_on_trigger_offline_is_noop() {
        let (_dir, config, db) = on_disk_store().await;
        db.transactions().put(&sale_at(1_000)).await.unwrap();

        let trigger = BackgroundTrigger::new(
            config,
            Arc::new(ScriptedEndpoint::accepting()),
            ConnectivityMonitor::new(ConnectivityStatus::Offline),
        );
        assert_eq!(
            trigger.on_trigger(DEFAULT_BACKGROUND_TAG).await.unwrap(),
            PassOutcome::Offline
        );
        assert_eq!(db.transactions().count_unsynced().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_armed_task_runs_once_online() {
        let (_dir, config, db) = on_disk_store().await;
        db.transactions().put(&sale_at(1_000)).await.unwrap();

        let connectivity = ConnectivityMonitor::new(ConnectivityStatus::Offline);
        let endpoint = Arc::new(ScriptedEndpoint::accepting());
        let scheduler = TokioBackgroundScheduler::new(BackgroundTrigger::new(
            config,
            endpoint.clone(),
            connectivity.clone(),
        ));
        let mut done = scheduler.completions();

        assert!(scheduler.arm(DEFAULT_BACKGROUND_TAG));
        assert!(!scheduler.arm(DEFAULT_BACKGROUND_TAG));
        assert!(scheduler.is_armed(DEFAULT_BACKGROUND_TAG));

        tokio::task::yield_now().await;
        assert!(endpoint.submitted().is_empty());

        connectivity.report(ConnectivityStatus::Online);

        let completion = tokio::time::timeout(Duration::from_secs(5), done.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(completion.tag, DEFAULT_BACKGROUND_TAG);
        assert_eq!(completion.result.unwrap().report().unwrap().synced, 1);
        assert_eq!(db.transactions().count_unsynced().await.unwrap(), 0);

        // Spent; arming again registers a new task.
        assert!(!scheduler.is_armed(DEFAULT_BACKGROUND_TAG));
        assert!(scheduler.arm(DEFAULT_BACKGROUND_TAG));
    }

    #[test]
    fn test_arm_without_runtime() {
        let scheduler = TokioBackgroundScheduler::new(BackgroundTrigger::new(
            DbConfig::in_memory(),
            Arc::new(ScriptedEndpoint::accepting()),
            ConnectivityMonitor::new(ConnectivityStatus::Online),
        ));
        assert!(!scheduler.arm(DEFAULT_BACKGROUND_TAG));
        assert!(!scheduler.is_armed(DEFAULT_BACKGROUND_TAG));
    }
}
