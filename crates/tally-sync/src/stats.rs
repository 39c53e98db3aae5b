//! Sync statistics for the UI badge.

use serde::Serialize;
use tally_db::Database;
use ts_rs::TS;

use crate::error::SyncResult;

/// Queue depth and sync timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SyncStats {
    /// Transactions still waiting for the remote.
    pub unsynced_count: i64,
    /// All locally recorded transactions.
    pub total_count: i64,
    /// Epoch ms of the last completed pass, 0 if none.
    pub last_sync_time: i64,
    /// Epoch ms of the last pass with no failures, 0 if none.
    pub last_successful_sync_time: i64,
}

impl SyncStats {
    /// Reads the current figures from the store.
    pub async fn collect(db: &Database) -> SyncResult<Self> {
        let transactions = db.transactions();
        let settings = db.settings();

        Ok(SyncStats {
            unsynced_count: transactions.count_unsynced().await?,
            total_count: transactions.count().await?,
            last_sync_time: settings.last_sync_time().await?,
            last_successful_sync_time: settings.last_successful_sync_time().await?,
        })
    }

    /// True when nothing is waiting.
    pub fn is_drained(&self) -> bool {
        self.unsynced_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::{ConnectivityMonitor, ConnectivityStatus};
    use crate::engine::SyncEngine;
    use crate::testing::{memory_db, sale_at, ScriptedEndpoint};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_empty_store() {
        let db = memory_db().await;
        let stats = SyncStats::collect(&db).await.unwrap();
        assert_eq!(stats.total_count, 0);
        assert_eq!(stats.last_sync_time, 0);
        assert!(stats.is_drained());
    }

    #[tokio::test]
    async fn test_stats_after_partial_pass() {
        let db = memory_db().await;
        let mut ids = Vec::new();
        for ms in [1_000, 2_000, 3_000, 4_000, 5_000] {
            let tx = sale_at(ms);
            db.transactions().put(&tx).await.unwrap();
            ids.push(tx.id);
        }

        let endpoint = ScriptedEndpoint::failing(&[&ids[1], &ids[3]]);
        let engine = SyncEngine::new(
            db.clone(),
            Arc::new(endpoint),
            ConnectivityMonitor::new(ConnectivityStatus::Online),
        );
        engine.sync_all().await.unwrap();

        let stats = SyncStats::collect(&db).await.unwrap();
        assert_eq!(stats.unsynced_count, 2);
        assert_eq!(stats.total_count, 5);
        assert!(stats.last_sync_time > 0);
        assert_eq!(stats.last_successful_sync_time, 0);

        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(json["unsyncedCount"], 2);
        assert_eq!(json["totalCount"], 5);
    }
}
