//! # Transaction Repository
//!
//! The Transactions family: the local queue the sync engine drains.
//!
//! ## Row Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Transaction Row Lifecycle                            │
//! │                                                                         │
//! │  record_transaction(draft)                                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  put(tx)  ──► INSERT ... synced = 0, attempts = 0                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  query_by_index(Synced(false))  ◄── sync pass, creation order          │
//! │       │                                                                 │
//! │       ├── submit ok   ──► mark_synced(id)                              │
//! │       │                   UPDATE ... SET synced = 1                    │
//! │       │                   WHERE id = ? AND synced = 0                  │
//! │       │                                                                 │
//! │       └── submit fail ──► record_failure(id, err)                      │
//! │                           attempts += 1, last_error = ?                │
//! │                           (row stays unsynced for the next pass)       │
//! │                                                                         │
//! │  Rows are never deleted; payload never changes; synced never clears.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tally_core::validation::validate_transaction;
use tally_core::Transaction;
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};

const FAMILY: &str = "transactions";

/// Secondary indexes on the Transactions family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionIndex {
    /// The `synced` flag.
    Synced(bool),
    /// Creation time in `[from, to)`.
    Timestamp {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}

/// What a `put` did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// New row written.
    Inserted,
    /// Row already present with identical content; flag unchanged.
    Unchanged,
    /// Row already present and this write flipped it to synced.
    MarkedSynced,
}

/// Sync bookkeeping for one row. Never part of the wire format.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SyncAttempts {
    pub attempts: i64,
    pub last_error: Option<String>,
    pub attempted_at: Option<i64>,
    pub synced_at: Option<i64>,
}

#[derive(sqlx::FromRow)]
struct TransactionRow {
    id: String,
    payload: String,
    synced: bool,
}

impl TransactionRow {
    fn into_transaction(self) -> DbResult<Transaction> {
        let mut tx: Transaction = serde_json::from_str(&self.payload)
            .map_err(|e| DbError::corrupted(FAMILY, &self.id, e))?;
        // The column is authoritative; the payload is frozen at insert time.
        tx.synced = self.synced;
        Ok(tx)
    }
}

/// Repository for the Transactions family.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
}

impl TransactionRepository {
    /// Creates a new TransactionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TransactionRepository { pool }
    }

    /// Durably stores a transaction.
    ///
    /// ## Behaviour
    /// - Unknown id: the row is inserted.
    /// - Known id, same content: only a `false -> true` flag change is
    ///   applied; a stale `synced = false` never clears the flag.
    /// - Known id, different content: `ImmutableRecord`, nothing written.
    ///
    /// Contract violations are rejected before any SQL runs.
    pub async fn put(&self, tx: &Transaction) -> DbResult<PutOutcome> {
        validate_transaction(tx)?;

        let payload = serde_json::to_string(tx)
            .map_err(|e| DbError::WriteError(format!("serialize transaction {}: {e}", tx.id)))?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO transactions (
                id, timestamp, synced, payment_method, total, payload, synced_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&tx.id)
        .bind(tx.timestamp_millis())
        .bind(tx.synced)
        .bind(tx.payment_method.as_str())
        .bind(tx.total().minor())
        .bind(&payload)
        .bind(tx.synced.then(|| Utc::now().timestamp_millis()))
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted == 1 {
            debug!(id = %tx.id, synced = tx.synced, "Transaction stored");
            return Ok(PutOutcome::Inserted);
        }

        let stored = self
            .get_by_id(&tx.id)
            .await?
            .ok_or_else(|| DbError::not_found(FAMILY, &tx.id))?;

        if !stored.same_content(tx) {
            warn!(id = %tx.id, "Rejected content change to stored transaction");
            return Err(DbError::ImmutableRecord { id: tx.id.clone() });
        }

        if tx.synced && self.mark_synced(&tx.id).await? {
            return Ok(PutOutcome::MarkedSynced);
        }

        Ok(PutOutcome::Unchanged)
    }

    /// Gets a transaction by id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(
            "SELECT id, payload, synced FROM transactions WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TransactionRow::into_transaction).transpose()
    }

    /// All transactions in creation order.
    pub async fn get_all(&self) -> DbResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            "SELECT id, payload, synced FROM transactions ORDER BY timestamp ASC, rowid ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TransactionRow::into_transaction).collect()
    }

    /// Transactions matching an index value, in creation order.
    pub async fn query_by_index(&self, index: TransactionIndex) -> DbResult<Vec<Transaction>> {
        let rows = match index {
            TransactionIndex::Synced(synced) => {
                sqlx::query_as::<_, TransactionRow>(
                    r#"
                    SELECT id, payload, synced FROM transactions
                    WHERE synced = ?1
                    ORDER BY timestamp ASC, rowid ASC
                    "#,
                )
                .bind(synced)
                .fetch_all(&self.pool)
                .await?
            }
            TransactionIndex::Timestamp { from, to } => {
                sqlx::query_as::<_, TransactionRow>(
                    r#"
                    SELECT id, payload, synced FROM transactions
                    WHERE timestamp >= ?1 AND timestamp < ?2
                    ORDER BY timestamp ASC, rowid ASC
                    "#,
                )
                .bind(from.timestamp_millis())
                .bind(to.timestamp_millis())
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(TransactionRow::into_transaction).collect()
    }

    /// Unsynced transactions, oldest first.
    pub async fn get_unsynced(&self) -> DbResult<Vec<Transaction>> {
        self.query_by_index(TransactionIndex::Synced(false)).await
    }

    /// Current flag for `id`, `None` if the row does not exist.
    pub async fn is_synced(&self, id: &str) -> DbResult<Option<bool>> {
        let synced: Option<bool> =
            sqlx::query_scalar("SELECT synced FROM transactions WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(synced)
    }

    /// Flips `synced` to true.
    ///
    /// Returns `true` if this call made the transition, `false` if the row was
    /// already synced (a concurrent pass got there first).
    pub async fn mark_synced(&self, id: &str) -> DbResult<bool> {
        let now = Utc::now().timestamp_millis();

        let updated = sqlx::query(
            r#"
            UPDATE transactions SET
                synced = 1,
                synced_at = ?2,
                attempted_at = ?2,
                last_error = NULL
            WHERE id = ?1 AND synced = 0
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 1 {
            debug!(id = %id, "Transaction marked synced");
            return Ok(true);
        }

        match self.is_synced(id).await? {
            Some(_) => Ok(false),
            None => Err(DbError::not_found(FAMILY, id)),
        }
    }

    /// Records a recoverable submission failure. The row stays unsynced.
    pub async fn record_failure(&self, id: &str, error: &str) -> DbResult<()> {
        let now = Utc::now().timestamp_millis();

        sqlx::query(
            r#"
            UPDATE transactions SET
                attempts = attempts + 1,
                last_error = ?2,
                attempted_at = ?3
            WHERE id = ?1 AND synced = 0
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Attempt bookkeeping for one row.
    pub async fn sync_attempts(&self, id: &str) -> DbResult<Option<SyncAttempts>> {
        let attempts = sqlx::query_as::<_, SyncAttempts>(
            r#"
            SELECT attempts, last_error, attempted_at, synced_at
            FROM transactions WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(attempts)
    }

    /// Total number of transactions.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Number of transactions still waiting for sync.
    pub async fn count_unsynced(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE synced = 0")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::TimeZone;
    use tally_core::{LineItem, Money, PaymentMethod, TransactionDraft};

    async fn setup() -> TransactionRepository {
        Database::open(DbConfig::in_memory())
            .await
            .unwrap()
            .transactions()
    }

    fn sale_at(ms: i64) -> Transaction {
        let items = vec![LineItem {
            item_id: "es-teh".into(),
            name: "Es Teh".into(),
            unit_price: Money::from_minor(5_000),
            quantity: 2,
            unit: "glass".into(),
        }];
        let at = Utc.timestamp_millis_opt(ms).unwrap();
        TransactionDraft::new(items, PaymentMethod::Cash)
            .into_transaction(at)
            .unwrap()
    }

    #[tokio::test]
    async fn test_put_and_get_round_trip() {
        let repo = setup().await;
        let mut tx = sale_at(1_700_000_000_000);
        tx.note = Some("meja 4".into());

        assert_eq!(repo.put(&tx).await.unwrap(), PutOutcome::Inserted);

        let loaded = repo.get_by_id(&tx.id).await.unwrap().unwrap();
        assert_eq!(loaded, tx);
        assert!(repo.get_by_id("trx-missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unsynced_index_in_creation_order() {
        let repo = setup().await;
        let late = sale_at(3_000);
        let early = sale_at(1_000);
        let middle = sale_at(2_000);

        for tx in [&late, &early, &middle] {
            repo.put(tx).await.unwrap();
        }

        let ids: Vec<String> = repo
            .get_unsynced()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![early.id.clone(), middle.id, late.id]);

        repo.mark_synced(&early.id).await.unwrap();
        assert_eq!(repo.count_unsynced().await.unwrap(), 2);
        assert_eq!(
            repo.query_by_index(TransactionIndex::Synced(true))
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_timestamp_range_query() {
        let repo = setup().await;
        for ms in [1_000, 2_000, 3_000] {
            repo.put(&sale_at(ms)).await.unwrap();
        }

        let found = repo
            .query_by_index(TransactionIndex::Timestamp {
                from: Utc.timestamp_millis_opt(1_500).unwrap(),
                to: Utc.timestamp_millis_opt(3_000).unwrap(),
            })
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].timestamp_millis(), 2_000);
    }

    #[tokio::test]
    async fn test_mark_synced_transitions_once() {
        let repo = setup().await;
        let tx = sale_at(1_000);
        repo.put(&tx).await.unwrap();

        assert!(repo.mark_synced(&tx.id).await.unwrap());
        assert!(!repo.mark_synced(&tx.id).await.unwrap());
        assert_eq!(repo.is_synced(&tx.id).await.unwrap(), Some(true));

        let attempts = repo.sync_attempts(&tx.id).await.unwrap().unwrap();
        assert!(attempts.synced_at.is_some());
    }

    #[tokio::test]
    async fn test_mark_synced_unknown_id() {
        let repo = setup().await;
        let err = repo.mark_synced("trx-nope").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_stale_put_never_clears_synced() {
        let repo = setup().await;
        let tx = sale_at(1_000);
        repo.put(&tx).await.unwrap();
        repo.mark_synced(&tx.id).await.unwrap();

        // tx still carries synced = false
        assert_eq!(repo.put(&tx).await.unwrap(), PutOutcome::Unchanged);
        assert_eq!(repo.is_synced(&tx.id).await.unwrap(), Some(true));
    }

    #[tokio::test]
    async fn test_put_with_synced_flag_marks_row() {
        let repo = setup().await;
        let mut tx = sale_at(1_000);
        repo.put(&tx).await.unwrap();

        tx.synced = true;
        assert_eq!(repo.put(&tx).await.unwrap(), PutOutcome::MarkedSynced);
        assert_eq!(repo.count_unsynced().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_content_change_rejected() {
        let repo = setup().await;
        let tx = sale_at(1_000);
        repo.put(&tx).await.unwrap();

        let mut altered = tx.clone();
        altered.note = Some("edited".into());

        let err = repo.put(&altered).await.unwrap_err();
        assert!(matches!(err, DbError::ImmutableRecord { .. }));
        assert_eq!(repo.get_by_id(&tx.id).await.unwrap().unwrap().note, None);
    }

    #[tokio::test]
    async fn test_invalid_transaction_not_written() {
        let repo = setup().await;
        let mut tx = sale_at(1_000);
        tx.totals.total = Money::from_minor(1);

        let err = repo.put(&tx).await.unwrap_err();
        assert!(err.is_contract_error());
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_record_failure_keeps_row_unsynced() {
        let repo = setup().await;
        let tx = sale_at(1_000);
        repo.put(&tx).await.unwrap();

        repo.record_failure(&tx.id, "HTTP 503").await.unwrap();
        repo.record_failure(&tx.id, "timed out").await.unwrap();

        let attempts = repo.sync_attempts(&tx.id).await.unwrap().unwrap();
        assert_eq!(attempts.attempts, 2);
        assert_eq!(attempts.last_error.as_deref(), Some("timed out"));
        assert_eq!(repo.is_synced(&tx.id).await.unwrap(), Some(false));

        repo.mark_synced(&tx.id).await.unwrap();
        let attempts = repo.sync_attempts(&tx.id).await.unwrap().unwrap();
        assert_eq!(attempts.last_error, None);
    }

    #[tokio::test]
    async fn test_rows_cannot_be_deleted() {
        let repo = setup().await;
        let tx = sale_at(1_000);
        repo.put(&tx).await.unwrap();

        let result = sqlx::query("DELETE FROM transactions WHERE id = ?1")
            .bind(&tx.id)
            .execute(&repo.pool)
            .await;

        assert!(result.is_err());
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_full_storage_is_write_error() {
        let db = Database::open(DbConfig::in_memory()).await.unwrap();
        let repo = db.transactions();

        let pages: i64 = sqlx::query_scalar("PRAGMA page_count")
            .fetch_one(db.pool())
            .await
            .unwrap();
        sqlx::query(&format!("PRAGMA max_page_count = {pages}"))
            .execute(db.pool())
            .await
            .unwrap();

        let mut stored = 0;
        let err = loop {
            match repo.put(&sale_at(1_000 + stored)).await {
                Ok(_) => stored += 1,
                Err(e) => break e,
            }
            assert!(stored < 10_000, "quota never hit");
        };

        assert!(matches!(err, DbError::WriteError(_)), "got {err:?}");
        assert!(!err.is_contract_error());
        assert_eq!(repo.count().await.unwrap(), stored);
    }
}
