//! # Reference Cache Repository
//!
//! Products and customers cached for offline checkout. One table holds
//! every record kind, keyed by `(kind, id)`; writes are full upserts.

use sqlx::SqlitePool;
use tally_core::validation::validate_reference;
use tally_core::{CoreError, ReferenceRecord};
use tracing::debug;

use crate::error::{DbError, DbResult};

const FAMILY: &str = "reference_records";

/// Repository for cached reference records.
#[derive(Debug, Clone)]
pub struct ReferenceRepository {
    pool: SqlitePool,
}

struct Encoded<'a> {
    id: &'a str,
    payload: String,
    last_updated: i64,
}

fn encode<R: ReferenceRecord>(record: &R) -> DbResult<Encoded<'_>> {
    validate_reference(record).map_err(CoreError::from)?;

    let payload = serde_json::to_string(record).map_err(|e| {
        DbError::WriteError(format!("serialize {} {}: {e}", R::KIND, record.id()))
    })?;

    Ok(Encoded {
        id: record.id(),
        payload,
        last_updated: record.last_updated().timestamp_millis(),
    })
}

fn decode<R: ReferenceRecord>(id: &str, payload: &str) -> DbResult<R> {
    serde_json::from_str(payload).map_err(|e| DbError::corrupted(FAMILY, id, e))
}

const UPSERT: &str = r#"
    INSERT INTO reference_records (kind, id, payload, last_updated)
    VALUES (?1, ?2, ?3, ?4)
    ON CONFLICT(kind, id) DO UPDATE SET
        payload = excluded.payload,
        last_updated = excluded.last_updated
"#;

impl ReferenceRepository {
    /// Creates a new ReferenceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReferenceRepository { pool }
    }

    /// Inserts or fully replaces one record.
    pub async fn put<R: ReferenceRecord>(&self, record: &R) -> DbResult<()> {
        let encoded = encode(record)?;

        sqlx::query(UPSERT)
            .bind(R::KIND)
            .bind(encoded.id)
            .bind(&encoded.payload)
            .bind(encoded.last_updated)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Upserts a batch atomically. Nothing is written if any record is invalid.
    pub async fn put_all<R: ReferenceRecord>(&self, records: &[R]) -> DbResult<usize> {
        let encoded = records.iter().map(encode).collect::<DbResult<Vec<_>>>()?;

        let mut db_tx = self.pool.begin().await?;
        for record in &encoded {
            sqlx::query(UPSERT)
                .bind(R::KIND)
                .bind(record.id)
                .bind(&record.payload)
                .bind(record.last_updated)
                .execute(&mut *db_tx)
                .await?;
        }
        db_tx.commit().await?;

        debug!(kind = R::KIND, count = encoded.len(), "Reference records cached");
        Ok(encoded.len())
    }

    /// Gets one cached record.
    pub async fn get<R: ReferenceRecord>(&self, id: &str) -> DbResult<Option<R>> {
        let payload: Option<String> =
            sqlx::query_scalar("SELECT payload FROM reference_records WHERE kind = ?1 AND id = ?2")
                .bind(R::KIND)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        payload.map(|p| decode(id, &p)).transpose()
    }

    /// All cached records of kind `R`, ordered by id.
    pub async fn get_all<R: ReferenceRecord>(&self) -> DbResult<Vec<R>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT id, payload FROM reference_records WHERE kind = ?1 ORDER BY id ASC",
        )
        .bind(R::KIND)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|(id, payload)| decode(id, payload)).collect()
    }

    /// Number of cached records of kind `R`.
    pub async fn count<R: ReferenceRecord>(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM reference_records WHERE kind = ?1")
                .bind(R::KIND)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}
