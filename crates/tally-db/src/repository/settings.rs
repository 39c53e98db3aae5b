//! # Settings Repository
//!
//! Typed key-value settings stored as JSON, plus the monotonic sync
//! timestamps.
//!
//! ## Monotonic Timestamps
//! ```text
//! advance_millis("lastSyncTime", 1700)   stored: 1700
//! advance_millis("lastSyncTime", 1500)   stored: 1700  (older pass, ignored)
//! advance_millis("lastSyncTime", 1900)   stored: 1900
//! ```
//! The comparison happens inside the upsert, so a foreground and a background
//! pass finishing out of order can never move the value backwards.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::{DbError, DbResult};

/// Epoch ms at the end of the most recent completed sync pass (0 = never).
pub const LAST_SYNC_TIME: &str = "lastSyncTime";

/// Epoch ms at the end of the most recent pass with zero failures (0 = never).
pub const LAST_SUCCESSFUL_SYNC_TIME: &str = "lastSuccessfulSyncTime";

/// Keys that `set` refuses; they only change through `advance_millis`.
const MONOTONIC_KEYS: [&str; 2] = [LAST_SYNC_TIME, LAST_SUCCESSFUL_SYNC_TIME];

/// Repository for the Settings family.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    /// Creates a new SettingsRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SettingsRepository { pool }
    }

    /// Reads a setting, `None` if never written.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> DbResult<Option<T>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        value
            .map(|v| serde_json::from_str(&v).map_err(|e| DbError::corrupted("settings", key, e)))
            .transpose()
    }

    /// Writes a setting, replacing any previous value.
    ///
    /// The sync timestamps are refused with `MonotonicSetting`.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> DbResult<()> {
        if MONOTONIC_KEYS.contains(&key) {
            return Err(DbError::MonotonicSetting {
                key: key.to_string(),
            });
        }

        let value = serde_json::to_string(value)
            .map_err(|e| DbError::WriteError(format!("serialize setting {key}: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Reads an epoch-ms setting, 0 if never written.
    pub async fn get_millis(&self, key: &str) -> DbResult<i64> {
        Ok(self.get::<i64>(key).await?.unwrap_or(0))
    }

    /// Raises an epoch-ms setting to `ms` if that is later than the stored
    /// value. Returns the value now stored.
    pub async fn advance_millis(&self, key: &str, ms: i64) -> DbResult<i64> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            WHERE CAST(excluded.value AS INTEGER) > CAST(settings.value AS INTEGER)
            "#,
        )
        .bind(key)
        .bind(ms.to_string())
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        self.get_millis(key).await
    }

    /// `lastSyncTime`, 0 if no pass has completed.
    pub async fn last_sync_time(&self) -> DbResult<i64> {
        self.get_millis(LAST_SYNC_TIME).await
    }

    /// `lastSuccessfulSyncTime`, 0 if no pass has completed cleanly.
    pub async fn last_successful_sync_time(&self) -> DbResult<i64> {
        self.get_millis(LAST_SUCCESSFUL_SYNC_TIME).await
    }
}
