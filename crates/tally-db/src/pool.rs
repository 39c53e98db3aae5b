//! # Database Pool Management
//!
//! Connection pool creation and configuration for the offline store.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Connection Pool                           │
//! │                                                                         │
//! │  Foreground context                  Background trigger                │
//! │       │                                   │                             │
//! │       ▼                                   ▼                             │
//! │  Database::open(config)              Database::open(config.clone())    │
//! │       │                                   │                             │
//! │       ▼                                   ▼                             │
//! │  ┌──────────────┐                   ┌──────────────┐                   │
//! │  │ SqlitePool A │                   │ SqlitePool B │                   │
//! │  └──────┬───────┘                   └──────┬───────┘                   │
//! │         │                                  │                            │
//! │         └──────────────┬───────────────────┘                            │
//! │                        ▼                                                │
//! │                  tally.db (WAL)                                        │
//! │  Each statement is atomic; busy_timeout absorbs writer contention.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! Readers don't block writers and writers don't block readers, so the two
//! contexts never see each other as "storage unavailable".

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::reference::ReferenceRepository;
use crate::repository::settings::SettingsRepository;
use crate::repository::transaction::TransactionRepository;

const IN_MEMORY_PATH: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// Cheap to clone; the background trigger keeps a copy so it can re-open the
/// store in its own context.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/path/to/tally.db")
///     .max_connections(4)
///     .busy_timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 4
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// Connection acquire timeout.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// How long a statement waits on a lock held by another context.
    /// Default: 5 seconds
    pub busy_timeout: Duration,

    /// Whether to run migrations on open.
    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// Creates a configuration for the database file at `path`.
    ///
    /// The file is created on first open.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 4,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the busy timeout.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on open.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// Every `Database::open` of this config yields a fresh, isolated store.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(IN_MEMORY_PATH),
            max_connections: 1, // In-memory requires single connection
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(1),
            run_migrations: true,
        }
    }

    /// True for the in-memory test configuration.
    pub fn is_in_memory(&self) -> bool {
        self.database_path == Path::new(IN_MEMORY_PATH)
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let options = if self.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::StorageUnavailable(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&self.database_path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
        };

        Ok(options
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(self.busy_timeout))
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle to the Durable Local Store.
///
/// Clones share one pool. Repositories are created on demand and are just a
/// pool handle plus SQL.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    config: DbConfig,
}

impl Database {
    /// Opens (and if needed creates) the store.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures WAL + NORMAL synchronous
    /// 3. Creates the connection pool
    /// 4. Runs migrations, creating the record families and the `synced` /
    ///    `timestamp` indexes if absent
    ///
    /// Opening an already-initialised store changes nothing.
    ///
    /// ## Errors
    /// * `DbError::StorageUnavailable` - the file could not be opened or created
    /// * `DbError::MigrationFailed` - schema could not be applied
    pub async fn open(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Opening local store"
        );

        let connect_options = config.connect_options()?;
        debug!("Connection options configured");

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout);

        if config.is_in_memory() {
            // The database lives exactly as long as its one connection.
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::StorageUnavailable(e.to_string()))?;

        info!(max_connections = config.max_connections, "Database pool created");

        let db = Database { pool, config };

        if db.config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Runs database migrations. Idempotent.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The configuration this store was opened with.
    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// Returns the transaction repository.
    pub fn transactions(&self) -> TransactionRepository {
        TransactionRepository::new(self.pool.clone())
    }

    /// Returns the reference-cache repository.
    pub fn references(&self) -> ReferenceRepository {
        ReferenceRepository::new(self.pool.clone())
    }

    /// Returns the settings repository.
    pub fn settings(&self) -> SettingsRepository {
        SettingsRepository::new(self.pool.clone())
    }

    /// Closes the pool. Later repository calls fail with `StorageUnavailable`.
    pub async fn close(&self) {
        info!("Closing local store");
        self.pool.close().await;
    }

    /// Checks if the database can execute queries.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::migration_status;

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::open(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);
    }

    #[tokio::test]
    async fn test_open_creates_indexes() {
        let db = Database::open(DbConfig::in_memory()).await.unwrap();

        let indexes: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = 'transactions' ORDER BY name",
        )
        .fetch_all(db.pool())
        .await
        .unwrap();

        assert!(indexes.contains(&"idx_transactions_synced".to_string()));
        assert!(indexes.contains(&"idx_transactions_timestamp".to_string()));
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let config = DbConfig::new(dir.path().join("tally.db"));

        let first = Database::open(config.clone()).await.unwrap();
        let (total, applied) = migration_status(first.pool()).await.unwrap();
        assert_eq!(total, applied);
        first.close().await;

        let second = Database::open(config).await.unwrap();
        let (_, applied_again) = migration_status(second.pool()).await.unwrap();
        assert_eq!(applied, applied_again);
        assert!(second.health_check().await);
    }

    #[tokio::test]
    async fn test_open_denied_is_storage_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        // Parent directory does not exist, so SQLite cannot create the file.
        let config = DbConfig::new(dir.path().join("missing").join("tally.db"))
            .connect_timeout(Duration::from_secs(2));

        let err = Database::open(config).await.unwrap_err();
        assert!(matches!(err, DbError::StorageUnavailable(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_closed_store_is_unavailable() {
        let db = Database::open(DbConfig::in_memory()).await.unwrap();
        db.close().await;

        let err = db.transactions().count().await.unwrap_err();
        assert!(matches!(err, DbError::StorageUnavailable(_)));
    }

    #[test]
    fn test_config_builder() {
        let config = DbConfig::new("/tmp/test.db")
            .max_connections(10)
            .min_connections(2);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert!(!config.is_in_memory());
        assert!(DbConfig::in_memory().is_in_memory());
    }
}
