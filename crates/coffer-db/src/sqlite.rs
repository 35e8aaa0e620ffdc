//! `SQLite` connection management and schema setup.
//!
//! The ledger lives in a single embedded database file. [`SqliteDb`] owns the
//! connection pool; every pooled connection is opened with foreign-key
//! enforcement on, WAL journaling, and a busy timeout so that writers queue
//! on the database lock instead of failing immediately.
//!
//! The schema (tables, indexes, and invariant triggers) is embedded from the
//! `migrations/` directory and applied once at startup. Every statement in it
//! is idempotent.

use std::path::PathBuf;
use std::time::Duration;

use sqlx::pool::PoolConnection;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Sqlite, SqliteConnection, SqlitePool};

use crate::error::DbError;

/// Default maximum number of connections in the pool.
const DEFAULT_MAX_CONNECTIONS: u32 = 8;

/// Default time a writer waits on the database lock, in milliseconds.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 30_000;

/// Default time to wait for a free pooled connection, in seconds.
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 60;

/// Configuration for the `SQLite` connection pool.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Path to the database file.
    pub path: PathBuf,
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// How long a connection waits on a locked database before failing.
    pub busy_timeout: Duration,
    /// How long an operation waits for a free pooled connection.
    pub acquire_timeout: Duration,
    /// Create the file if it does not exist.
    pub create_if_missing: bool,
}

impl SqliteConfig {
    /// Create a new configuration for the database file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
            create_if_missing: true,
        }
    }

    /// Set the maximum number of connections.
    #[must_use]
    pub const fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the busy timeout.
    #[must_use]
    pub const fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Set the pool acquire timeout.
    #[must_use]
    pub const fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Set whether a missing database file is created.
    #[must_use]
    pub const fn with_create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }
}

/// Connection pool handle to the ledger database.
///
/// Cloning is cheap; clones share the same pool.
#[derive(Debug, Clone)]
pub struct SqliteDb {
    pool: SqlitePool,
}

impl SqliteDb {
    /// Open the pool without touching the schema.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the configuration is unusable, or
    /// [`DbError::Storage`] if the database cannot be opened.
    pub async fn connect(config: &SqliteConfig) -> Result<Self, DbError> {
        if config.max_connections == 0 {
            return Err(DbError::Config(
                "max_connections must be at least 1".to_owned(),
            ));
        }

        let connect_options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(config.create_if_missing)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(config.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(connect_options)
            .await?;

        tracing::info!(
            path = %config.path.display(),
            max_connections = config.max_connections,
            "Connected to SQLite"
        );

        Ok(Self { pool })
    }

    /// Open the pool and apply the schema.
    ///
    /// The ledger must not serve any operation without its schema, so a
    /// failure here should abort startup.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection or the migration fails.
    pub async fn open(config: &SqliteConfig) -> Result<Self, DbError> {
        let db = Self::connect(config).await?;
        db.run_migrations().await?;
        Ok(db)
    }

    /// Apply all pending migrations from the `migrations/` directory.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Migration`] if any migration fails.
    pub async fn run_migrations(&self) -> Result<(), DbError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Database schema ready");
        Ok(())
    }

    /// Return a reference to the underlying [`SqlitePool`].
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close all connections in the pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("SQLite pool closed");
    }
}

/// A write-exclusive transaction (`BEGIN IMMEDIATE`).
///
/// The database write lock is taken before the first read, so a
/// read-modify-write inside it cannot interleave with another writer.
/// If the value is dropped without [`commit`](Self::commit), the
/// connection is closed instead of returned to the pool, which rolls the
/// transaction back.
pub(crate) struct ImmediateTransaction {
    conn: PoolConnection<Sqlite>,
    open: bool,
}

impl ImmediateTransaction {
    /// Acquire a pooled connection and take the write lock.
    pub(crate) async fn begin(pool: &SqlitePool) -> Result<Self, DbError> {
        let mut conn = pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
        Ok(Self { conn, open: true })
    }

    /// The connection to run statements on.
    pub(crate) fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }

    /// Commit and release the connection to the pool.
    pub(crate) async fn commit(mut self) -> Result<(), DbError> {
        sqlx::query("COMMIT").execute(&mut *self.conn).await?;
        self.open = false;
        Ok(())
    }
}

impl Drop for ImmediateTransaction {
    fn drop(&mut self) {
        if self.open {
            self.conn.close_on_drop();
        }
    }
}
