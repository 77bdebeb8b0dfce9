//! # SQLite Pool
//!
//! Opens the database behind [`SqliteBlobStore`](crate::repositories::SqliteBlobStore)
//! and applies the embedded migrations.
//!
//! File databases run in WAL mode so payload reads are not blocked by a
//! concurrent write. In-memory databases are pinned to a single connection
//! that never expires; the data lives exactly as long as the pool.
//!
//! ```rust,ignore
//! use core_library::db::{create_pool, DatabaseConfig};
//! use core_library::repositories::SqliteBlobStore;
//!
//! let pool = create_pool(DatabaseConfig::new("player.db")).await?;
//! let store = SqliteBlobStore::new(pool);
//! ```

use crate::{LibraryError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where the cache database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    File(PathBuf),
    Memory,
}

/// Connection settings for the cache database.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub location: DatabaseLocation,

    /// Upper bound on pooled connections (forced to 1 in memory)
    pub max_connections: u32,

    /// How long a caller waits for a free connection
    pub acquire_timeout: Duration,

    /// Connections idle longer than this are closed (file databases only)
    pub idle_timeout: Option<Duration>,
}

impl DatabaseConfig {
    /// File-backed database at `database_path`, created if missing.
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            location: DatabaseLocation::File(database_path.into()),
            max_connections: 4,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
        }
    }

    /// Private in-memory database.
    pub fn in_memory() -> Self {
        Self {
            location: DatabaseLocation::Memory,
            max_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: None,
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    fn connect_options(&self) -> SqliteConnectOptions {
        match &self.location {
            DatabaseLocation::File(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                // Evicted payloads free many pages at once
                .pragma("auto_vacuum", "INCREMENTAL"),
            DatabaseLocation::Memory => SqliteConnectOptions::new().in_memory(true),
        }
    }

    fn pool_options(&self) -> SqlitePoolOptions {
        let options = SqlitePoolOptions::new().acquire_timeout(self.acquire_timeout);
        match self.location {
            DatabaseLocation::File(_) => options
                .max_connections(self.max_connections.max(1))
                .idle_timeout(self.idle_timeout),
            DatabaseLocation::Memory => options
                .min_connections(1)
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Open the pool and bring the schema up to date.
///
/// # Errors
///
/// [`LibraryError::Database`] when the database cannot be opened and
/// [`LibraryError::Migration`] when the schema cannot be applied.
pub async fn create_pool(config: DatabaseConfig) -> Result<Pool<Sqlite>> {
    info!(location = ?config.location, "Opening cache database");

    let pool = config
        .pool_options()
        .connect_with(config.connect_options())
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to open cache database");
            LibraryError::Database(e)
        })?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| LibraryError::Migration(e.to_string()))?;

    sqlx::query("SELECT 1").execute(&pool).await?;
    debug!(connections = pool.size(), "Cache database ready");

    Ok(pool)
}

/// In-memory pool with migrations applied.
pub async fn create_test_pool() -> Result<Pool<Sqlite>> {
    create_pool(DatabaseConfig::in_memory()).await
}
