//! SQLite connection handling
//!
//! Opens the record store, creating the file and its directory on first use,
//! and applies the schema before handing the pool out.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::CacheError;

/// Schema applied on every open; every statement is `IF NOT EXISTS`
const SCHEMA: &str = include_str!("migrations/20261016_initial.sql");

/// How long a writer waits for a competing approval to commit
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Connections kept for a file-backed store
const MAX_CONNECTIONS: u32 = 5;

/// Pool of connections to the record store
///
/// File-backed stores use WAL journaling so `audit show` and `activity`
/// can read while an approval is being written. In-memory stores live in a
/// single connection, since each SQLite connection would otherwise see its
/// own empty database.
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens (creating if needed) the database file at `db_path`
    ///
    /// # Errors
    ///
    /// `CacheError::Open` when the directory or file cannot be created or
    /// connected to, `CacheError::Schema` when the schema cannot be applied.
    pub async fn new(db_path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| CacheError::Open(format!("{}: {e}", parent.display())))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = Self::connect(options, MAX_CONNECTIONS)
            .await
            .map_err(|e| CacheError::Open(format!("{}: {e}", db_path.display())))?;
        Self::apply_schema(&pool).await?;

        tracing::info!(path = %db_path.display(), "Record store opened");
        Ok(Self { pool })
    }

    /// Opens a throwaway store held in memory
    pub async fn in_memory() -> Result<Self, CacheError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| CacheError::Open(format!("in-memory database: {e}")))?;
        let pool = Self::connect(options, 1)
            .await
            .map_err(|e| CacheError::Open(format!("in-memory database: {e}")))?;
        Self::apply_schema(&pool).await?;

        tracing::debug!("In-memory record store opened");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn connect(
        options: SqliteConnectOptions,
        max_connections: u32,
    ) -> Result<SqlitePool, sqlx::Error> {
        SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
    }

    async fn apply_schema(pool: &SqlitePool) -> Result<(), CacheError> {
        sqlx::raw_sql(SCHEMA)
            .execute(pool)
            .await
            .map_err(|e| CacheError::Schema(e.to_string()))?;
        tracing::debug!("Schema applied");
        Ok(())
    }
}
