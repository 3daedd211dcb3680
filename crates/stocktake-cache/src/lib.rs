//! Stocktake Cache - Local record store
//!
//! SQLite-based persistence for:
//! - Audit sessions and their verification fields
//! - The activity journal
//!
//! ## Architecture
//!
//! This crate implements the `IAuditRepository` port from `stocktake-core`
//! using SQLite as the storage backend. It is a driven (secondary) adapter
//! in the hexagonal architecture.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with migration support
//! - [`SqliteAuditRepository`] - Full `IAuditRepository` implementation
//! - [`CacheError`] - Error types for store operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use stocktake_cache::{DatabasePool, SqliteAuditRepository};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/home/user/.local/share/stocktake/stocktake.db")).await?;
//! let repo = SqliteAuditRepository::new(pool.pool().clone());
//! // Use repo as IAuditRepository...
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod repository;

pub use pool::DatabasePool;
pub use repository::SqliteAuditRepository;

/// Errors raised by the record store itself
///
/// Repository methods surface these through `anyhow::Error`; callers that
/// care can downcast.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The database file could not be created or opened
    #[error("cannot open record store: {0}")]
    Open(String),

    /// Creating the schema failed
    #[error("cannot create schema: {0}")]
    Schema(String),

    /// A statement failed to execute
    #[error(transparent)]
    Query(#[from] sqlx::Error),

    /// A stored row violates a domain invariant or cannot be decoded
    #[error("corrupt record: {0}")]
    CorruptRecord(String),
}
