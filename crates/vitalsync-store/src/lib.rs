//! VitalSync Store - On-device sample persistence
//!
//! SQLite-backed store for the time-series samples waiting to be synced.
//!
//! ## Architecture
//!
//! This crate implements the `IBatchSource` port from `vitalsync-core`
//! using SQLite as the storage backend. It is a driven (secondary) adapter
//! in the hexagonal architecture: the sync engine pages through it by
//! metric and cursor, while the CLI fills it through `import`.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with migration support
//! - [`SqliteSampleStore`] - Sample storage and the `IBatchSource` implementation
//! - [`StoreError`] - Error types for store operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use vitalsync_store::{DatabasePool, SqliteSampleStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/home/user/.local/share/vitalsync/samples.db")).await?;
//! let store = SqliteSampleStore::new(pool.pool().clone());
//! // Use store as IBatchSource...
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod repository;

pub use pool::DatabasePool;
pub use repository::{MetricStats, SqliteSampleStore};

/// Errors that can occur during store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored row could not be turned back into a domain type
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A sample offered for insertion broke a domain invariant
    #[error("Invalid sample: {0}")]
    InvalidSample(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::QueryFailed(e.to_string())
    }
}
