//! Database Handle Abstraction
//!
//! The query core never talks to a driver directly. It renders complete SQL
//! text (every literal already inlined and escaped) and hands it to a
//! [`DatabaseHandle`], which owns connections, pooling, and transactions.
//!
//! ## Design Philosophy
//!
//! The handle surface is intentionally tiny:
//!
//! - `execute` for statements that do not return rows
//! - `query` for statements that do, returning *positional* row tuples
//! - `begin` to open a transaction scope that is itself a handle
//!
//! Rows are positional rather than keyed by column name because joined
//! projections routinely contain the same column name more than once; the
//! core maps positions back to nested result objects itself.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_traits::database::DatabaseHandle;
//!
//! let rows = handle.query("SELECT `tracks`.`title` FROM `tracks` AS `tracks`").await?;
//! for row in rows {
//!     println!("{:?}", row[0]);
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{error::Result, platform::PlatformSendSync};

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration used by handle implementations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Database file path or connection string
    pub database_url: String,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Maximum time to wait for a connection (seconds)
    pub acquire_timeout_secs: u64,

    /// Enable statement caching
    pub enable_cache: bool,

    /// Statement cache capacity
    pub cache_capacity: usize,
}

impl DatabaseConfig {
    /// Create a new database configuration with the given file path
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        let path = database_path.into();
        let database_url = format!("sqlite:{}", path.display());

        Self {
            database_url,
            min_connections: 1,
            max_connections: 5,
            acquire_timeout_secs: 30,
            enable_cache: true,
            cache_capacity: 100,
        }
    }

    /// Create a configuration for an in-memory database
    ///
    /// In-memory SQLite databases are private to one connection, so the pool is
    /// pinned to a single connection.
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            min_connections: 1,
            max_connections: 1,
            acquire_timeout_secs: 30,
            enable_cache: true,
            cache_capacity: 100,
        }
    }

    /// Whether this configuration points at an in-memory database
    pub fn is_in_memory(&self) -> bool {
        self.database_url.contains(":memory:")
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

// =============================================================================
// Query Result Types
// =============================================================================

/// A single row returned by a driver: one cell per projected column, in order
pub type QueryRow = Vec<QueryValue>;

/// Represents a driver cell that can be null, integer, real, text, or blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl QueryValue {
    /// Convert to i64 if possible
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            QueryValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Convert to f64 if possible
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            QueryValue::Real(r) => Some(*r),
            QueryValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Convert to &str if possible
    pub fn as_str(&self) -> Option<&str> {
        match self {
            QueryValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Convert to bytes if possible
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            QueryValue::Blob(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, QueryValue::Null)
    }
}

/// Outcome of a statement that does not return rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteResult {
    /// Number of rows inserted, updated, or deleted
    pub rows_affected: u64,
    /// Driver-reported id of the last inserted row, when the driver has one
    pub last_insert_id: Option<i64>,
}

// =============================================================================
// Handle Traits
// =============================================================================

/// Database handle consumed by the query core
///
/// ## Thread Safety
///
/// Implementations must be thread-safe on native targets (`Send + Sync`).
/// Independent callers may issue queries concurrently; no ordering between
/// them is implied.
///
/// ## Error Handling
///
/// Driver failures are reported as [`BridgeError`](crate::BridgeError) and are
/// propagated unchanged by the core. Handles decide on their own whether to
/// retry; the core never does.
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait DatabaseHandle: PlatformSendSync {
    /// Execute a statement that doesn't return rows (INSERT, UPDATE, DELETE, DDL)
    async fn execute(&self, sql: &str) -> Result<ExecuteResult>;

    /// Execute a query and return every row as a positional tuple
    async fn query(&self, sql: &str) -> Result<Vec<QueryRow>>;

    /// Open a transaction scope
    ///
    /// Every statement issued through the returned handle runs inside the
    /// transaction until [`Transaction::commit`] or [`Transaction::rollback`]
    /// consumes it.
    async fn begin(&self) -> Result<Box<dyn Transaction>>;

    /// Check if the underlying connection is healthy
    async fn health_check(&self) -> Result<()> {
        self.query("SELECT 1").await.map(|_| ())
    }
}

/// A database handle pinned to one open transaction
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait Transaction: DatabaseHandle {
    /// Commit all work done through this handle
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discard all work done through this handle
    async fn rollback(self: Box<Self>) -> Result<()>;

    /// View this transaction as a plain handle
    fn as_handle(&self) -> &dyn DatabaseHandle;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_value_conversions() {
        let int_val = QueryValue::Integer(42);
        assert_eq!(int_val.as_i64(), Some(42));
        assert_eq!(int_val.as_f64(), Some(42.0));
        assert!(int_val.as_str().is_none());

        let text_val = QueryValue::Text("hello".to_string());
        assert_eq!(text_val.as_str(), Some("hello"));
        assert!(text_val.as_i64().is_none());

        let blob_val = QueryValue::Blob(vec![1, 2]);
        assert_eq!(blob_val.as_bytes(), Some(&[1u8, 2][..]));

        let null_val = QueryValue::Null;
        assert!(null_val.is_null());
        assert!(null_val.as_i64().is_none());
    }

    #[test]
    fn test_database_config_in_memory() {
        let config = DatabaseConfig::in_memory();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.max_connections, 1);
        assert_eq!(config.acquire_timeout_secs, 30);
        assert!(config.enable_cache);
        assert!(config.is_in_memory());
    }

    #[test]
    fn test_database_config_from_path() {
        let config = DatabaseConfig::new("library.db");
        assert_eq!(config.database_url, "sqlite:library.db");
        assert_eq!(config.max_connections, 5);
        assert!(!config.is_in_memory());
    }

    #[test]
    fn test_execute_result_default() {
        let result = ExecuteResult::default();
        assert_eq!(result.rows_affected, 0);
        assert!(result.last_insert_id.is_none());
    }
}
