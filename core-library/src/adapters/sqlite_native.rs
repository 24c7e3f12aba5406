//! Native SQLite Database Handle
//!
//! Implements [`DatabaseHandle`] using `sqlx` with the native SQLite driver.
//!
//! ## Features
//!
//! - Connection pooling with configurable limits
//! - WAL mode for file databases
//! - Prepared statement caching
//! - Foreign key enforcement
//! - Transactions pinned to one pooled connection
//!
//! Statements arrive fully rendered (literals inlined), so nothing is bound.

use async_trait::async_trait;
use bridge_traits::database::{
    DatabaseConfig, DatabaseHandle, ExecuteResult, QueryRow, QueryValue, Transaction,
};
use bridge_traits::error::{BridgeError, Result};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteQueryResult, SqliteRow,
    SqliteSynchronous,
};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// sqlx-backed SQLite handle
pub struct SqliteHandle {
    pool: Pool<Sqlite>,
    config: DatabaseConfig,
}

impl SqliteHandle {
    /// Open the connection pool described by `config`
    ///
    /// # Errors
    ///
    /// Returns error if the URL is malformed or the pool cannot connect
    pub async fn new(config: DatabaseConfig) -> Result<Self> {
        info!(
            database_url = %config.database_url,
            min_connections = config.min_connections,
            max_connections = config.max_connections,
            "Creating SQLite database handle"
        );

        let mut connect_options = SqliteConnectOptions::from_str(&config.database_url)
            .map_err(|e| BridgeError::DatabaseError(format!("Invalid database URL: {}", e)))?
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .create_if_missing(true)
            .pragma("cache_size", "-64000");

        if !config.is_in_memory() {
            connect_options = connect_options
                .journal_mode(SqliteJournalMode::Wal)
                .pragma("mmap_size", "268435456");
        }

        if config.enable_cache {
            connect_options = connect_options.statement_cache_capacity(config.cache_capacity);
        }

        let mut pool_options = SqlitePoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs));

        // an in-memory database lives only as long as its connection
        if config.is_in_memory() {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to create connection pool");
                BridgeError::DatabaseError(format!("Connection pool creation failed: {}", e))
            })?;

        info!(
            connections = pool.size(),
            "SQLite connection pool created successfully"
        );

        Ok(Self { pool, config })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: Pool<Sqlite>) -> Self {
        Self {
            pool,
            config: DatabaseConfig::default(),
        }
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }
}

/// Convert a sqlx row into positional cells
fn row_to_query_row(row: &SqliteRow) -> QueryRow {
    (0..row.len())
        .map(|ordinal| {
            if let Ok(v) = row.try_get::<Option<i64>, _>(ordinal) {
                v.map(QueryValue::Integer).unwrap_or(QueryValue::Null)
            } else if let Ok(v) = row.try_get::<Option<f64>, _>(ordinal) {
                v.map(QueryValue::Real).unwrap_or(QueryValue::Null)
            } else if let Ok(v) = row.try_get::<Option<String>, _>(ordinal) {
                v.map(QueryValue::Text).unwrap_or(QueryValue::Null)
            } else if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(ordinal) {
                v.map(QueryValue::Blob).unwrap_or(QueryValue::Null)
            } else if let Ok(v) = row.try_get::<Option<bool>, _>(ordinal) {
                v.map(|b| QueryValue::Integer(i64::from(b)))
                    .unwrap_or(QueryValue::Null)
            } else {
                QueryValue::Null
            }
        })
        .collect()
}

fn execute_result(result: SqliteQueryResult) -> ExecuteResult {
    ExecuteResult {
        rows_affected: result.rows_affected(),
        last_insert_id: Some(result.last_insert_rowid()),
    }
}

#[async_trait]
impl DatabaseHandle for SqliteHandle {
    async fn execute(&self, sql: &str) -> Result<ExecuteResult> {
        debug!(statement = %sql, "Executing statement");

        let result = sqlx::raw_sql(sql)
            .execute(&self.pool)
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Execute failed: {}", e)))?;

        debug!(
            rows_affected = result.rows_affected(),
            "Statement executed successfully"
        );
        Ok(execute_result(result))
    }

    async fn query(&self, sql: &str) -> Result<Vec<QueryRow>> {
        debug!(query = %sql, "Executing query");

        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Query failed: {}", e)))?;

        let result: Vec<QueryRow> = rows.iter().map(row_to_query_row).collect();
        debug!(row_count = result.len(), "Query executed successfully");
        Ok(result)
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        debug!("Beginning transaction");

        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Begin transaction failed: {}", e)))?;

        Ok(Box::new(SqliteTransaction {
            tx: Mutex::new(Some(tx)),
        }))
    }

    async fn health_check(&self) -> Result<()> {
        debug!("Performing database health check");

        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, "Database health check failed");
                BridgeError::DatabaseError(format!("Health check failed: {}", e))
            })?;

        debug!("Database health check passed");
        Ok(())
    }
}

/// A transaction holding one pooled connection until commit or rollback
///
/// Dropping it without either rolls the transaction back.
pub struct SqliteTransaction {
    tx: Mutex<Option<sqlx::Transaction<'static, Sqlite>>>,
}

#[async_trait]
impl DatabaseHandle for SqliteTransaction {
    async fn execute(&self, sql: &str) -> Result<ExecuteResult> {
        debug!(statement = %sql, "Executing statement in transaction");

        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or(BridgeError::TransactionClosed)?;
        let conn: &mut sqlx::SqliteConnection = &mut **tx;
        let result = sqlx::Executor::execute(conn, sqlx::raw_sql(sql))
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Execute failed: {}", e)))?;

        Ok(execute_result(result))
    }

    async fn query(&self, sql: &str) -> Result<Vec<QueryRow>> {
        debug!(query = %sql, "Executing query in transaction");

        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or(BridgeError::TransactionClosed)?;
        let rows = sqlx::query(sql)
            .fetch_all(&mut **tx)
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Query failed: {}", e)))?;

        Ok(rows.iter().map(row_to_query_row).collect())
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        Err(BridgeError::NotAvailable(
            "nested transactions are not supported".to_string(),
        ))
    }
}

#[async_trait]
impl Transaction for SqliteTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        debug!("Committing transaction");
        let tx = self
            .tx
            .into_inner()
            .ok_or(BridgeError::TransactionClosed)?;
        tx.commit()
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Commit transaction failed: {}", e)))
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        debug!("Rolling back transaction");
        let tx = self
            .tx
            .into_inner()
            .ok_or(BridgeError::TransactionClosed)?;
        tx.rollback().await.map_err(|e| {
            BridgeError::DatabaseError(format!("Rollback transaction failed: {}", e))
        })
    }

    fn as_handle(&self) -> &dyn DatabaseHandle {
        self
    }
}
