//! # Core Configuration Module
//!
//! Provides configuration management for the catalogue core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance describing where the database lives, how its connection pool is
//! sized, which SQL flavor queries are rendered in, and how logging is set
//! up. It enforces fail-fast validation so a bad configuration is rejected
//! before any connection is opened.
//!
//! ## Usage
//!
//! ### File Database
//!
//! ```
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/path/to/music.db")
//!     .max_connections(8)
//!     .build()
//!     .expect("Failed to build config");
//! assert_eq!(config.database_config().max_connections, 8);
//! ```
//!
//! ### In-Memory Database
//!
//! ```
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder().in_memory().build().unwrap();
//! assert!(config.database_config().is_in_memory());
//! ```
//!
//! ## Error Handling
//!
//! The builder returns actionable error messages:
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // This will panic: no database location was given
//! let config = CoreConfig::builder()
//!     .max_connections(4)
//!     .build()
//!     .expect("Should fail - missing database location");
//! ```

use crate::error::{Error, Result};
use crate::logging::LoggingConfig;
use bridge_traits::database::DatabaseConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_STATEMENT_CACHE_CAPACITY: usize = 100;

/// Where the catalogue database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    /// SQLite database file, created if missing
    File(PathBuf),
    /// Private in-memory database, gone when the pool closes
    InMemory,
}

/// SQL flavor queries are rendered in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlFlavor {
    #[default]
    Sqlite,
    Mysql,
}

impl FromStr for SqlFlavor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(SqlFlavor::Sqlite),
            "mysql" => Ok(SqlFlavor::Mysql),
            other => Err(Error::Config(format!(
                "Unknown SQL flavor '{}'. Expected 'sqlite' or 'mysql'.",
                other
            ))),
        }
    }
}

/// Core configuration for the catalogue core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Database file or in-memory database
    pub database: DatabaseLocation,

    /// Minimum number of pooled connections
    pub min_connections: u32,

    /// Maximum number of pooled connections
    pub max_connections: u32,

    /// Seconds to wait for a pooled connection
    pub acquire_timeout_secs: u64,

    /// Prepared statement cache size; `None` disables the cache
    pub statement_cache_capacity: Option<usize>,

    /// Dialect used when rendering queries
    pub sql_flavor: SqlFlavor,

    /// Emit rendered SQL at debug level
    pub log_sql: bool,

    /// Create missing catalogue tables during bootstrap
    pub create_schema: bool,

    /// Logging setup; `None` leaves the global subscriber untouched
    pub logging: Option<LoggingConfig>,
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Database path is not empty
    /// - Pool bounds are consistent and non-zero
    /// - In-memory databases use a single connection
    /// - Acquire timeout and statement cache are non-zero
    pub fn validate(&self) -> Result<()> {
        if let DatabaseLocation::File(path) = &self.database {
            if path.as_os_str().is_empty() {
                return Err(Error::Config("Database path cannot be empty".to_string()));
            }
        }

        if self.max_connections == 0 {
            return Err(Error::Config(
                "max_connections must be greater than 0".to_string(),
            ));
        }

        if self.min_connections > self.max_connections {
            return Err(Error::Config(format!(
                "min_connections ({}) cannot exceed max_connections ({})",
                self.min_connections, self.max_connections
            )));
        }

        if self.database == DatabaseLocation::InMemory && self.max_connections > 1 {
            return Err(Error::Config(
                "In-memory databases are private to one connection. \
                 Set max_connections to 1 or use .database_path() for a shared file database."
                    .to_string(),
            ));
        }

        if self.acquire_timeout_secs == 0 {
            return Err(Error::Config(
                "acquire_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.statement_cache_capacity == Some(0) {
            return Err(Error::Config(
                "Statement cache capacity must be greater than 0. \
                 Use .disable_statement_cache() to turn the cache off."
                    .to_string(),
            ));
        }

        Ok(())
    }

    /// Handle configuration derived from these settings
    pub fn database_config(&self) -> DatabaseConfig {
        let base = match &self.database {
            DatabaseLocation::File(path) => DatabaseConfig::new(path),
            DatabaseLocation::InMemory => DatabaseConfig::in_memory(),
        };
        DatabaseConfig {
            min_connections: self.min_connections,
            max_connections: self.max_connections,
            acquire_timeout_secs: self.acquire_timeout_secs,
            enable_cache: self.statement_cache_capacity.is_some(),
            cache_capacity: self
                .statement_cache_capacity
                .unwrap_or(DEFAULT_STATEMENT_CACHE_CAPACITY),
            ..base
        }
    }
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Call [`build()`](CoreConfigBuilder::build) to validate and create the
/// final config.
#[derive(Debug, Default)]
pub struct CoreConfigBuilder {
    database: Option<DatabaseLocation>,
    min_connections: Option<u32>,
    max_connections: Option<u32>,
    acquire_timeout_secs: Option<u64>,
    statement_cache_capacity: Option<Option<usize>>,
    sql_flavor: SqlFlavor,
    log_sql: bool,
    create_schema: Option<bool>,
    logging: Option<LoggingConfig>,
}

impl CoreConfigBuilder {
    /// Sets the database path.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder()
    ///     .database_path("/path/to/music.db");
    /// ```
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database = Some(DatabaseLocation::File(path.into()));
        self
    }

    /// Use a private in-memory database (tests, previews)
    pub fn in_memory(mut self) -> Self {
        self.database = Some(DatabaseLocation::InMemory);
        self
    }

    pub fn min_connections(mut self, connections: u32) -> Self {
        self.min_connections = Some(connections);
        self
    }

    pub fn max_connections(mut self, connections: u32) -> Self {
        self.max_connections = Some(connections);
        self
    }

    pub fn acquire_timeout_secs(mut self, secs: u64) -> Self {
        self.acquire_timeout_secs = Some(secs);
        self
    }

    pub fn statement_cache_capacity(mut self, capacity: usize) -> Self {
        self.statement_cache_capacity = Some(Some(capacity));
        self
    }

    pub fn disable_statement_cache(mut self) -> Self {
        self.statement_cache_capacity = Some(None);
        self
    }

    pub fn sql_flavor(mut self, flavor: SqlFlavor) -> Self {
        self.sql_flavor = flavor;
        self
    }

    /// Emit every rendered statement at debug level.
    ///
    /// Off by default: statements carry inlined literal values.
    pub fn log_sql(mut self, enabled: bool) -> Self {
        self.log_sql = enabled;
        self
    }

    /// Create missing catalogue tables during bootstrap (default: true)
    pub fn create_schema(mut self, enabled: bool) -> Self {
        self.create_schema = Some(enabled);
        self
    }

    /// Initialize logging during bootstrap with this configuration
    pub fn logging(mut self, config: LoggingConfig) -> Self {
        self.logging = Some(config);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if no database location was set or validation fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    /// let config = CoreConfig::builder()
    ///     .database_path("/path/to/music.db")
    ///     .build()?;
    /// # Ok::<(), core_runtime::Error>(())
    /// ```
    pub fn build(self) -> Result<CoreConfig> {
        let database = self.database.ok_or_else(|| {
            Error::Config(
                "Database location is required. Use .database_path() or .in_memory() to set it."
                    .to_string(),
            )
        })?;

        let default_max = match database {
            DatabaseLocation::InMemory => 1,
            DatabaseLocation::File(_) => DEFAULT_MAX_CONNECTIONS,
        };
        let max_connections = self.max_connections.unwrap_or(default_max);

        let logging = self.logging.map(|logging| logging.with_sql_statements(self.log_sql));

        let config = CoreConfig {
            database,
            min_connections: self.min_connections.unwrap_or(1.min(max_connections)),
            max_connections,
            acquire_timeout_secs: self
                .acquire_timeout_secs
                .unwrap_or(DEFAULT_ACQUIRE_TIMEOUT_SECS),
            statement_cache_capacity: self
                .statement_cache_capacity
                .unwrap_or(Some(DEFAULT_STATEMENT_CACHE_CAPACITY)),
            sql_flavor: self.sql_flavor,
            log_sql: self.log_sql,
            create_schema: self.create_schema.unwrap_or(true),
            logging,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_requires_database_location() {
        let result = CoreConfig::builder().build();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Database location is required"));
    }

    #[test]
    fn test_file_database_defaults() {
        let config = CoreConfig::builder()
            .database_path("/music/library.db")
            .build()
            .unwrap();

        assert_eq!(
            config.database,
            DatabaseLocation::File(PathBuf::from("/music/library.db"))
        );
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.sql_flavor, SqlFlavor::Sqlite);
        assert!(!config.log_sql);
        assert!(config.create_schema);
        assert!(config.logging.is_none());

        let db = config.database_config();
        assert_eq!(db.database_url, "sqlite:/music/library.db");
        assert!(db.enable_cache);
        assert_eq!(db.cache_capacity, DEFAULT_STATEMENT_CACHE_CAPACITY);
    }

    #[test]
    fn test_in_memory_defaults_to_one_connection() {
        let config = CoreConfig::builder().in_memory().build().unwrap();
        assert_eq!(config.max_connections, 1);
        assert!(config.database_config().is_in_memory());
    }

    #[test]
    fn test_in_memory_rejects_larger_pool() {
        let err = CoreConfig::builder()
            .in_memory()
            .max_connections(4)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("In-memory databases"));
    }

    #[test]
    fn test_empty_database_path_rejected() {
        let err = CoreConfig::builder().database_path("").build().unwrap_err();
        assert!(err.to_string().contains("Database path cannot be empty"));
    }

    #[test]
    fn test_pool_bounds_validated() {
        let err = CoreConfig::builder()
            .database_path("/db")
            .max_connections(0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("max_connections"));

        let config = CoreConfig::builder()
            .database_path("/db")
            .min_connections(2)
            .max_connections(4)
            .build()
            .unwrap();
        assert_eq!(config.min_connections, 2);

        let mut config = config;
        config.min_connections = 9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_min_connections_above_in_memory_limit() {
        let err = CoreConfig::builder()
            .in_memory()
            .min_connections(3)
            .build()
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("min_connections (3) cannot exceed max_connections (1)"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = CoreConfig::builder()
            .database_path("/db")
            .acquire_timeout_secs(0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("acquire_timeout_secs"));
    }

    #[test]
    fn test_statement_cache_settings() {
        let disabled = CoreConfig::builder()
            .database_path("/db")
            .disable_statement_cache()
            .build()
            .unwrap();
        assert_eq!(disabled.statement_cache_capacity, None);
        assert!(!disabled.database_config().enable_cache);

        let err = CoreConfig::builder()
            .database_path("/db")
            .statement_cache_capacity(0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("disable_statement_cache"));
    }

    #[test]
    fn test_sql_flavor_parsing() {
        assert_eq!("SQLite".parse::<SqlFlavor>().unwrap(), SqlFlavor::Sqlite);
        assert_eq!("mysql".parse::<SqlFlavor>().unwrap(), SqlFlavor::Mysql);
        assert!("postgres".parse::<SqlFlavor>().is_err());
    }

    #[test]
    fn test_sql_flavor_serde_uses_lowercase_names() {
        assert_eq!(serde_json::to_string(&SqlFlavor::Mysql).unwrap(), "\"mysql\"");
        let flavor: SqlFlavor = serde_json::from_str("\"sqlite\"").unwrap();
        assert_eq!(flavor, SqlFlavor::Sqlite);
    }

    #[test]
    fn test_log_sql_propagates_to_logging() {
        let config = CoreConfig::builder()
            .in_memory()
            .log_sql(true)
            .logging(LoggingConfig::default())
            .build()
            .unwrap();
        assert!(config.logging.unwrap().sql_statements);
    }
}
