//! Core service façade and bootstrap helpers.
//!
//! This crate wires a validated [`CoreConfig`] into a running catalogue:
//! logging is initialized when the config carries a [`LoggingConfig`], the
//! database handle is opened (or supplied by the host), the catalogue tables
//! are created, and a [`CatalogStore`] rendering SQL in the configured flavor
//! is handed back inside [`CoreService`].
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/home/user/music/library.db")
//!     .build()?;
//! let core = core_service::bootstrap(config).await?;
//! let artist = core.catalog().add_artist("Nina Simone").await?;
//! ```

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::database::DatabaseHandle;
use core_library::adapters::SqliteHandle;
use core_library::{CatalogStore, Dialect, IdGenerator, MysqlDialect, SqliteDialect};
use core_runtime::config::{CoreConfig, DatabaseLocation, SqlFlavor};
use core_runtime::logging::{init_logging, strip_path, LoggingConfig};
use tracing::info;

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    config: Arc<CoreConfig>,
    handle: Arc<dyn DatabaseHandle>,
    catalog: Arc<CatalogStore>,
}

impl CoreService {
    /// Configuration the service was bootstrapped with.
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Handle every catalogue query runs against.
    pub fn handle(&self) -> Arc<dyn DatabaseHandle> {
        Arc::clone(&self.handle)
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    pub async fn health_check(&self) -> Result<()> {
        self.handle.health_check().await?;
        Ok(())
    }
}

/// Open the configured SQLite database and build the service around it.
///
/// # Errors
///
/// Fails on invalid configuration, a second logging initialization, an
/// unreachable database, or a MySQL flavor (no MySQL handle ships with the
/// core; supply one through [`bootstrap_with_handle`]).
pub async fn bootstrap(config: CoreConfig) -> Result<CoreService> {
    config.validate()?;

    if config.sql_flavor == SqlFlavor::Mysql {
        return Err(CoreError::CapabilityMissing {
            capability: "database.mysql".to_string(),
            message: "no built-in MySQL handle; pass one to bootstrap_with_handle".to_string(),
        });
    }

    start_logging(&config)?;

    let handle = SqliteHandle::new(config.database_config()).await?;
    info!(
        database = %describe_location(&config),
        max_connections = config.max_connections,
        "Opened catalogue database"
    );

    assemble(config, Arc::new(handle)).await
}

/// Build the service around a host-supplied database handle.
///
/// The handle must speak the SQL flavor named in `config`.
pub async fn bootstrap_with_handle(
    config: CoreConfig,
    handle: Arc<dyn DatabaseHandle>,
) -> Result<CoreService> {
    config.validate()?;
    start_logging(&config)?;

    info!(flavor = ?config.sql_flavor, "Using host database handle");

    assemble(config, handle).await
}

fn start_logging(config: &CoreConfig) -> Result<()> {
    if let Some(logging) = &config.logging {
        init_logging(logging.clone())?;
    }
    Ok(())
}

async fn assemble(config: CoreConfig, handle: Arc<dyn DatabaseHandle>) -> Result<CoreService> {
    handle
        .health_check()
        .await
        .map_err(|e| CoreError::InitializationFailed(format!("database unreachable: {}", e)))?;

    let catalog = CatalogStore::with_parts(
        Arc::clone(&handle),
        dialect_for(config.sql_flavor),
        IdGenerator::system(),
    );

    if config.create_schema {
        catalog.create_schema().await?;
        info!("Catalogue schema ready");
    }

    Ok(CoreService {
        config: Arc::new(config),
        handle,
        catalog: Arc::new(catalog),
    })
}

fn dialect_for(flavor: SqlFlavor) -> Arc<dyn Dialect> {
    match flavor {
        SqlFlavor::Sqlite => Arc::new(SqliteDialect),
        SqlFlavor::Mysql => Arc::new(MysqlDialect),
    }
}

fn describe_location(config: &CoreConfig) -> String {
    match &config.database {
        DatabaseLocation::InMemory => ":memory:".to_string(),
        DatabaseLocation::File(path) => {
            let path = path.to_string_lossy();
            match &config.logging {
                Some(logging) => logging.display_path(&path).to_string(),
                None if LoggingConfig::default().redact_pii => strip_path(&path).to_string(),
                None => path.into_owned(),
            }
        }
    }
}
