//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the catalogue core:
//! - Logging and tracing infrastructure
//! - Configuration management and validation
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the service layer depends
//! on. It establishes the logging conventions (including whether rendered SQL
//! reaches the logs) and the connection settings handed to the database
//! adapter.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder, DatabaseLocation, SqlFlavor};
pub use error::{Error, Result};
pub use logging::{init_logging, LogFormat, LoggingConfig};
