//! # Host Bridge Traits
//!
//! Platform abstraction traits the catalogue core consumes but never
//! implements for itself.
//!
//! ## Overview
//!
//! This crate defines the contract between the query core and whatever owns
//! the actual database connection. The core renders SQL text and materializes
//! rows; connection management, transactions, and driver quirks live behind
//! [`DatabaseHandle`](database::DatabaseHandle).
//!
//! ## Traits
//!
//! ### Storage
//! - [`DatabaseHandle`](database::DatabaseHandle) - Execute statements, run queries, open transactions
//! - [`Transaction`](database::Transaction) - A handle pinned to one open transaction
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing (identifier generation)
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Driver
//! implementations should:
//!
//! - Convert driver-specific errors to `BridgeError`
//! - Include the failing statement or operation in the message
//!
//! ## Thread Safety
//!
//! Bridge traits require `Send + Sync` on native targets (see
//! [`platform::PlatformSendSync`]) so handles can be shared across async tasks.
//!
//! ## Examples
//!
//! ```ignore
//! use bridge_traits::database::{DatabaseHandle, ExecuteResult, QueryRow};
//! use bridge_traits::error::Result;
//!
//! struct LoggingHandle<H> { inner: H }
//!
//! #[async_trait::async_trait]
//! impl<H: DatabaseHandle> DatabaseHandle for LoggingHandle<H> {
//!     async fn execute(&self, sql: &str) -> Result<ExecuteResult> {
//!         println!("{sql}");
//!         self.inner.execute(sql).await
//!     }
//!     // ...
//! }
//! ```

pub mod database;
pub mod error;
pub mod platform;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use database::{
    DatabaseConfig, DatabaseHandle, ExecuteResult, QueryRow, QueryValue, Transaction,
};
pub use time::{Clock, ConsoleLogger, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
