//! Database handle implementations
//!
//! Concrete [`DatabaseHandle`](bridge_traits::database::DatabaseHandle)s the
//! host can hand to the query core.

#[cfg(not(target_arch = "wasm32"))]
pub mod sqlite_native;
pub mod stub;

#[cfg(not(target_arch = "wasm32"))]
pub use sqlite_native::{SqliteHandle, SqliteTransaction};
pub use stub::StubHandle;
