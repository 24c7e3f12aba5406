//! Workspace placeholder crate.
//!
//! Exposes feature flags that map to the individual workspace crates so host
//! applications can depend on `mpc-catalog-workspace` without wiring each crate
//! by hand. `service` pulls in the bootstrap façade (`core-service`), while
//! `query-core` exposes only the query builder and identifier generator.

#[cfg(feature = "service")]
pub use core_service as service;

#[cfg(feature = "query-core")]
pub use core_library as library;
