//! Placeholder handle for hosts without a database.

use async_trait::async_trait;
use bridge_traits::database::{DatabaseHandle, ExecuteResult, QueryRow, Transaction};
use bridge_traits::error::{BridgeError, Result};

/// Handle whose every operation fails with [`BridgeError::NotAvailable`]
#[derive(Debug, Clone, Default)]
pub struct StubHandle;

fn unavailable<T>(operation: &str) -> Result<T> {
    Err(BridgeError::NotAvailable(format!(
        "{operation}: no database handle configured"
    )))
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl DatabaseHandle for StubHandle {
    async fn execute(&self, _sql: &str) -> Result<ExecuteResult> {
        unavailable("execute")
    }

    async fn query(&self, _sql: &str) -> Result<Vec<QueryRow>> {
        unavailable("query")
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        unavailable("begin")
    }

    async fn health_check(&self) -> Result<()> {
        unavailable("health_check")
    }
}
