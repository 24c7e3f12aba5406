//! # Execution Façade
//!
//! Runs rendered queries and statements against a [`DatabaseHandle`] and
//! materializes the rows. This is the only part of the query core that
//! awaits; building and rendering are synchronous.
//!
//! Handle failures surface unchanged as [`LibraryError::Bridge`]. Nothing here
//! retries.

use crate::error::{LibraryError, Result};
use crate::query::{Query, Statement};
use crate::record::Record;
use bridge_traits::database::{DatabaseHandle, ExecuteResult, QueryValue};
use bridge_traits::error::BridgeError;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

impl Query {
    /// Run the query and materialize every row
    pub async fn fetch(&self, handle: &dyn DatabaseHandle) -> Result<Vec<Record>> {
        let rendered = self.render()?;
        debug!(sql = %rendered.sql, "Fetching rows");
        let rows = handle.query(&rendered.sql).await?;
        debug!(rows = rows.len(), "Fetched rows");
        rendered.mapper.map_rows(rows)
    }

    /// Run the query and require exactly one row
    pub async fn fetch_one(&self, handle: &dyn DatabaseHandle) -> Result<Record> {
        let mut records = self.fetch(handle).await?;
        if records.len() != 1 {
            return Err(LibraryError::Cardinality {
                expected: 1,
                actual: records.len(),
            });
        }
        Ok(records.remove(0))
    }

    pub async fn fetch_as<T: DeserializeOwned>(&self, handle: &dyn DatabaseHandle) -> Result<Vec<T>> {
        self.fetch(handle)
            .await?
            .iter()
            .map(|record| record.deserialize())
            .collect()
    }

    pub async fn fetch_one_as<T: DeserializeOwned>(&self, handle: &dyn DatabaseHandle) -> Result<T> {
        self.fetch_one(handle).await?.deserialize()
    }

    /// Number of rows the query's tables, joins and filter produce
    ///
    /// Projection, ordering and pagination are ignored.
    pub async fn count(&self, handle: &dyn DatabaseHandle) -> Result<u64> {
        let sql = self.render_count()?;
        debug!(sql = %sql, "Counting rows");
        let rows = handle.query(&sql).await?;
        match rows.first().and_then(|row| row.first()) {
            Some(QueryValue::Integer(n)) if *n >= 0 => Ok(*n as u64),
            other => Err(LibraryError::Decode(format!(
                "count query returned {other:?}"
            ))),
        }
    }
}

impl Statement {
    /// Run the statement
    ///
    /// A batch runs in its own transaction. When `handle` cannot begin one
    /// (it already is a transaction, or has no transaction support) the batch
    /// runs on it directly. Row counts are summed; `last_insert_id` comes from
    /// the last statement.
    pub async fn execute(&self, handle: &dyn DatabaseHandle) -> Result<ExecuteResult> {
        let batch = self.statements();
        if batch.len() < 2 {
            return run_batch(handle, batch).await;
        }

        let transaction = match handle.begin().await {
            Ok(transaction) => transaction,
            Err(BridgeError::NotAvailable(reason)) => {
                debug!(reason = %reason, "Running batch on the given handle");
                return run_batch(handle, batch).await;
            }
            Err(error) => return Err(error.into()),
        };

        match run_batch(transaction.as_handle(), batch).await {
            Ok(result) => {
                transaction.commit().await?;
                Ok(result)
            }
            Err(error) => {
                if let Err(rollback_error) = transaction.rollback().await {
                    warn!(
                        error = %error,
                        rollback_error = %rollback_error,
                        "Rollback of statement batch failed"
                    );
                    return Err(rollback_error.into());
                }
                Err(error)
            }
        }
    }
}

async fn run_batch(handle: &dyn DatabaseHandle, batch: &[String]) -> Result<ExecuteResult> {
    let mut total = ExecuteResult::default();
    for sql in batch {
        debug!(sql = %sql, "Executing statement");
        let result = handle.execute(sql).await?;
        total.rows_affected += result.rows_affected;
        total.last_insert_id = result.last_insert_id;
    }
    debug!(rows_affected = total.rows_affected, "Statement executed");
    Ok(total)
}

/// Run `body` inside a transaction
///
/// Commits when `body` succeeds. When it fails the transaction is rolled back
/// and the body's error returned; if the rollback itself fails, that error is
/// returned instead and the body's error is only logged.
///
/// ```ignore
/// let id = in_transaction(&handle, |tx| {
///     Box::pin(async move {
///         albums.insert(row).execute(tx).await?;
///         tracks.insert_many(rows).execute(tx).await?;
///         Ok(album_id)
///     })
/// })
/// .await?;
/// ```
pub async fn in_transaction<T, F>(handle: &dyn DatabaseHandle, body: F) -> Result<T>
where
    T: Send,
    F: for<'t> FnOnce(&'t dyn DatabaseHandle) -> BoxFuture<'t, Result<T>> + Send,
{
    let transaction = handle.begin().await?;
    debug!("Transaction started");

    let outcome = body(transaction.as_handle()).await;

    match outcome {
        Ok(value) => {
            transaction.commit().await?;
            debug!("Transaction committed");
            Ok(value)
        }
        Err(error) => match transaction.rollback().await {
            Ok(()) => {
                debug!(error = %error, "Transaction rolled back");
                Err(error)
            }
            Err(rollback_error) => {
                warn!(
                    error = %error,
                    rollback_error = %rollback_error,
                    "Rollback failed; original error discarded"
                );
                Err(rollback_error.into())
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Matcher;
    use crate::query::Values;
    use crate::schema::{number, string, table, TableDefinition};
    use crate::value::Value;
    use async_trait::async_trait;
    use bridge_traits::database::{QueryRow, Transaction};
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use mockall::mock;
    use mockall::predicate::eq;
    use serde::Deserialize;
    use std::sync::{Arc, Mutex};

    mock! {
        pub Handle {}

        #[async_trait]
        impl DatabaseHandle for Handle {
            async fn execute(&self, sql: &str) -> BridgeResult<ExecuteResult>;
            async fn query(&self, sql: &str) -> BridgeResult<Vec<QueryRow>>;
            async fn begin(&self) -> BridgeResult<Box<dyn Transaction>>;
        }
    }

    fn foo() -> TableDefinition {
        table("foo", [("col1", string()), ("col2", number())])
    }

    const SELECT_FOO: &str =
        "SELECT `foo`.`col1` AS `col1`, `foo`.`col2` AS `col2` FROM `foo` AS `foo`";

    fn foo_row(col1: &str, col2: i64) -> QueryRow {
        vec![QueryValue::Text(col1.into()), QueryValue::Integer(col2)]
    }

    #[tokio::test]
    async fn test_fetch_maps_rows() {
        let mut handle = MockHandle::new();
        handle
            .expect_query()
            .with(eq(SELECT_FOO))
            .times(1)
            .returning(|_| Ok(vec![foo_row("a", 1), foo_row("b", 2)]));

        let records = Query::new(&foo()).fetch(&handle).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[1].get("col1").unwrap().as_value(),
            Some(&Value::from("b"))
        );
    }

    #[tokio::test]
    async fn test_fetch_one_requires_exactly_one_row() {
        let mut handle = MockHandle::new();
        handle.expect_query().returning(|_| Ok(vec![]));
        let err = Query::new(&foo()).fetch_one(&handle).await.unwrap_err();
        assert!(matches!(
            err,
            LibraryError::Cardinality {
                expected: 1,
                actual: 0
            }
        ));

        let mut handle = MockHandle::new();
        handle
            .expect_query()
            .returning(|_| Ok(vec![foo_row("a", 1), foo_row("b", 2)]));
        let err = Query::new(&foo()).fetch_one(&handle).await.unwrap_err();
        assert!(matches!(err, LibraryError::Cardinality { actual: 2, .. }));
    }

    #[tokio::test]
    async fn test_fetch_as_typed_rows() {
        #[derive(Deserialize, Debug, PartialEq)]
        struct Foo {
            col1: String,
            col2: i64,
        }

        let mut handle = MockHandle::new();
        handle
            .expect_query()
            .returning(|_| Ok(vec![foo_row("a", 1)]));

        let row: Foo = Query::new(&foo()).fetch_one_as(&handle).await.unwrap();
        assert_eq!(
            row,
            Foo {
                col1: "a".into(),
                col2: 1
            }
        );
    }

    #[tokio::test]
    async fn test_handle_errors_propagate_unchanged() {
        let mut handle = MockHandle::new();
        handle
            .expect_query()
            .times(1)
            .returning(|_| Err(BridgeError::DatabaseError("disk I/O error".into())));

        let err = Query::new(&foo()).fetch(&handle).await.unwrap_err();
        assert!(matches!(
            err,
            LibraryError::Bridge(BridgeError::DatabaseError(msg)) if msg == "disk I/O error"
        ));
    }

    #[tokio::test]
    async fn test_count() {
        let mut handle = MockHandle::new();
        handle
            .expect_query()
            .with(eq("SELECT COUNT(*) FROM `foo` AS `foo` WHERE `foo`.`col2` = 3"))
            .returning(|_| Ok(vec![vec![QueryValue::Integer(17)]]));

        let q = Query::new(&foo())
            .where_(Matcher::new().field("col2", 3))
            .unwrap();
        assert_eq!(q.count(&handle).await.unwrap(), 17);
    }

    #[tokio::test]
    async fn test_statement_execute() {
        let mut handle = MockHandle::new();
        handle
            .expect_execute()
            .with(eq("INSERT INTO `foo` (`col1`, `col2`) VALUES ('a', 42)"))
            .times(1)
            .returning(|_| {
                Ok(ExecuteResult {
                    rows_affected: 1,
                    last_insert_id: Some(1),
                })
            });

        let statement = Query::new(&foo())
            .insert(Values::new().set("col1", "a").set("col2", 42))
            .unwrap();
        let result = statement.execute(&handle).await.unwrap();
        assert_eq!(result.rows_affected, 1);
    }

    fn mixed_rows() -> Statement {
        Query::new(&foo())
            .insert_many([
                Values::new().set("col1", "a"),
                Values::new().set("col1", "b").set("col2", 2),
            ])
            .unwrap()
    }

    #[tokio::test]
    async fn test_batch_runs_directly_without_transaction_support() {
        let mut handle = MockHandle::new();
        handle
            .expect_begin()
            .times(1)
            .returning(|| Err(BridgeError::NotAvailable("transactions".into())));
        handle
            .expect_execute()
            .with(eq("INSERT INTO `foo` (`col1`) VALUES ('a')"))
            .times(1)
            .returning(|_| {
                Ok(ExecuteResult {
                    rows_affected: 1,
                    last_insert_id: Some(1),
                })
            });
        handle
            .expect_execute()
            .with(eq("INSERT INTO `foo` (`col1`, `col2`) VALUES ('b', 2)"))
            .times(1)
            .returning(|_| {
                Ok(ExecuteResult {
                    rows_affected: 1,
                    last_insert_id: Some(2),
                })
            });

        let result = mixed_rows().execute(&handle).await.unwrap();
        assert_eq!(result.rows_affected, 2);
        assert_eq!(result.last_insert_id, Some(2));
    }

    /// Records every statement and the transaction lifecycle
    #[derive(Clone, Default)]
    struct Journal {
        entries: Arc<Mutex<Vec<String>>>,
        fail_rollback: bool,
    }

    impl Journal {
        fn push(&self, entry: impl Into<String>) {
            self.entries.lock().unwrap().push(entry.into());
        }

        fn entries(&self) -> Vec<String> {
            self.entries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DatabaseHandle for Journal {
        async fn execute(&self, sql: &str) -> BridgeResult<ExecuteResult> {
            self.push(sql);
            Ok(ExecuteResult::default())
        }

        async fn query(&self, sql: &str) -> BridgeResult<Vec<QueryRow>> {
            self.push(sql);
            Ok(vec![])
        }

        async fn begin(&self) -> BridgeResult<Box<dyn Transaction>> {
            self.push("BEGIN");
            Ok(Box::new(self.clone()))
        }
    }

    #[async_trait]
    impl Transaction for Journal {
        async fn commit(self: Box<Self>) -> BridgeResult<()> {
            self.push("COMMIT");
            Ok(())
        }

        async fn rollback(self: Box<Self>) -> BridgeResult<()> {
            self.push("ROLLBACK");
            if self.fail_rollback {
                return Err(BridgeError::TransactionClosed);
            }
            Ok(())
        }

        fn as_handle(&self) -> &dyn DatabaseHandle {
            self
        }
    }

    #[tokio::test]
    async fn test_transaction_commits_on_success() {
        let journal = Journal::default();
        let statement = Query::new(&foo()).delete().unwrap();

        let value = in_transaction(&journal, |tx| {
            Box::pin(async move {
                statement.execute(tx).await?;
                Ok(7)
            })
        })
        .await
        .unwrap();

        assert_eq!(value, 7);
        assert_eq!(
            journal.entries(),
            vec!["BEGIN", "DELETE FROM `foo`", "COMMIT"]
        );
    }

    #[tokio::test]
    async fn test_batch_runs_in_its_own_transaction() {
        let journal = Journal::default();
        mixed_rows().execute(&journal).await.unwrap();
        assert_eq!(
            journal.entries(),
            vec![
                "BEGIN",
                "INSERT INTO `foo` (`col1`) VALUES ('a')",
                "INSERT INTO `foo` (`col1`, `col2`) VALUES ('b', 2)",
                "COMMIT",
            ]
        );
    }

    #[tokio::test]
    async fn test_transaction_rolls_back_and_returns_body_error() {
        let journal = Journal::default();

        let err = in_transaction(&journal, |_tx| {
            Box::pin(async move { Err::<(), _>(LibraryError::misuse("boom")) })
        })
        .await
        .unwrap_err();

        assert!(matches!(err, LibraryError::DslMisuse(msg) if msg == "boom"));
        assert_eq!(journal.entries(), vec!["BEGIN", "ROLLBACK"]);
    }

    #[tokio::test]
    async fn test_rollback_failure_masks_body_error() {
        let journal = Journal {
            fail_rollback: true,
            ..Journal::default()
        };

        let err = in_transaction(&journal, |_tx| {
            Box::pin(async move { Err::<(), _>(LibraryError::misuse("boom")) })
        })
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            LibraryError::Bridge(BridgeError::TransactionClosed)
        ));
    }
}
