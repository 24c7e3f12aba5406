//! # Staged Query Builder
//!
//! A [`Query`] is an immutable value. Every transition borrows the current
//! query, copies its state, applies one change and returns a new `Query`, so a
//! partially built query can be shared and extended in several directions.
//!
//! ## Stages
//!
//! The builder tracks where it is in the clause sequence and rejects calls
//! that would produce malformed SQL:
//!
//! ```text
//! Rooted ──join──▶ Joining ──on──▶ JoinFiltered ──join──▶ Joining ...
//!   │                                  │
//!   └──where_──▶ WhereFiltered ◀──where_┘
//!
//! any stage except Joining ──select/order_by/limit/offset──▶ Shaping
//! ```
//!
//! `and`/`or` extend whichever predicate was set last (the latest join's `on`,
//! or the `where_`).
//!
//! ## Example
//!
//! ```ignore
//! let rows = Query::new(&tracks)
//!     .inner_join(&albums)?
//!     .on(Matcher::new().table("tracks", Matcher::new().field("album_id", albums.column("id")?)))?
//!     .where_(Matcher::new().table("albums", Matcher::new().field("title", "Blue")))?
//!     .order_by(tracks.column("track_number")?)?
//!     .fetch(&handle)
//!     .await?;
//! ```

mod mutation;
mod selection;
pub(crate) mod state;

pub use mutation::{Statement, Values};
pub use selection::{Direction, OrderKey, OrderTerm, Selection};
pub use state::{JoinKind, Stage};

use crate::dialect::{Dialect, SqliteDialect};
use crate::error::{LibraryError, Result};
use crate::filter::{Condition, Predicate};
use crate::pagination::PageRequest;
use crate::render::{self, Rendered};
use crate::schema::{ColumnDefinition, TableDefinition};
use state::{Join, QueryState};
use std::collections::HashSet;
use std::sync::Arc;

/// Persistent, staged SELECT/INSERT/UPDATE/DELETE builder
#[derive(Debug, Clone)]
pub struct Query {
    state: Arc<QueryState>,
}

const PRIOR_TO_JOIN: &str = "on/and/or used prior to join";

impl Query {
    /// Start a query over `table` using the SQLite dialect
    pub fn new(table: &TableDefinition) -> Self {
        Self::with_dialect(table, Arc::new(SqliteDialect))
    }

    pub fn with_dialect(table: &TableDefinition, dialect: Arc<dyn Dialect>) -> Self {
        Self {
            state: Arc::new(QueryState::new(table.clone(), dialect)),
        }
    }

    pub fn stage(&self) -> Stage {
        self.state.stage
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.state.dialect.as_ref()
    }

    pub(crate) fn state(&self) -> &QueryState {
        &self.state
    }

    fn transition(&self, apply: impl FnOnce(&mut QueryState) -> Result<()>) -> Result<Query> {
        let mut next = QueryState::clone(&self.state);
        apply(&mut next)?;
        Ok(Query {
            state: Arc::new(next),
        })
    }

    /// Error for `op` called in a stage that does not allow it
    fn illegal(&self, op: &str) -> LibraryError {
        let reason = match self.state.stage {
            Stage::Joining => "the pending join has no on yet",
            Stage::Shaping => "it must come before select, order_by, limit and offset",
            Stage::WhereFiltered => "it must come before where",
            Stage::JoinFiltered => "the query has joins",
            Stage::Rooted => "nothing precedes it",
        };
        LibraryError::misuse(format!("{op} is not allowed here: {reason}"))
    }

    fn ensure_not_joining(&self, op: &str) -> Result<()> {
        if self.state.stage == Stage::Joining {
            return Err(self.illegal(op));
        }
        Ok(())
    }

    // =========================================================================
    // Filtering
    // =========================================================================

    /// Filter rows; may be called once
    pub fn where_(&self, condition: impl Into<Condition>) -> Result<Query> {
        match self.state.stage {
            Stage::Rooted | Stage::JoinFiltered => {}
            Stage::WhereFiltered => return Err(LibraryError::misuse("where called multiple times")),
            _ => return Err(self.illegal("where_")),
        }
        let predicate = condition.into().resolve(&self.state.tables())?;
        self.transition(|state| {
            state.filter = predicate;
            state.stage = Stage::WhereFiltered;
            Ok(())
        })
    }

    /// Join condition for the join just added
    pub fn on(&self, condition: impl Into<Condition>) -> Result<Query> {
        match self.state.stage {
            Stage::Joining => {}
            Stage::Rooted => return Err(LibraryError::misuse(PRIOR_TO_JOIN)),
            _ => return Err(self.illegal("on")),
        }
        let predicate = condition
            .into()
            .resolve(&self.state.tables())?
            .unwrap_or(Predicate::Literal(true));
        self.transition(|state| {
            if let Some(join) = state.joins.last_mut() {
                join.on = Some(predicate);
            }
            state.stage = Stage::JoinFiltered;
            Ok(())
        })
    }

    /// AND another condition onto the latest `on` or `where_`
    pub fn and(&self, condition: impl Into<Condition>) -> Result<Query> {
        self.extend_predicate("and", condition.into(), Predicate::and)
    }

    /// OR another condition onto the latest `on` or `where_`
    pub fn or(&self, condition: impl Into<Condition>) -> Result<Query> {
        self.extend_predicate("or", condition.into(), Predicate::or)
    }

    fn extend_predicate(
        &self,
        op: &str,
        condition: Condition,
        combine: fn(Predicate, Predicate) -> Predicate,
    ) -> Result<Query> {
        match self.state.stage {
            Stage::JoinFiltered | Stage::WhereFiltered => {}
            Stage::Rooted | Stage::Joining => return Err(LibraryError::misuse(PRIOR_TO_JOIN)),
            Stage::Shaping => return Err(self.illegal(op)),
        }
        let Some(addition) = condition.resolve(&self.state.tables())? else {
            return Ok(self.clone());
        };
        self.transition(|state| {
            let slot = if state.stage == Stage::WhereFiltered {
                &mut state.filter
            } else {
                match state.joins.last_mut() {
                    Some(join) => &mut join.on,
                    None => return Err(LibraryError::misuse(PRIOR_TO_JOIN)),
                }
            };
            *slot = Some(match slot.take() {
                Some(existing) => combine(existing, addition),
                None => addition,
            });
            Ok(())
        })
    }

    // =========================================================================
    // Joins
    // =========================================================================

    pub fn inner_join(&self, table: &TableDefinition) -> Result<Query> {
        self.join(JoinKind::Inner, table)
    }

    /// Joined columns may be NULL; the table's nested object collapses to null
    pub fn left_join(&self, table: &TableDefinition) -> Result<Query> {
        self.join(JoinKind::Left, table)
    }

    /// Every table registered so far becomes optional
    pub fn right_join(&self, table: &TableDefinition) -> Result<Query> {
        self.join(JoinKind::Right, table)
    }

    fn join(&self, kind: JoinKind, table: &TableDefinition) -> Result<Query> {
        match self.state.stage {
            Stage::Rooted | Stage::JoinFiltered => {}
            _ => return Err(self.illegal("join")),
        }
        if table.alias() == self.state.primary.alias() {
            return Err(LibraryError::misuse(format!(
                "joined table has same alias as the primary table: {}",
                table.alias()
            )));
        }
        if self.state.joins.iter().any(|j| j.table.alias() == table.alias()) {
            return Err(LibraryError::misuse(format!(
                "joined table has same alias as an earlier join: {}",
                table.alias()
            )));
        }
        if table.columns().is_empty() {
            return Err(LibraryError::misuse(format!(
                "joined table has zero columns: {}",
                table.alias()
            )));
        }
        self.transition(|state| {
            state.joins.push(Join {
                kind,
                table: table.clone(),
                on: None,
            });
            state.stage = Stage::Joining;
            Ok(())
        })
    }

    // =========================================================================
    // Shaping
    // =========================================================================

    /// Replace the projection; resets ordering, limit and offset
    pub fn select(&self, selection: impl Into<Selection>) -> Result<Query> {
        self.ensure_not_joining("select")?;
        let selection = selection.into();
        self.validate_selection(&selection)?;
        self.transition(|state| {
            state.selection = Some(selection);
            state.order.clear();
            state.limit = None;
            state.offset = None;
            state.stage = Stage::Shaping;
            Ok(())
        })
    }

    fn validate_selection(&self, selection: &Selection) -> Result<()> {
        if let Selection::Nested(entries) = selection {
            if entries.is_empty() {
                return Err(LibraryError::misuse("selection has no columns"));
            }
            let mut seen = HashSet::new();
            for (key, child) in entries {
                if !seen.insert(key.as_str()) {
                    return Err(LibraryError::misuse(format!(
                        "selection key {key} appears more than once"
                    )));
                }
                self.validate_selection(child)?;
            }
            return Ok(());
        }
        for (_, column) in selection.leaves() {
            self.ensure_in_scope(column)?;
        }
        Ok(())
    }

    fn ensure_in_scope(&self, column: &ColumnDefinition) -> Result<()> {
        let known = self
            .state
            .table(&column.table_alias)
            .and_then(|t| t.find_column(&column.name))
            .is_some();
        if known {
            Ok(())
        } else {
            Err(LibraryError::misuse(format!(
                "column {}.{} is not in scope of this query",
                column.table_alias, column.name
            )))
        }
    }

    /// Start the ordering list
    pub fn order_by(&self, term: impl Into<OrderTerm>) -> Result<Query> {
        self.ensure_not_joining("order_by")?;
        let term = term.into();
        if let OrderKey::Column(column) = &term.key {
            self.ensure_in_scope(column)?;
        }
        self.transition(|state| {
            state.order = vec![term];
            state.stage = Stage::Shaping;
            Ok(())
        })
    }

    /// Append to the ordering list started by `order_by`
    pub fn then_by(&self, term: impl Into<OrderTerm>) -> Result<Query> {
        if self.state.order.is_empty() {
            return Err(LibraryError::misuse("then_by called before order_by"));
        }
        let term = term.into();
        if let OrderKey::Column(column) = &term.key {
            self.ensure_in_scope(column)?;
        }
        self.transition(|state| {
            state.order.push(term);
            Ok(())
        })
    }

    /// Overwrites any previous limit
    pub fn limit(&self, limit: u64) -> Result<Query> {
        self.ensure_not_joining("limit")?;
        self.transition(|state| {
            state.limit = Some(limit);
            state.stage = Stage::Shaping;
            Ok(())
        })
    }

    /// Overwrites any previous offset
    pub fn offset(&self, offset: u64) -> Result<Query> {
        self.ensure_not_joining("offset")?;
        self.transition(|state| {
            state.offset = Some(offset);
            state.stage = Stage::Shaping;
            Ok(())
        })
    }

    pub fn paginate(&self, request: PageRequest) -> Result<Query> {
        self.ensure_not_joining("paginate")?;
        self.transition(|state| {
            state.limit = Some(request.limit());
            state.offset = Some(request.offset());
            state.stage = Stage::Shaping;
            Ok(())
        })
    }

    // =========================================================================
    // Output
    // =========================================================================

    /// SQL text plus the mapper that rebuilds nested rows
    pub fn render(&self) -> Result<Rendered> {
        self.ensure_not_joining("render")?;
        render::select(&self.state)
    }

    /// Row-count query over the same tables, joins and filter
    pub fn render_count(&self) -> Result<String> {
        self.ensure_not_joining("count")?;
        render::count(&self.state)
    }

    /// Turn this query into a table usable in another query's FROM or JOIN
    ///
    /// The SQL is captured now; later changes to this query do not affect the
    /// returned table. The projection must be a flat mapping of columns.
    pub fn as_table(&self, alias: impl Into<String>) -> Result<TableDefinition> {
        self.ensure_not_joining("as_table")?;
        let selection = self.state.effective_selection();
        let flat = selection.as_flat().ok_or_else(|| {
            LibraryError::misuse("as_table requires a flat projection of columns")
        })?;
        let optional = self.state.optional_aliases();
        let columns = flat
            .into_iter()
            .map(|(key, column)| ColumnDefinition {
                name: key.to_string(),
                nullable: column.nullable || optional.contains(column.table_alias.as_str()),
                has_default: false,
                references: None,
                ..(**column).clone()
            })
            .collect();
        let sql = render::select(&self.state)?.sql;
        Ok(TableDefinition::from_subquery(alias, sql, columns))
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    pub fn insert(&self, row: Values) -> Result<Statement> {
        self.insert_many([row])
    }

    /// Multi-row insert; cells a row leaves out take the column default
    ///
    /// On SQLite, rows that assign different column sets become one `INSERT`
    /// per set.
    pub fn insert_many(&self, rows: impl IntoIterator<Item = Values>) -> Result<Statement> {
        if self.state.stage != Stage::Rooted {
            return Err(self.illegal("insert"));
        }
        self.ensure_real_origin("insert")?;
        let rows: Vec<Values> = rows.into_iter().collect();
        if rows.is_empty() {
            return Err(LibraryError::misuse("insert requires at least one row"));
        }
        for row in &rows {
            for (column, _) in row.iter() {
                if self.state.primary.find_column(column).is_none() {
                    return Err(LibraryError::misuse(format!(
                        "column {} does not exist in table {}",
                        column,
                        self.state.primary.alias()
                    )));
                }
            }
        }
        render::insert(&self.state, &rows).map(Statement::batch)
    }

    /// `UPDATE ... SET ...` restricted by the current `where_`
    pub fn update(&self, values: Values) -> Result<Statement> {
        self.ensure_single_table_mutation("update")?;
        if values.is_empty() {
            return Err(LibraryError::misuse("update requires at least one value"));
        }
        render::update(&self.state, &values).map(Statement::new)
    }

    /// `DELETE` restricted by the current `where_`; without one every row goes
    pub fn delete(&self) -> Result<Statement> {
        self.ensure_single_table_mutation("delete")?;
        render::delete(&self.state).map(Statement::new)
    }

    pub fn truncate(&self) -> Result<Statement> {
        if self.state.stage != Stage::Rooted {
            return Err(self.illegal("truncate"));
        }
        self.ensure_real_origin("truncate")?;
        Ok(Statement::new(render::truncate(&self.state)))
    }

    fn ensure_real_origin(&self, op: &str) -> Result<()> {
        if self.state.primary.origin().is_subquery() {
            return Err(LibraryError::misuse(format!(
                "cannot {op} into subquery table {}",
                self.state.primary.alias()
            )));
        }
        Ok(())
    }

    fn ensure_single_table_mutation(&self, op: &str) -> Result<()> {
        match self.state.stage {
            Stage::Rooted | Stage::WhereFiltered | Stage::JoinFiltered => {}
            _ => return Err(self.illegal(op)),
        }
        if !self.state.joins.is_empty() {
            return Err(LibraryError::Todo(format!("{op} over joined tables")));
        }
        self.ensure_real_origin(op)
    }
}
