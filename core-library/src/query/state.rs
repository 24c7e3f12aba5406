use super::selection::{OrderTerm, Selection};
use crate::dialect::Dialect;
use crate::filter::Predicate;
use crate::schema::TableDefinition;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Position of a query in its build sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Only a table has been chosen
    Rooted,
    /// A join was added and is waiting for its `on`
    Joining,
    /// The most recent join has its `on`
    JoinFiltered,
    /// `where_` has been applied
    WhereFiltered,
    /// Projection, ordering, or pagination has been applied
    Shaping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

impl JoinKind {
    pub(crate) fn as_sql(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Join {
    pub kind: JoinKind,
    pub table: TableDefinition,
    pub on: Option<Predicate>,
}

#[derive(Clone)]
pub(crate) struct QueryState {
    pub dialect: Arc<dyn Dialect>,
    pub primary: TableDefinition,
    pub joins: Vec<Join>,
    pub filter: Option<Predicate>,
    pub order: Vec<OrderTerm>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub selection: Option<Selection>,
    pub stage: Stage,
}

impl fmt::Debug for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryState")
            .field("dialect", &self.dialect.name())
            .field("primary", &self.primary.alias())
            .field("joins", &self.joins.len())
            .field("stage", &self.stage)
            .finish()
    }
}

impl QueryState {
    pub fn new(primary: TableDefinition, dialect: Arc<dyn Dialect>) -> Self {
        Self {
            dialect,
            primary,
            joins: Vec::new(),
            filter: None,
            order: Vec::new(),
            limit: None,
            offset: None,
            selection: None,
            stage: Stage::Rooted,
        }
    }

    /// Every table in scope, primary first, then joins in registration order
    pub fn tables(&self) -> Vec<&TableDefinition> {
        std::iter::once(&self.primary)
            .chain(self.joins.iter().map(|j| &j.table))
            .collect()
    }

    pub fn table(&self, alias: &str) -> Option<&TableDefinition> {
        self.tables().into_iter().find(|t| t.alias() == alias)
    }

    /// Aliases whose columns may come back NULL because of an outer join
    ///
    /// A left join makes the joined table optional; a right join makes every
    /// table registered before it optional.
    pub fn optional_aliases(&self) -> HashSet<&str> {
        let mut optional = HashSet::new();
        for (position, join) in self.joins.iter().enumerate() {
            match join.kind {
                JoinKind::Inner => {}
                JoinKind::Left => {
                    optional.insert(join.table.alias());
                }
                JoinKind::Right => {
                    optional.insert(self.primary.alias());
                    for earlier in &self.joins[..position] {
                        optional.insert(earlier.table.alias());
                    }
                }
            }
        }
        optional
    }

    /// The explicit projection, or the default one
    ///
    /// Without joins the default is a flat mapping of the primary table's
    /// columns; with joins, one nested mapping per table keyed by alias.
    pub fn effective_selection(&self) -> Selection {
        if let Some(selection) = &self.selection {
            return selection.clone();
        }
        if self.joins.is_empty() {
            Selection::table(&self.primary)
        } else {
            Selection::Nested(
                self.tables()
                    .into_iter()
                    .map(|t| (t.alias().to_string(), Selection::table(t)))
                    .collect(),
            )
        }
    }
}
