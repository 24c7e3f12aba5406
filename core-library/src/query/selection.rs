//! Projection and ordering terms.

use crate::dialect::Dialect;
use crate::schema::{ColumnRef, TableDefinition};

/// What a query returns for each row
///
/// A bare [`Selection::Column`] yields scalar rows. [`Selection::Nested`]
/// yields objects whose leaves are columns, nested to any depth.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Column(ColumnRef),
    Nested(Vec<(String, Selection)>),
}

impl Selection {
    /// Every column of a table, keyed by column name
    pub fn table(table: &TableDefinition) -> Selection {
        Selection::Nested(
            table
                .columns()
                .iter()
                .map(|c| (c.name.clone(), Selection::Column(c.clone())))
                .collect(),
        )
    }

    pub fn nested<I, K>(entries: I) -> Selection
    where
        I: IntoIterator<Item = (K, Selection)>,
        K: Into<String>,
    {
        Selection::Nested(
            entries
                .into_iter()
                .map(|(key, selection)| (key.into(), selection))
                .collect(),
        )
    }

    /// Leaves in depth-first insertion order, each with its key path
    pub(crate) fn leaves(&self) -> Vec<(Vec<&str>, &ColumnRef)> {
        let mut out = Vec::new();
        self.collect_leaves(&mut Vec::new(), &mut out);
        out
    }

    fn collect_leaves<'a>(
        &'a self,
        path: &mut Vec<&'a str>,
        out: &mut Vec<(Vec<&'a str>, &'a ColumnRef)>,
    ) {
        match self {
            Selection::Column(column) => out.push((path.clone(), column)),
            Selection::Nested(entries) => {
                for (key, child) in entries {
                    path.push(key);
                    child.collect_leaves(path, out);
                    path.pop();
                }
            }
        }
    }

    /// Flat mapping of keys to columns, if that is what this is
    pub(crate) fn as_flat(&self) -> Option<Vec<(&str, &ColumnRef)>> {
        match self {
            Selection::Column(_) => None,
            Selection::Nested(entries) => entries
                .iter()
                .map(|(key, child)| match child {
                    Selection::Column(column) => Some((key.as_str(), column)),
                    Selection::Nested(_) => None,
                })
                .collect(),
        }
    }
}

impl From<ColumnRef> for Selection {
    fn from(column: ColumnRef) -> Self {
        Selection::Column(column)
    }
}

impl From<&ColumnRef> for Selection {
    fn from(column: &ColumnRef) -> Self {
        Selection::Column(column.clone())
    }
}

impl From<&TableDefinition> for Selection {
    fn from(table: &TableDefinition) -> Self {
        Selection::table(table)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderKey {
    Column(ColumnRef),
    /// A projection key, rendered as a bare identifier
    Alias(String),
}

/// One `ORDER BY` term
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTerm {
    pub key: OrderKey,
    pub direction: Option<Direction>,
}

impl OrderTerm {
    pub fn asc(self) -> Self {
        Self {
            direction: Some(Direction::Asc),
            ..self
        }
    }

    pub fn desc(self) -> Self {
        Self {
            direction: Some(Direction::Desc),
            ..self
        }
    }

    pub(crate) fn render(&self, dialect: &dyn Dialect) -> String {
        let key = match &self.key {
            OrderKey::Column(column) => column.render(dialect),
            OrderKey::Alias(name) => dialect.escape_identifier(name),
        };
        match self.direction {
            None => key,
            Some(Direction::Asc) => format!("{key} ASC"),
            Some(Direction::Desc) => format!("{key} DESC"),
        }
    }
}

impl From<ColumnRef> for OrderTerm {
    fn from(column: ColumnRef) -> Self {
        Self {
            key: OrderKey::Column(column),
            direction: None,
        }
    }
}

impl From<&ColumnRef> for OrderTerm {
    fn from(column: &ColumnRef) -> Self {
        column.clone().into()
    }
}

impl From<&str> for OrderTerm {
    fn from(name: &str) -> Self {
        Self {
            key: OrderKey::Alias(name.to_string()),
            direction: None,
        }
    }
}

impl<K: Into<OrderTerm>> From<(K, Direction)> for OrderTerm {
    fn from((key, direction): (K, Direction)) -> Self {
        Self {
            direction: Some(direction),
            ..key.into()
        }
    }
}
