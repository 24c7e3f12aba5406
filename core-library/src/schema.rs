//! Table and column declarations.
//!
//! A [`TableDefinition`] names where rows come from (a real table path or a
//! rendered subquery), the alias the table is known by inside a query, and its
//! ordered columns. Column references are shared (`Arc`) so filters and
//! projections can hold them cheaply.
//!
//! ```ignore
//! use core_library::schema::{table, string, number};
//!
//! let tracks = table("music.tracks", [
//!     ("title", string()),
//!     ("duration_ms", number().or_null()),
//! ]);
//! assert_eq!(tracks.alias(), "tracks");
//! ```

use crate::dialect::Dialect;
use crate::error::{LibraryError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Storage class of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    String,
    Number,
    Boolean,
    Binary,
}

/// Where a table's rows come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableOrigin {
    /// Dotted name path, e.g. `["music", "tracks"]`
    Real(Vec<String>),
    /// Rendered SQL of a previous query, captured when it was turned into a table
    Subquery(Arc<str>),
}

impl TableOrigin {
    /// SQL for the FROM/JOIN position
    pub fn render(&self, dialect: &dyn Dialect) -> String {
        match self {
            TableOrigin::Real(path) => path
                .iter()
                .map(|segment| dialect.escape_identifier(segment))
                .collect::<Vec<_>>()
                .join("."),
            TableOrigin::Subquery(sql) => format!("({sql})"),
        }
    }

    pub fn is_subquery(&self) -> bool {
        matches!(self, TableOrigin::Subquery(_))
    }

    fn last_segment(&self) -> Option<&str> {
        match self {
            TableOrigin::Real(path) => path.last().map(String::as_str),
            TableOrigin::Subquery(_) => None,
        }
    }
}

/// Target of a foreign key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub table: String,
    pub column: String,
}

/// A column as seen through one table alias
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub origin: TableOrigin,
    pub table_alias: String,
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub has_default: bool,
    pub references: Option<ForeignKey>,
}

/// Shared handle to a column definition
pub type ColumnRef = Arc<ColumnDefinition>;

impl ColumnDefinition {
    /// `alias`.`column`
    pub fn render(&self, dialect: &dyn Dialect) -> String {
        format!(
            "{}.{}",
            dialect.escape_identifier(&self.table_alias),
            dialect.escape_identifier(&self.name)
        )
    }
}

/// Column declaration used with [`table`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    column_type: ColumnType,
    nullable: bool,
    has_default: bool,
    references: Option<ForeignKey>,
}

impl ColumnSpec {
    fn new(column_type: ColumnType) -> Self {
        Self {
            column_type,
            nullable: false,
            has_default: false,
            references: None,
        }
    }

    pub fn or_null(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// The database fills the column when an insert omits it
    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.references = Some(ForeignKey {
            table: table.into(),
            column: column.into(),
        });
        self
    }
}

pub fn string() -> ColumnSpec {
    ColumnSpec::new(ColumnType::String)
}

pub fn number() -> ColumnSpec {
    ColumnSpec::new(ColumnType::Number)
}

pub fn boolean() -> ColumnSpec {
    ColumnSpec::new(ColumnType::Boolean)
}

pub fn binary() -> ColumnSpec {
    ColumnSpec::new(ColumnType::Binary)
}

/// A table as seen through one alias
#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    alias: String,
    origin: TableOrigin,
    columns: Vec<ColumnRef>,
}

/// Declare a table; `name` may be dotted and the alias defaults to its last segment
pub fn table<I, S>(name: &str, columns: I) -> TableDefinition
where
    I: IntoIterator<Item = (S, ColumnSpec)>,
    S: Into<String>,
{
    let path: Vec<String> = name.split('.').map(str::to_string).collect();
    let origin = TableOrigin::Real(path);
    let alias = origin.last_segment().unwrap_or(name).to_string();

    let columns = columns
        .into_iter()
        .map(|(column_name, declared)| {
            Arc::new(ColumnDefinition {
                origin: origin.clone(),
                table_alias: alias.clone(),
                name: column_name.into(),
                column_type: declared.column_type,
                nullable: declared.nullable,
                has_default: declared.has_default,
                references: declared.references,
            })
        })
        .collect();

    TableDefinition {
        alias,
        origin,
        columns,
    }
}

impl TableDefinition {
    /// Table over a rendered subquery; columns are re-homed onto the new alias
    pub(crate) fn from_subquery(
        alias: impl Into<String>,
        sql: impl Into<Arc<str>>,
        columns: Vec<ColumnDefinition>,
    ) -> Self {
        let alias = alias.into();
        let origin = TableOrigin::Subquery(sql.into());
        let columns = columns
            .into_iter()
            .map(|column| {
                Arc::new(ColumnDefinition {
                    origin: origin.clone(),
                    table_alias: alias.clone(),
                    ..column
                })
            })
            .collect();
        Self {
            alias,
            origin,
            columns,
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn origin(&self) -> &TableOrigin {
        &self.origin
    }

    pub fn columns(&self) -> &[ColumnRef] {
        &self.columns
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Result<ColumnRef> {
        self.find_column(name).cloned().ok_or_else(|| {
            LibraryError::misuse(format!(
                "table {} has no column named {}",
                self.alias, name
            ))
        })
    }

    pub(crate) fn find_column(&self, name: &str) -> Option<&ColumnRef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Same table under another alias; columns follow the new alias
    pub fn with_alias(&self, alias: impl Into<String>) -> TableDefinition {
        let alias = alias.into();
        let columns = self
            .columns
            .iter()
            .map(|c| {
                Arc::new(ColumnDefinition {
                    table_alias: alias.clone(),
                    ..(**c).clone()
                })
            })
            .collect();
        TableDefinition {
            alias,
            origin: self.origin.clone(),
            columns,
        }
    }

    /// `origin AS alias`
    pub(crate) fn render_source(&self, dialect: &dyn Dialect) -> String {
        format!(
            "{} AS {}",
            self.origin.render(dialect),
            dialect.escape_identifier(&self.alias)
        )
    }
}
