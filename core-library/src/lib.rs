//! # Library Query Core
//!
//! Builds, renders and runs SQL for the music library without an ORM.
//!
//! ## Overview
//!
//! This crate provides:
//! - Time-ordered 128-bit identifiers ([`id`])
//! - SQL dialects for SQLite and MySQL ([`dialect`])
//! - Table/column declarations ([`schema`]) and filters ([`filter`])
//! - A persistent, staged query builder ([`query`]) rendered to SQL text
//!   ([`render`]) with nested row materialization ([`record`])
//! - An execution façade over any
//!   [`DatabaseHandle`](bridge_traits::database::DatabaseHandle) ([`exec`])
//! - A sqlx-backed SQLite handle ([`adapters`]) and the music catalogue built
//!   on top of all of it ([`catalog`])

pub mod adapters;
pub mod catalog;
pub mod dialect;
pub mod error;
pub mod exec;
pub mod filter;
pub mod id;
pub mod pagination;
pub mod query;
pub mod record;
pub mod render;
pub mod schema;
pub mod value;

pub use catalog::{CatalogStore, CatalogTables};
pub use dialect::{Dialect, MysqlDialect, SqliteDialect};
pub use error::{LibraryError, Result};
pub use exec::in_transaction;
pub use filter::{Condition, Expression, Matcher, Operator, Predicate};
pub use id::{IdGenerator, Identifier};
pub use pagination::{Page, PageRequest};
pub use query::{Direction, JoinKind, Query, Selection, Stage, Statement, Values};
pub use record::{Record, RowMapper};
pub use render::Rendered;
pub use schema::{
    binary, boolean, number, string, table, ColumnDefinition, ColumnRef, ColumnType,
    TableDefinition,
};
pub use value::Value;
