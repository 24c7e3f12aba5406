//! Materialized rows.
//!
//! A fetched row comes back from the driver as a flat positional tuple. The
//! [`RowMapper`] produced alongside the SQL text rebuilds the nested shape the
//! query selected, converting each cell through the dialect on the way.

use crate::dialect::Dialect;
use crate::error::{LibraryError, Result};
use crate::schema::ColumnType;
use crate::value::Value;
use bridge_traits::database::{QueryRow, QueryValue};
use serde::de::DeserializeOwned;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::sync::Arc;

/// A materialized row: a scalar, or an object of named records
///
/// Object fields keep the order the projection selected them in.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Value(Value),
    Object(Vec<(String, Record)>),
}

impl Record {
    pub fn get(&self, key: &str) -> Option<&Record> {
        match self {
            Record::Object(fields) => fields
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, record)| record),
            Record::Value(_) => None,
        }
    }

    /// Field names of an object, in projection order
    pub fn keys(&self) -> Vec<&str> {
        match self {
            Record::Object(fields) => fields.iter().map(|(name, _)| name.as_str()).collect(),
            Record::Value(_) => Vec::new(),
        }
    }

    /// Follow a chain of keys through nested objects
    pub fn path(&self, keys: &[&str]) -> Option<&Record> {
        keys.iter().try_fold(self, |record, key| record.get(key))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Record::Value(value) => Some(value),
            Record::Object(_) => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Record::Value(Value::Null))
    }

    /// Convert into a typed value through its JSON form
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        let json = serde_json::to_value(self).map_err(|e| LibraryError::Decode(e.to_string()))?;
        serde_json::from_value(json).map_err(|e| LibraryError::Decode(e.to_string()))
    }
}

impl From<Value> for Record {
    fn from(value: Value) -> Self {
        Record::Value(value)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Record::Value(value) => value.serialize(serializer),
            Record::Object(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (key, value) in fields {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

/// Result shape compiled from a projection
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Shape {
    Leaf {
        index: usize,
        column_type: ColumnType,
    },
    Object {
        entries: Vec<(String, Shape)>,
        /// Cell positions that make the whole object `Null` when all are NULL
        null_when_empty: Option<Vec<usize>>,
    },
}

impl Shape {
    pub(crate) fn leaf_indexes(&self, out: &mut Vec<usize>) {
        match self {
            Shape::Leaf { index, .. } => out.push(*index),
            Shape::Object { entries, .. } => {
                for (_, shape) in entries {
                    shape.leaf_indexes(out);
                }
            }
        }
    }
}

/// Rebuilds nested records from positional rows
#[derive(Clone)]
pub struct RowMapper {
    dialect: Arc<dyn Dialect>,
    shape: Shape,
    width: usize,
}

impl fmt::Debug for RowMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowMapper")
            .field("dialect", &self.dialect.name())
            .field("width", &self.width)
            .finish()
    }
}

impl RowMapper {
    pub(crate) fn new(dialect: Arc<dyn Dialect>, shape: Shape, width: usize) -> Self {
        Self {
            dialect,
            shape,
            width,
        }
    }

    /// Number of cells each row must carry
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn map_row(&self, row: QueryRow) -> Result<Record> {
        if row.len() != self.width {
            return Err(LibraryError::Decode(format!(
                "row has {} cells, projection expects {}",
                row.len(),
                self.width
            )));
        }
        let mut cells: Vec<Option<QueryValue>> = row.into_iter().map(Some).collect();
        Ok(self.build(&self.shape, &mut cells))
    }

    pub fn map_rows(&self, rows: Vec<QueryRow>) -> Result<Vec<Record>> {
        rows.into_iter().map(|row| self.map_row(row)).collect()
    }

    fn build(&self, shape: &Shape, cells: &mut [Option<QueryValue>]) -> Record {
        match shape {
            Shape::Leaf { index, column_type } => {
                let cell = cells[*index].take().unwrap_or(QueryValue::Null);
                Record::Value(self.dialect.convert_stored_value(cell, *column_type))
            }
            Shape::Object {
                entries,
                null_when_empty,
            } => {
                if let Some(indexes) = null_when_empty {
                    let all_null = indexes
                        .iter()
                        .all(|i| cells[*i].as_ref().map_or(true, QueryValue::is_null));
                    if all_null {
                        return Record::Value(Value::Null);
                    }
                }
                let fields = entries
                    .iter()
                    .map(|(key, child)| (key.clone(), self.build(child, cells)))
                    .collect();
                Record::Object(fields)
            }
        }
    }
}
