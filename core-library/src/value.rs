//! Host-side literal values.
//!
//! [`Value`] is what callers hand to the builder (filter operands, inserted
//! cells, update assignments) and what materialized rows contain. Driver cells
//! ([`QueryValue`]) are converted into `Value`s by the active dialect.

use crate::id::Identifier;
use bridge_traits::database::QueryValue;
use serde::ser::{Serialize, SerializeSeq, Serializer};

/// A literal value that can be inlined into SQL text
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    /// Parenthesized list, used on the right-hand side of `IN`
    List(Vec<Value>),
}

impl Value {
    /// Human-readable name of the value's kind, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "string",
            Value::Blob(_) => "bytes",
            Value::List(_) => "list",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Blob(b) => Some(b),
            _ => None,
        }
    }
}

impl From<QueryValue> for Value {
    fn from(cell: QueryValue) -> Self {
        match cell {
            QueryValue::Null => Value::Null,
            QueryValue::Integer(i) => Value::Integer(i),
            QueryValue::Real(r) => Value::Real(r),
            QueryValue::Text(s) => Value::Text(s),
            QueryValue::Blob(b) => Value::Blob(b),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => |$v:ident| $body:expr),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from($v: $ty) -> Self {
                    $body
                }
            }
        )*
    };
}

value_from! {
    bool => |v| Value::Bool(v),
    i32 => |v| Value::Integer(v as i64),
    i64 => |v| Value::Integer(v),
    u32 => |v| Value::Integer(v as i64),
    f64 => |v| Value::Real(v),
    String => |v| Value::Text(v),
    &str => |v| Value::Text(v.to_string()),
    &String => |v| Value::Text(v.clone()),
    Vec<u8> => |v| Value::Blob(v),
    &[u8] => |v| Value::Blob(v.to_vec()),
    Identifier => |v| Value::Blob(v.as_bytes().to_vec()),
    &Identifier => |v| Value::Blob(v.as_bytes().to_vec()),
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

macro_rules! list_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<Vec<$ty>> for Value {
                fn from(values: Vec<$ty>) -> Self {
                    Value::List(values.into_iter().map(Into::into).collect())
                }
            }
        )*
    };
}

list_from!(Value, i64, i32, String, &str, Identifier);

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Real(r) => serializer.serialize_f64(*r),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Blob(b) => serializer.serialize_bytes(b),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        assert_eq!(Value::from("a"), Value::Text("a".to_string()));
        assert_eq!(Value::from(42), Value::Integer(42));
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(vec![1u8, 2]), Value::Blob(vec![1, 2]));
        assert_eq!(
            Value::from(vec!["a", "b"]),
            Value::List(vec![Value::from("a"), Value::from("b")])
        );
    }

    #[test]
    fn test_from_driver_cell() {
        assert_eq!(Value::from(QueryValue::Integer(7)), Value::Integer(7));
        assert_eq!(Value::from(QueryValue::Null), Value::Null);
        assert_eq!(
            Value::from(QueryValue::Blob(vec![0xAB])),
            Value::Blob(vec![0xAB])
        );
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(Value::Real(1.5).kind(), "real");
        assert_eq!(Value::List(vec![]).kind(), "list");
        assert_eq!(Value::Blob(vec![]).kind(), "bytes");
    }

    #[test]
    fn test_serialize_to_json() {
        let json = serde_json::to_value(Value::List(vec![
            Value::Integer(1),
            Value::Text("x".into()),
            Value::Null,
        ]))
        .unwrap();
        assert_eq!(json, serde_json::json!([1, "x", null]));
    }
}
