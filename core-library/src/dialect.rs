//! # SQL Dialects
//!
//! Everything the renderer needs to know about the target database's lexical
//! rules: how identifiers are quoted, how literal values are inlined, what a
//! truncate looks like, and how driver cells map back to host values.
//!
//! Two dialects ship with the core:
//!
//! - [`SqliteDialect`] (default): strings escape `'` by doubling it; there is
//!   no `TRUNCATE`.
//! - [`MysqlDialect`]: strings use backslash escapes.
//!
//! Neither accepts `OFFSET` without `LIMIT`; each names its own "no limit".
//!
//! Both quote identifiers with backticks and render blobs as `X'..'` hex.

use crate::error::{LibraryError, Result};
use crate::schema::ColumnType;
use crate::value::Value;
use bridge_traits::database::QueryValue;
use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

/// Lexical rules of a target database
pub trait Dialect: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Escape the body of a string literal (without the surrounding quotes)
    fn escape_string(&self, text: &str) -> String;

    /// Whether string literals use backslash escapes instead of doubled quotes
    fn backslash_escapes(&self) -> bool;

    /// Statement that empties the given (already escaped) table
    fn truncate_statement(&self, table_sql: &str) -> String;

    /// `LIMIT` operand meaning "all rows", emitted when only an offset is set
    ///
    /// `None` renders a bare `OFFSET`.
    fn unbounded_limit(&self) -> Option<&'static str> {
        None
    }

    /// Whether `DEFAULT` may stand in for a cell inside a `VALUES` tuple
    fn supports_default_in_values(&self) -> bool {
        true
    }

    /// Right-hand side of a row-value `IN`, given the rendered row tuples
    fn row_value_list(&self, rows: &[String]) -> String {
        format!("({})", rows.join(", "))
    }

    /// Quote an identifier with backticks, doubling embedded backticks
    fn escape_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn unescape_identifier(&self, text: &str) -> Result<String> {
        let inner = text
            .strip_prefix('`')
            .and_then(|rest| rest.strip_suffix('`'))
            .ok_or_else(|| LibraryError::Decode(format!("not a quoted identifier: {text}")))?;
        Ok(inner.replace("``", "`"))
    }

    fn escape_literal(&self, value: &Value) -> Result<String> {
        match value {
            Value::Null => Ok("NULL".to_string()),
            Value::Bool(true) => Ok("TRUE".to_string()),
            Value::Bool(false) => Ok("FALSE".to_string()),
            Value::Integer(i) => Ok(i.to_string()),
            Value::Real(r) if r.is_finite() => Ok(format!("{r:?}")),
            Value::Real(r) => Err(LibraryError::Escape {
                value: r.to_string(),
                kind: value.kind(),
            }),
            Value::Text(s) => Ok(format!("'{}'", self.escape_string(s))),
            Value::Blob(bytes) => Ok(format!("X'{}'", hex::encode_upper(bytes))),
            Value::List(items) => {
                let parts = items
                    .iter()
                    .map(|item| self.escape_literal(item))
                    .collect::<Result<Vec<_>>>()?;
                Ok(format!("({})", parts.join(", ")))
            }
        }
    }

    /// Parse text produced by [`Dialect::escape_literal`] back into a value
    fn unescape_literal(&self, text: &str) -> Result<Value> {
        let mut reader = LiteralReader {
            chars: text.trim().chars().peekable(),
            backslash: self.backslash_escapes(),
        };
        let value = reader.read_value()?;
        reader.skip_whitespace();
        match reader.chars.next() {
            None => Ok(value),
            Some(c) => Err(LibraryError::Decode(format!(
                "unexpected {c:?} after literal in {text:?}"
            ))),
        }
    }

    /// Convert a driver cell read from a column of the given type
    fn convert_stored_value(&self, cell: QueryValue, column_type: ColumnType) -> Value {
        match (cell, column_type) {
            (QueryValue::Integer(i), ColumnType::Boolean) => Value::Bool(i != 0),
            (cell, _) => Value::from(cell),
        }
    }
}

/// SQLite lexical rules
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn escape_string(&self, text: &str) -> String {
        text.replace('\'', "''")
    }

    fn backslash_escapes(&self) -> bool {
        false
    }

    fn truncate_statement(&self, table_sql: &str) -> String {
        format!("DELETE FROM {table_sql}")
    }

    fn unbounded_limit(&self) -> Option<&'static str> {
        Some("-1")
    }

    fn supports_default_in_values(&self) -> bool {
        false
    }

    // row values may only be compared against a subquery
    fn row_value_list(&self, rows: &[String]) -> String {
        format!("(VALUES {})", rows.join(", "))
    }
}

/// MySQL lexical rules
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlDialect;

impl Dialect for MysqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn escape_string(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for c in text.chars() {
            match c {
                '\\' => out.push_str("\\\\"),
                '\'' => out.push_str("\\'"),
                '\0' => out.push_str("\\0"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\x1a' => out.push_str("\\Z"),
                c => out.push(c),
            }
        }
        out
    }

    fn backslash_escapes(&self) -> bool {
        true
    }

    fn truncate_statement(&self, table_sql: &str) -> String {
        format!("TRUNCATE TABLE {table_sql}")
    }

    fn unbounded_limit(&self) -> Option<&'static str> {
        Some("18446744073709551615")
    }
}

struct LiteralReader<'a> {
    chars: Peekable<Chars<'a>>,
    backslash: bool,
}

impl LiteralReader<'_> {
    fn skip_whitespace(&mut self) {
        while self.chars.next_if(|c| c.is_whitespace()).is_some() {}
    }

    fn read_value(&mut self) -> Result<Value> {
        self.skip_whitespace();
        match self.chars.peek().copied() {
            Some('\'') => {
                self.chars.next();
                self.read_string().map(Value::Text)
            }
            Some('(') => {
                self.chars.next();
                self.read_list()
            }
            Some('X') | Some('x') => {
                self.chars.next();
                if self.chars.next() != Some('\'') {
                    return Err(LibraryError::Decode("expected ' after X".to_string()));
                }
                self.read_blob()
            }
            Some(_) => self.read_bare(),
            None => Err(LibraryError::Decode("empty literal".to_string())),
        }
    }

    fn read_string(&mut self) -> Result<String> {
        let mut out = String::new();
        loop {
            match self.chars.next() {
                None => return Err(LibraryError::Decode("unterminated string".to_string())),
                Some('\\') if self.backslash => {
                    let escaped = match self.chars.next() {
                        Some('0') => '\0',
                        Some('n') => '\n',
                        Some('r') => '\r',
                        Some('Z') => '\x1a',
                        Some(c) => c,
                        None => {
                            return Err(LibraryError::Decode("dangling backslash".to_string()))
                        }
                    };
                    out.push(escaped);
                }
                Some('\'') => {
                    if !self.backslash && self.chars.next_if_eq(&'\'').is_some() {
                        out.push('\'');
                    } else {
                        return Ok(out);
                    }
                }
                Some(c) => out.push(c),
            }
        }
    }

    fn read_blob(&mut self) -> Result<Value> {
        let mut digits = String::new();
        loop {
            match self.chars.next() {
                Some('\'') => break,
                Some(c) => digits.push(c),
                None => return Err(LibraryError::Decode("unterminated blob".to_string())),
            }
        }
        let bytes = hex::decode(&digits)
            .map_err(|e| LibraryError::Decode(format!("invalid blob literal X'{digits}': {e}")))?;
        Ok(Value::Blob(bytes))
    }

    fn read_list(&mut self) -> Result<Value> {
        let mut items = Vec::new();
        self.skip_whitespace();
        if self.chars.next_if_eq(&')').is_some() {
            return Ok(Value::List(items));
        }
        loop {
            items.push(self.read_value()?);
            self.skip_whitespace();
            match self.chars.next() {
                Some(',') => continue,
                Some(')') => return Ok(Value::List(items)),
                other => {
                    return Err(LibraryError::Decode(format!(
                        "expected ',' or ')' in list, found {other:?}"
                    )))
                }
            }
        }
    }

    fn read_bare(&mut self) -> Result<Value> {
        let mut token = String::new();
        while let Some(c) = self
            .chars
            .next_if(|c| !c.is_whitespace() && *c != ',' && *c != ')')
        {
            token.push(c);
        }
        match token.as_str() {
            "NULL" => return Ok(Value::Null),
            "TRUE" => return Ok(Value::Bool(true)),
            "FALSE" => return Ok(Value::Bool(false)),
            _ => {}
        }
        if token.contains(['.', 'e', 'E']) {
            token
                .parse::<f64>()
                .map(Value::Real)
                .map_err(|e| LibraryError::Decode(format!("{token:?}: {e}")))
        } else {
            token
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|e| LibraryError::Decode(format!("{token:?}: {e}")))
        }
    }
}
