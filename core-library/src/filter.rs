//! Filter expressions and predicates.
//!
//! Predicates are built either directly (`Predicate::compare`), from a
//! `(left, "op", right)` triple, or from a [`Matcher`], a partial row whose
//! entries expand to `column = value` comparisons joined with `AND`.

use crate::dialect::Dialect;
use crate::error::{LibraryError, Result};
use crate::id::Identifier;
use crate::schema::{ColumnRef, TableDefinition};
use crate::value::Value;
use std::fmt;
use std::str::FromStr;

/// Operand of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Value),
    Column(ColumnRef),
    Tuple(Vec<Expression>),
}

impl Expression {
    pub fn render(&self, dialect: &dyn Dialect) -> Result<String> {
        match self {
            Expression::Literal(value) => dialect.escape_literal(value),
            Expression::Column(column) => Ok(column.render(dialect)),
            Expression::Tuple(items) => {
                let parts = items
                    .iter()
                    .map(|item| item.render(dialect))
                    .collect::<Result<Vec<_>>>()?;
                Ok(format!("({})", parts.join(", ")))
            }
        }
    }

    /// Rendered rows when this is a list of tuples (the right side of a
    /// composite-key `IN`)
    fn render_rows(&self, dialect: &dyn Dialect) -> Result<Option<Vec<String>>> {
        match self {
            Expression::Tuple(items)
                if !items.is_empty()
                    && items.iter().all(|i| matches!(i, Expression::Tuple(_))) =>
            {
                items.iter().map(|i| i.render(dialect)).collect::<Result<_>>().map(Some)
            }
            Expression::Literal(Value::List(items))
                if !items.is_empty() && items.iter().all(|i| matches!(i, Value::List(_))) =>
            {
                items
                    .iter()
                    .map(|i| dialect.escape_literal(i))
                    .collect::<Result<_>>()
                    .map(Some)
            }
            _ => Ok(None),
        }
    }
}

macro_rules! expression_from_literal {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Expression {
                fn from(value: $ty) -> Self {
                    Expression::Literal(Value::from(value))
                }
            }
        )*
    };
}

expression_from_literal!(
    Value,
    bool,
    i32,
    i64,
    u32,
    f64,
    String,
    &str,
    &String,
    Vec<u8>,
    &[u8],
    Identifier,
    &Identifier,
    Vec<Value>,
    Vec<i64>,
    Vec<i32>,
    Vec<String>,
    Vec<&str>,
    Vec<Identifier>,
);

impl<T: Into<Value>> From<Option<T>> for Expression {
    fn from(value: Option<T>) -> Self {
        Expression::Literal(Value::from(value))
    }
}

impl From<ColumnRef> for Expression {
    fn from(column: ColumnRef) -> Self {
        Expression::Column(column)
    }
}

impl From<&ColumnRef> for Expression {
    fn from(column: &ColumnRef) -> Self {
        Expression::Column(column.clone())
    }
}

impl From<Vec<Expression>> for Expression {
    fn from(items: Vec<Expression>) -> Self {
        Expression::Tuple(items)
    }
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    In,
    Is,
    IsNot,
}

impl Operator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "<>",
            Operator::In => "IN",
            Operator::Is => "IS",
            Operator::IsNot => "IS NOT",
        }
    }
}

impl FromStr for Operator {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "=" => Ok(Operator::Eq),
            "<>" => Ok(Operator::NotEq),
            "IN" => Ok(Operator::In),
            "IS" => Ok(Operator::Is),
            "IS NOT" => Ok(Operator::IsNot),
            other => Err(LibraryError::misuse(format!(
                "unsupported comparison operator {other:?}"
            ))),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    And,
    Or,
}

impl Connective {
    fn as_sql(&self) -> &'static str {
        match self {
            Connective::And => "AND",
            Connective::Or => "OR",
        }
    }
}

/// A boolean SQL expression
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Literal(bool),
    Compare {
        left: Expression,
        op: Operator,
        right: Expression,
    },
    /// `first CONN (c1) CONN (c2) ...`, evaluated the way SQL reads it
    Composite {
        first: Box<Predicate>,
        rest: Vec<(Connective, Predicate)>,
    },
}

impl Predicate {
    /// Elementary comparison; `op` is one of `=`, `<>`, `IN`, `IS`, `IS NOT`
    pub fn compare(
        left: impl Into<Expression>,
        op: &str,
        right: impl Into<Expression>,
    ) -> Result<Predicate> {
        Ok(Predicate::Compare {
            left: left.into(),
            op: op.parse()?,
            right: right.into(),
        })
    }

    /// `self AND (other)`
    ///
    /// Chains read left to right: after an `or`, everything so far becomes
    /// the parenthesized first component, so `a.or(b).and(c)` renders
    /// `(a OR (b)) AND (c)`.
    pub fn and(self, other: Predicate) -> Predicate {
        self.extend(Connective::And, other)
    }

    /// `self OR (other)`; a preceding `and` chain is grouped as with [`Predicate::and`]
    pub fn or(self, other: Predicate) -> Predicate {
        self.extend(Connective::Or, other)
    }

    /// Append a component; a chain of one connective stays flat, a change of
    /// connective groups everything so far as the first component
    fn extend(self, connective: Connective, other: Predicate) -> Predicate {
        match self {
            Predicate::Composite { first, mut rest }
                if rest.iter().all(|(c, _)| *c == connective) =>
            {
                rest.push((connective, other));
                Predicate::Composite { first, rest }
            }
            current => Predicate::Composite {
                first: Box::new(current),
                rest: vec![(connective, other)],
            },
        }
    }

    pub fn render(&self, dialect: &dyn Dialect) -> Result<String> {
        match self {
            Predicate::Literal(value) => dialect.escape_literal(&Value::Bool(*value)),
            Predicate::Compare {
                left,
                op: Operator::In,
                right,
            } if matches!(left, Expression::Tuple(_)) => {
                let right = match right.render_rows(dialect)? {
                    Some(rows) => dialect.row_value_list(&rows),
                    None => right.render(dialect)?,
                };
                Ok(format!("{} IN {}", left.render(dialect)?, right))
            }
            Predicate::Compare { left, op, right } => Ok(format!(
                "{} {} {}",
                left.render(dialect)?,
                op,
                right.render(dialect)?
            )),
            Predicate::Composite { first, rest } => {
                let mut sql = match first.as_ref() {
                    Predicate::Composite { .. } => format!("({})", first.render(dialect)?),
                    other => other.render(dialect)?,
                };
                for (connective, component) in rest {
                    sql.push(' ');
                    sql.push_str(connective.as_sql());
                    sql.push_str(" (");
                    sql.push_str(&component.render(dialect)?);
                    sql.push(')');
                }
                Ok(sql)
            }
        }
    }

    /// Fold predicates with AND; `None` when there are none
    pub(crate) fn all(predicates: impl IntoIterator<Item = Predicate>) -> Option<Predicate> {
        predicates
            .into_iter()
            .fold(None, |acc: Option<Predicate>, p| match acc {
                None => Some(p),
                Some(acc) => Some(acc.and(p)),
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum MatchEntry {
    Value(Expression),
    Table(Matcher),
}

/// Partial row used as an equality filter
///
/// With one table in scope keys are column names. With several, nest a
/// matcher per table alias; flat keys are still accepted when exactly one
/// table in scope has a column of that name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Matcher {
    entries: Vec<(String, MatchEntry)>,
}

impl Matcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// `column = value`
    pub fn field(mut self, column: impl Into<String>, value: impl Into<Expression>) -> Self {
        self.entries
            .push((column.into(), MatchEntry::Value(value.into())));
        self
    }

    /// Entries scoped to one table alias
    pub fn table(mut self, alias: impl Into<String>, nested: Matcher) -> Self {
        self.entries.push((alias.into(), MatchEntry::Table(nested)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn to_predicate(&self, scope: &[&TableDefinition]) -> Result<Option<Predicate>> {
        let mut comparisons = Vec::new();
        self.collect(scope, &mut comparisons)?;
        Ok(Predicate::all(comparisons))
    }

    fn collect(&self, scope: &[&TableDefinition], out: &mut Vec<Predicate>) -> Result<()> {
        for (key, entry) in &self.entries {
            match entry {
                MatchEntry::Table(nested) => {
                    let table = scope
                        .iter()
                        .find(|t| t.alias() == key.as_str())
                        .ok_or_else(|| {
                            LibraryError::misuse(format!("no table aliased {key} in scope"))
                        })?;
                    nested.collect(&[*table], out)?;
                }
                MatchEntry::Value(value) => {
                    let column = resolve_column(scope, key)?;
                    out.push(Predicate::Compare {
                        left: Expression::Column(column),
                        op: Operator::Eq,
                        right: value.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn resolve_column(scope: &[&TableDefinition], name: &str) -> Result<ColumnRef> {
    if let [single] = scope {
        return single.column(name);
    }
    let mut candidates = scope.iter().filter_map(|t| t.find_column(name));
    match (candidates.next(), candidates.next()) {
        (Some(column), None) => Ok(column.clone()),
        (Some(_), Some(_)) => Err(LibraryError::misuse(format!(
            "column {name} is ambiguous; nest it under a table alias"
        ))),
        (None, _) => Err(LibraryError::misuse(format!(
            "no table in scope has a column named {name}"
        ))),
    }
}

/// Anything accepted by `where_`, `on`, `and` and `or`
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Match(Matcher),
    Compare(Expression, String, Expression),
    Predicate(Predicate),
}

impl Condition {
    pub(crate) fn resolve(&self, scope: &[&TableDefinition]) -> Result<Option<Predicate>> {
        match self {
            Condition::Match(matcher) => matcher.to_predicate(scope),
            Condition::Compare(left, op, right) => Ok(Some(Predicate::Compare {
                left: left.clone(),
                op: op.parse()?,
                right: right.clone(),
            })),
            Condition::Predicate(predicate) => Ok(Some(predicate.clone())),
        }
    }
}

impl From<Matcher> for Condition {
    fn from(matcher: Matcher) -> Self {
        Condition::Match(matcher)
    }
}

impl From<Predicate> for Condition {
    fn from(predicate: Predicate) -> Self {
        Condition::Predicate(predicate)
    }
}

impl<L, R> From<(L, &str, R)> for Condition
where
    L: Into<Expression>,
    R: Into<Expression>,
{
    fn from((left, op, right): (L, &str, R)) -> Self {
        Condition::Compare(left.into(), op.to_string(), right.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MysqlDialect, SqliteDialect};
    use crate::schema::{number, string, table};

    fn foo() -> TableDefinition {
        table("foo", [("col1", string()), ("col2", number())])
    }

    fn bar() -> TableDefinition {
        table("bar", [("col3", string()), ("col2", number())])
    }

    #[test]
    fn test_operator_parsing() {
        assert_eq!("=".parse::<Operator>().unwrap(), Operator::Eq);
        assert_eq!("IS NOT".parse::<Operator>().unwrap(), Operator::IsNot);
        let err = "LIKE".parse::<Operator>().unwrap_err();
        assert!(matches!(err, LibraryError::DslMisuse(msg) if msg.contains("LIKE")));
    }

    #[test]
    fn test_compare_renders_left_op_right() {
        let foo = foo();
        let p = Predicate::compare(foo.column("col1").unwrap(), "IN", vec!["a", "b"]).unwrap();
        assert_eq!(
            p.render(&SqliteDialect).unwrap(),
            "`foo`.`col1` IN ('a', 'b')"
        );

        let p = Predicate::compare(foo.column("col2").unwrap(), "IS NOT", Value::Null).unwrap();
        assert_eq!(
            p.render(&SqliteDialect).unwrap(),
            "`foo`.`col2` IS NOT NULL"
        );
    }

    #[test]
    fn test_composite_parenthesizes_later_components() {
        let p = Predicate::Literal(true)
            .and(Predicate::compare(1, "=", 1).unwrap())
            .and(Predicate::compare(2, "<>", 3).unwrap());
        assert_eq!(
            p.render(&SqliteDialect).unwrap(),
            "TRUE AND (1 = 1) AND (2 <> 3)"
        );
    }

    #[test]
    fn test_mixed_connectives_group_the_prefix() {
        let p = Predicate::compare(1, "=", 1)
            .unwrap()
            .or(Predicate::compare(2, "=", 2).unwrap())
            .and(Predicate::compare(3, "=", 3).unwrap());
        assert_eq!(
            p.render(&SqliteDialect).unwrap(),
            "(1 = 1 OR (2 = 2)) AND (3 = 3)"
        );
    }

    #[test]
    fn test_tuple_in_renders_row_values() {
        let foo = foo();
        let p = Predicate::compare(
            vec![
                Expression::from(foo.column("col1").unwrap()),
                Expression::from(foo.column("col2").unwrap()),
            ],
            "IN",
            vec![
                Expression::from(vec![Expression::from("a"), Expression::from(1)]),
                Expression::from(vec![Expression::from("b"), Expression::from(2)]),
            ],
        )
        .unwrap();
        assert_eq!(
            p.render(&MysqlDialect).unwrap(),
            "(`foo`.`col1`, `foo`.`col2`) IN (('a', 1), ('b', 2))"
        );
        assert_eq!(
            p.render(&SqliteDialect).unwrap(),
            "(`foo`.`col1`, `foo`.`col2`) IN (VALUES ('a', 1), ('b', 2))"
        );

        let from_values = Predicate::compare(
            vec![
                Expression::from(foo.column("col1").unwrap()),
                Expression::from(foo.column("col2").unwrap()),
            ],
            "IN",
            vec![Value::List(vec![Value::from("a"), Value::from(1)])],
        )
        .unwrap();
        assert_eq!(
            from_values.render(&SqliteDialect).unwrap(),
            "(`foo`.`col1`, `foo`.`col2`) IN (VALUES ('a', 1))"
        );
    }

    #[test]
    fn test_matcher_single_table() {
        let foo = foo();
        let p = Matcher::new()
            .field("col1", "a")
            .field("col2", 42)
            .to_predicate(&[&foo])
            .unwrap()
            .unwrap();
        assert_eq!(
            p.render(&SqliteDialect).unwrap(),
            "`foo`.`col1` = 'a' AND (`foo`.`col2` = 42)"
        );
    }

    #[test]
    fn test_empty_matcher_has_no_predicate() {
        let foo = foo();
        assert!(Matcher::new().to_predicate(&[&foo]).unwrap().is_none());
    }

    #[test]
    fn test_matcher_nested_by_alias() {
        let (foo, bar) = (foo(), bar());
        let p = Matcher::new()
            .table(
                "foo",
                Matcher::new().field("col1", bar.column("col3").unwrap()),
            )
            .to_predicate(&[&foo, &bar])
            .unwrap()
            .unwrap();
        assert_eq!(
            p.render(&SqliteDialect).unwrap(),
            "`foo`.`col1` = `bar`.`col3`"
        );
    }

    #[test]
    fn test_matcher_flat_key_across_tables() {
        let (foo, bar) = (foo(), bar());
        let p = Matcher::new()
            .field("col3", "x")
            .to_predicate(&[&foo, &bar])
            .unwrap()
            .unwrap();
        assert_eq!(p.render(&SqliteDialect).unwrap(), "`bar`.`col3` = 'x'");

        let ambiguous = Matcher::new().field("col2", 1).to_predicate(&[&foo, &bar]);
        assert!(matches!(ambiguous, Err(LibraryError::DslMisuse(_))));
    }

    #[test]
    fn test_matcher_rejects_unknown_names() {
        let foo = foo();
        assert!(Matcher::new().field("zzz", 1).to_predicate(&[&foo]).is_err());
        assert!(Matcher::new()
            .table("qux", Matcher::new().field("col1", 1))
            .to_predicate(&[&foo])
            .is_err());
    }

    #[test]
    fn test_condition_from_triple() {
        let foo = foo();
        let condition = Condition::from((foo.column("col2").unwrap(), "<>", 7));
        let p = condition.resolve(&[&foo]).unwrap().unwrap();
        assert_eq!(p.render(&SqliteDialect).unwrap(), "`foo`.`col2` <> 7");

        let bad = Condition::from((foo.column("col2").unwrap(), ">", 7));
        assert!(bad.resolve(&[&foo]).is_err());
    }
}
