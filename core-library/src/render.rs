//! SQL text generation.
//!
//! Clause order is fixed: `SELECT cols FROM origin AS alias [JOIN ...]
//! [WHERE ...] [ORDER BY ...] [LIMIT n] [OFFSET n]`, each clause only when
//! present and joins in registration order.

use crate::error::Result;
use crate::query::state::QueryState;
use crate::query::{Selection, Values};
use crate::record::{RowMapper, Shape};
use crate::schema::TableOrigin;
use crate::value::Value;
use std::collections::HashSet;

/// SQL text plus the mapper that rebuilds its rows
#[derive(Debug, Clone)]
pub struct Rendered {
    pub sql: String,
    pub mapper: RowMapper,
}

pub(crate) fn select(state: &QueryState) -> Result<Rendered> {
    let dialect = state.dialect.as_ref();
    let selection = state.effective_selection();
    let leaves = selection.leaves();
    let scalar = matches!(selection, Selection::Column(_));

    let columns: Vec<String> = leaves
        .iter()
        .map(|(path, column)| match path.last() {
            Some(key) if !scalar => format!(
                "{} AS {}",
                column.render(dialect),
                dialect.escape_identifier(key)
            ),
            _ => column.render(dialect),
        })
        .collect();

    let mut sql = format!("SELECT {}{}", columns.join(", "), source(state)?);

    if !state.order.is_empty() {
        let terms: Vec<String> = state.order.iter().map(|t| t.render(dialect)).collect();
        sql.push_str(" ORDER BY ");
        sql.push_str(&terms.join(", "));
    }

    match (state.limit, state.offset) {
        (Some(limit), _) => sql.push_str(&format!(" LIMIT {limit}")),
        (None, Some(_)) => {
            if let Some(all) = dialect.unbounded_limit() {
                sql.push_str(&format!(" LIMIT {all}"));
            }
        }
        (None, None) => {}
    }
    if let Some(offset) = state.offset {
        sql.push_str(&format!(" OFFSET {offset}"));
    }

    let optional = state.optional_aliases();
    let mut next_index = 0;
    let shape = compile_shape(&selection, &optional, &mut next_index, true);
    let mapper = RowMapper::new(state.dialect.clone(), shape, leaves.len());

    Ok(Rendered { sql, mapper })
}

pub(crate) fn count(state: &QueryState) -> Result<String> {
    Ok(format!("SELECT COUNT(*){}", source(state)?))
}

/// ` FROM ... [JOIN ...] [WHERE ...]`
fn source(state: &QueryState) -> Result<String> {
    let dialect = state.dialect.as_ref();
    let mut sql = format!(" FROM {}", state.primary.render_source(dialect));

    for join in &state.joins {
        let on = match &join.on {
            Some(predicate) => predicate.render(dialect)?,
            None => dialect.escape_literal(&Value::Bool(true))?,
        };
        sql.push_str(&format!(
            " {} {} ON ({})",
            join.kind.as_sql(),
            join.table.render_source(dialect),
            on
        ));
    }

    if let Some(filter) = &state.filter {
        sql.push_str(" WHERE ");
        sql.push_str(&filter.render(dialect)?);
    }
    Ok(sql)
}

fn compile_shape(
    selection: &Selection,
    optional: &HashSet<&str>,
    next_index: &mut usize,
    root: bool,
) -> Shape {
    match selection {
        Selection::Column(column) => {
            let index = *next_index;
            *next_index += 1;
            Shape::Leaf {
                index,
                column_type: column.column_type,
            }
        }
        Selection::Nested(entries) => {
            let entries: Vec<(String, Shape)> = entries
                .iter()
                .map(|(key, child)| {
                    (
                        key.clone(),
                        compile_shape(child, optional, next_index, false),
                    )
                })
                .collect();

            let mut shape = Shape::Object {
                entries,
                null_when_empty: None,
            };
            if !root && from_single_optional_table(selection, optional) {
                let mut indexes = Vec::new();
                shape.leaf_indexes(&mut indexes);
                if let Shape::Object {
                    null_when_empty, ..
                } = &mut shape
                {
                    *null_when_empty = Some(indexes);
                }
            }
            shape
        }
    }
}

/// Whether every leaf under `selection` comes from one outer-joined table
fn from_single_optional_table(selection: &Selection, optional: &HashSet<&str>) -> bool {
    let leaves = selection.leaves();
    let Some((_, first)) = leaves.first() else {
        return false;
    };
    let alias = first.table_alias.as_str();
    optional.contains(alias) && leaves.iter().all(|(_, c)| c.table_alias == alias)
}

/// One `INSERT` when the dialect takes `DEFAULT` inside `VALUES` or every row
/// assigns the same columns; otherwise one per distinct column set, in order
/// of first appearance
pub(crate) fn insert(state: &QueryState, rows: &[Values]) -> Result<Vec<String>> {
    let dialect = state.dialect.as_ref();

    let mut columns: Vec<&str> = Vec::new();
    for row in rows {
        for (column, _) in row.iter() {
            if !columns.contains(&column) {
                columns.push(column);
            }
        }
    }

    let complete = rows
        .iter()
        .all(|row| columns.iter().all(|c| row.get(c).is_some()));
    if dialect.supports_default_in_values() || (complete && !columns.is_empty()) {
        let all: Vec<&Values> = rows.iter().collect();
        return insert_group(state, &columns, &all);
    }

    let mut groups: Vec<(Vec<&str>, Vec<&Values>)> = Vec::new();
    for row in rows {
        let assigned: Vec<&str> = columns
            .iter()
            .copied()
            .filter(|c| row.get(c).is_some())
            .collect();
        match groups.iter_mut().find(|(set, _)| *set == assigned) {
            Some((_, members)) => members.push(row),
            None => groups.push((assigned, vec![row])),
        }
    }

    let mut statements = Vec::new();
    for (set, members) in &groups {
        statements.extend(insert_group(state, set, members)?);
    }
    Ok(statements)
}

fn insert_group(state: &QueryState, columns: &[&str], rows: &[&Values]) -> Result<Vec<String>> {
    let dialect = state.dialect.as_ref();
    let target = state.primary.origin().render(dialect);

    // SQLite has no empty VALUES tuple
    if columns.is_empty() && !dialect.supports_default_in_values() {
        return Ok(vec![format!("INSERT INTO {target} DEFAULT VALUES"); rows.len()]);
    }

    let tuples = rows
        .iter()
        .map(|row| {
            let cells = columns
                .iter()
                .map(|column| match row.get(column) {
                    Some(value) => dialect.escape_literal(value),
                    None => Ok("DEFAULT".to_string()),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(format!("({})", cells.join(", ")))
        })
        .collect::<Result<Vec<_>>>()?;

    let column_list: Vec<String> = columns
        .iter()
        .map(|c| dialect.escape_identifier(c))
        .collect();

    Ok(vec![format!(
        "INSERT INTO {} ({}) VALUES {}",
        target,
        column_list.join(", "),
        tuples.join(", ")
    )])
}

pub(crate) fn update(state: &QueryState, values: &Values) -> Result<String> {
    let dialect = state.dialect.as_ref();
    let assignments = values
        .iter()
        .map(|(column, value)| {
            Ok(format!(
                "{} = {}",
                dialect.escape_identifier(column),
                dialect.escape_literal(value)?
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut sql = format!(
        "UPDATE {} SET {}",
        mutation_target(state),
        assignments.join(", ")
    );
    push_filter(state, &mut sql)?;
    Ok(sql)
}

pub(crate) fn delete(state: &QueryState) -> Result<String> {
    let mut sql = format!("DELETE FROM {}", mutation_target(state));
    push_filter(state, &mut sql)?;
    Ok(sql)
}

pub(crate) fn truncate(state: &QueryState) -> String {
    let dialect = state.dialect.as_ref();
    dialect.truncate_statement(&state.primary.origin().render(dialect))
}

/// Table for UPDATE/DELETE, aliased only when the alias differs from its name
fn mutation_target(state: &QueryState) -> String {
    let dialect = state.dialect.as_ref();
    let origin = state.primary.origin();
    let table_sql = origin.render(dialect);
    let name = match origin {
        TableOrigin::Real(path) => path.last().map(String::as_str),
        TableOrigin::Subquery(_) => None,
    };
    if name == Some(state.primary.alias()) {
        table_sql
    } else {
        format!(
            "{} AS {}",
            table_sql,
            dialect.escape_identifier(state.primary.alias())
        )
    }
}

fn push_filter(state: &QueryState, sql: &mut String) -> Result<()> {
    if let Some(filter) = &state.filter {
        sql.push_str(" WHERE ");
        sql.push_str(&filter.render(state.dialect.as_ref())?);
    }
    Ok(())
}
