use crate::value::Value;

/// Column assignments for an insert row or an update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Values {
    entries: Vec<(String, Value)>,
}

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a column; a repeated column replaces the earlier value
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        let column = column.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(name, _)| *name == column) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((column, value)),
        }
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }
}

/// A rendered statement that returns no rows
///
/// Usually one SQL statement. A multi-row insert whose rows assign different
/// columns renders as several on dialects without `DEFAULT` in `VALUES`;
/// [`Statement::execute`] runs those together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    batch: Vec<String>,
}

impl Statement {
    pub(crate) fn new(sql: String) -> Self {
        Self { batch: vec![sql] }
    }

    pub(crate) fn batch(batch: Vec<String>) -> Self {
        Self { batch }
    }

    /// SQL text; batched statements are separated by `"; "`
    pub fn sql(&self) -> String {
        self.batch.join("; ")
    }

    pub fn statements(&self) -> &[String] {
        &self.batch
    }
}
