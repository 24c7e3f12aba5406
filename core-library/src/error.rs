use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    /// The builder was driven outside its legal stage sequence, or was handed
    /// an alias, column, or operator it cannot accept.
    #[error("Query DSL misuse: {0}")]
    DslMisuse(String),

    #[error("Not supported yet: {0}")]
    Todo(String),

    #[error("Cannot escape {kind} value {value} as a SQL literal")]
    Escape { value: String, kind: &'static str },

    #[error("Expected exactly {expected} row(s), got {actual}")]
    Cardinality { expected: usize, actual: usize },

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Random source failed: {0}")]
    Random(String),

    #[error("Row decode failed: {0}")]
    Decode(String),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },
}

impl LibraryError {
    pub(crate) fn misuse(message: impl Into<String>) -> Self {
        LibraryError::DslMisuse(message.into())
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;
