use std::fmt;
use thiserror::Error;

/// Character offset into the expression text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub offset: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "column {}", self.offset + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at {position}")]
pub struct LexError {
    pub message: String,
    pub position: Position,
}

impl LexError {
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        LexError {
            message: message.into(),
            position: Position { offset },
        }
    }
}

/// Failure to turn expression text into a query model.
///
/// Every variant carries the offending expression text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Empty expression")]
    Empty,

    #[error("Syntax error in {text:?}: {source}")]
    Lex {
        text: String,
        #[source]
        source: LexError,
    },

    #[error("Syntax error in {text:?}: expected {expected}, found {found} at {position}")]
    UnexpectedToken {
        text: String,
        expected: String,
        found: String,
        position: Position,
    },

    #[error("Unsupported construct in {text:?}: {construct}")]
    Unsupported { text: String, construct: String },

    #[error("Invalid list comprehension in {text:?}: {reason}")]
    Comprehension { text: String, reason: String },

    #[error("Unknown constant '{name}' in {text:?}")]
    UnknownConstant { text: String, name: String },
}

/// Failure to render a model into SQL.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerateError {
    #[error("Variable array index requires an attribute base, found {0}")]
    VariableIndex(String),

    #[error("{method}() takes exactly one argument, {count} given")]
    MethodArity { method: String, count: usize },
}

/// Failure of a whole `get_sql_query` request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("{0}")]
    Validation(String),

    #[error("Unknown table '{0}'")]
    UnknownTable(String),

    #[error("Unsupported query: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Generate(#[from] GenerateError),
}
