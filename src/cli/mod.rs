//! CLI support for recordql
//!
//! Programmatic access to the command-line operations, so tools embedding
//! the compiler can run them without spawning the binary.

mod compile;

pub use compile::{CompileOptions, ParseOptions, execute_compile, execute_parse, parse_env};

use std::io;

/// Errors that can occur during CLI operations
#[derive(Debug)]
pub enum CliError {
    /// Query compilation error
    Query(crate::QueryError),
    /// Expression parse error
    Parse(crate::ParseError),
    /// Invalid JSON for the constant environment
    Json(serde_json::Error),
    /// Environment JSON that is not an object
    EnvNotObject,
    /// IO error
    Io(io::Error),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Query(e) => write!(f, "Query error: {}", e),
            CliError::Parse(e) => write!(f, "Parse error: {}", e),
            CliError::Json(e) => write!(f, "Invalid JSON: {}", e),
            CliError::EnvNotObject => write!(f, "The environment must be a JSON object"),
            CliError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Query(e) => Some(e),
            CliError::Parse(e) => Some(e),
            CliError::Json(e) => Some(e),
            CliError::Io(e) => Some(e),
            CliError::EnvNotObject => None,
        }
    }
}

impl From<crate::QueryError> for CliError {
    fn from(e: crate::QueryError) -> Self {
        CliError::Query(e)
    }
}

impl From<crate::ParseError> for CliError {
    fn from(e: crate::ParseError) -> Self {
        CliError::Parse(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Json(e)
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e)
    }
}
