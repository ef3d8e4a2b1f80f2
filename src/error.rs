//! Error types for script reading, splitting and execution

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type for sqlrun operations
pub type Result<T> = std::result::Result<T, ScriptError>;

/// Errors surfaced by the reader, scanner, orchestrator and collaborators.
///
/// Lexical anomalies (unterminated comments or literals) are not errors;
/// the scanner absorbs them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScriptError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("File not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("File not readable: {} ({reason})", path.display())]
    NotReadable { path: PathBuf, reason: String },

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Unknown database dialect: {0}")]
    UnknownDialect(String),

    #[error("Timed out after {waited:?} waiting for parse results")]
    Timeout { waited: Duration },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Credential error: {0}")]
    Credential(String),
}

impl ScriptError {
    /// Process exit status for the command line: 1 database, 2 invalid input, 3 other.
    pub fn exit_code(&self) -> i32 {
        match self {
            ScriptError::Database(_) => 1,
            ScriptError::InvalidArgument(_)
            | ScriptError::NotFound { .. }
            | ScriptError::NotReadable { .. }
            | ScriptError::MalformedInput(_)
            | ScriptError::UnknownDialect(_) => 2,
            ScriptError::Timeout { .. } | ScriptError::Config(_) | ScriptError::Credential(_) => 3,
        }
    }
}

impl From<oracle::Error> for ScriptError {
    fn from(err: oracle::Error) -> Self {
        ScriptError::Database(err.to_string())
    }
}

impl From<keyring::Error> for ScriptError {
    fn from(err: keyring::Error) -> Self {
        ScriptError::Credential(err.to_string())
    }
}
