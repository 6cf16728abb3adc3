//! settings-migrate error types

use std::path::PathBuf;
use thiserror::Error;

/// settings-migrate error type
#[derive(Error, Debug)]
pub enum Error {
    /// A legacy settings file could not be read
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An output or scratch file could not be written
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The sanitized module could not be split into statements
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// A recognized variable is bound to something other than a literal
    #[error("{name} on line {line} is not a literal value: {expression}")]
    UnsupportedValue {
        name: String,
        line: usize,
        expression: String,
    },

    /// A recognized variable is only assigned inside a block that may not run
    #[error("{name} on line {line} is assigned conditionally; its value depends on code that is not run")]
    ConditionalValue { name: String, line: usize },

    /// The required secret key is not defined by the legacy settings
    #[error("{0} is not defined in the legacy settings")]
    MissingSecretKey(String),

    /// Layout configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for settings-migrate operations
pub type Result<T> = std::result::Result<T, Error>;
