//! Error types for rowpipe-common

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CommonError>;

#[derive(Error, Debug)]
pub enum CommonError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {name}: {value:?} ({reason})")]
    InvalidVar {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Invalid logging setting: {0}")]
    Logging(String),
}
