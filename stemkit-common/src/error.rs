//! Common error types for stemkit

use thiserror::Error;

/// Common result type for stemkit operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the stemkit crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid caller input or parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Stem label that does not follow `<category>.<slug>`
    #[error("Invalid label: {0}")]
    InvalidLabel(String),

    /// JSON encode/decode failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
