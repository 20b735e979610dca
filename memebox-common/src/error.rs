//! Common error types for memebox

use thiserror::Error;

/// Common result type for memebox operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across memebox crates
#[derive(Error, Debug)]
pub enum Error {
    /// Catalog could not be read, parsed, or written
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Search term missing or empty
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
