//! Error types for the medicab_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for medicab_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// User input rejected at the boundary
    #[error("Invalid input: {0}")]
    Validation(String),

    /// No authenticated session was supplied
    #[error("Unauthorized. Please login first.")]
    Unauthorized,

    /// The record exists but belongs to another user
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The record does not exist (or is not visible to the caller)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Store file is unreadable or inconsistent
    #[error("Store error: {0}")]
    Store(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
