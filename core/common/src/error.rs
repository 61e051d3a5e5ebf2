//! Common error types for clipdrive.

use thiserror::Error;

/// Top-level error type for clipdrive operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration is missing or malformed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Token artifact is missing, unreadable, or malformed.
    #[error("Token error: {0}")]
    Token(String),

    /// Authentication with the provider failed.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// The granted OAuth scope does not permit the requested operation.
    #[error("Insufficient OAuth scope: {0}")]
    InsufficientScope(String),

    /// Network or API request failed.
    #[error("Network error: {0}")]
    Network(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation denied by the provider.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
