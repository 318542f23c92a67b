//! Error types for firefly-core

use thiserror::Error;

/// Main error type for the firefly-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Delivery error (network failure or non-2xx response)
    #[error("delivery error: {0}")]
    Delivery(String),

    /// Durable store error
    #[error("storage error: {0}")]
    Storage(String),

    /// The pipeline has been shut down; tracking is a producer bug
    #[error("pipeline is shut down")]
    Shutdown,
}

/// Result type alias for firefly-core
pub type Result<T> = std::result::Result<T, Error>;
