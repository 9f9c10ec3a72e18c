//! Error types for flow-edit
//!
//! These cover infrastructure failures (storage, network, configuration). A correction
//! that cannot be applied is not an error: it is reported as a
//! [`RejectReason`](crate::types::RejectReason) and leaves the buffer untouched.

use thiserror::Error;

/// Result type alias using flow-edit's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// All possible infrastructure errors in flow-edit
#[derive(Error, Debug)]
pub enum Error {
    #[error("Completion failed: {0}")]
    Completion(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("Typing failed: {0}")]
    Typing(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
