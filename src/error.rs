//! Error types for the Folio portfolio backend.

use thiserror::Error;

/// Storage-related errors (document store, blob store, session persistence)
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Duplicate image id: {0}")]
    DuplicateId(u64),

    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Unavailable(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Top-level errors surfaced by services, the CLI, and the HTTP layer
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown tag: {0}")]
    UnknownTag(String),

    #[error("Not signed in: {0}")]
    Unauthorized(String),

    #[error("Sign-in failed: {0}")]
    AuthFailed(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Geolocation failed: {0}")]
    GeolocationFailed(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    ServerError(String),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
