//! Error types for Vellum operations

use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Connection to {target} failed: {reason}")]
    ConnectionFailed { target: String, reason: String },

    #[error("Collection not found: {collection}")]
    CollectionNotFound { collection: String },

    #[error("Duplicate key in {collection} on index {index}")]
    DuplicateKey { collection: String, index: String },

    #[error("Insert failed for {collection}: {reason}")]
    InsertFailed { collection: String, reason: String },

    #[error("Index error on {index_name}: {reason}")]
    IndexError { index_name: String, reason: String },

    #[error("Serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("Memoized pipeline for {collection} has an unexpected type")]
    PipelineTypeMismatch { collection: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Options are for the {actual} backend, but the store is {expected}")]
    BackendMismatch { expected: String, actual: String },
}

/// Master error type for all Vellum errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VellumError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl From<serde_json::Error> for VellumError {
    fn from(e: serde_json::Error) -> Self {
        VellumError::Storage(StorageError::Serialization {
            reason: e.to_string(),
        })
    }
}

/// Result type alias for Vellum operations.
pub type VellumResult<T> = Result<T, VellumError>;

// =============================================================================
// TESTS
// =============================================================================
