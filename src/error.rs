//! Error types for the key-value repository
//!
//! This module provides a unified error handling system using `thiserror` for
//! all components of the repository. Adapters and the repository itself never
//! return these errors directly from the CRUD surface: they are rendered into
//! [`OperationResult`](crate::result::OperationResult) messages, so every
//! failure a caller sees reads the same way regardless of which layer raised it.

use thiserror::Error;

/// The main error type for the repository crate
#[derive(Error, Debug)]
pub enum Error {
    /// Repository orchestration errors
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Stream storage errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Serialization/deserialization errors
    #[error("Serializer error: {0}")]
    Serializer(#[from] SerializerError),

    /// Key or value rejected by a validator
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        /// Human-readable description
        message: String,
    },

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A failed operation result converted into an error
    #[error("Operation failed: {message}")]
    OperationFailed {
        /// Human-readable description
        message: String,
    },
}

/// Repository-level error types
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Create targeted a key that is already stored
    #[error("{key} already exists in store")]
    AlreadyExists {
        /// Key that is already stored
        key: String,
    },

    /// The operation was cancelled before it completed
    #[error("Operation cancelled: {operation}")]
    Cancelled {
        /// Name of the operation
        operation: String,
    },

    /// The operation exceeded its configured deadline
    #[error("Operation timed out after {timeout_ms} ms: {operation}")]
    TimedOut {
        /// Name of the operation
        operation: String,
        /// Deadline that expired, in milliseconds
        timeout_ms: u64,
    },

    /// Persisting a fully serialized stream failed
    #[error("Failed to commit {key}: {reason}")]
    CommitFailed {
        /// Key whose value could not be persisted
        key: String,
        /// Underlying cause
        reason: String,
    },
}

/// Storage-specific error types
#[derive(Error, Debug)]
pub enum StorageError {
    /// Resource not found
    #[error("{resource} does not exist")]
    ResourceNotFound {
        /// Path or key of the resource
        resource: String,
    },

    /// Resource already exists
    #[error("{resource} already exists")]
    AlreadyExists {
        /// Path or key of the resource
        resource: String,
    },

    /// Storage operation failed
    #[error("Storage operation failed: {operation}: {reason}")]
    OperationFailed {
        /// Name of the operation
        operation: String,
        /// Underlying cause
        reason: String,
    },

    /// Permission denied
    #[error("Permission denied: {resource}")]
    PermissionDenied {
        /// Path or key of the resource
        resource: String,
    },

    /// Resource exceeds the configured size limit
    #[error("{resource} exceeds maximum size of {limit} bytes")]
    SizeLimitExceeded {
        /// Path or key of the resource
        resource: String,
        /// Configured limit in bytes
        limit: u64,
    },
}

/// Serializer-specific error types
#[derive(Error, Debug)]
pub enum SerializerError {
    /// Serialization failed
    #[error("Serialization failed: {reason}")]
    SerializationFailed {
        /// Underlying cause
        reason: String,
    },

    /// Deserialization failed
    #[error("Deserialization failed: {reason}")]
    DeserializationFailed {
        /// Underlying cause
        reason: String,
    },

    /// Reading or writing the stream failed
    #[error("Stream error: {reason}")]
    StreamError {
        /// Underlying cause
        reason: String,
    },
}

/// Validation error types
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Key rejected
    #[error("Invalid key {key}: {reason}")]
    InvalidKey {
        /// Rejected key
        key: String,
        /// Why the key was rejected
        reason: String,
    },

    /// Value rejected
    #[error("Invalid value: {reason}")]
    InvalidValue {
        /// Why the value was rejected
        reason: String,
    },
}

impl StorageError {
    /// Map an I/O error raised while touching `resource`
    pub fn from_io(operation: &str, resource: &str, error: &std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => StorageError::ResourceNotFound {
                resource: resource.to_string(),
            },
            std::io::ErrorKind::AlreadyExists => StorageError::AlreadyExists {
                resource: resource.to_string(),
            },
            std::io::ErrorKind::PermissionDenied => StorageError::PermissionDenied {
                resource: resource.to_string(),
            },
            _ => StorageError::OperationFailed {
                operation: operation.to_string(),
                reason: error.to_string(),
            },
        }
    }
}

/// Convenience type alias for Results
pub type Result<T> = std::result::Result<T, Error>;

/// Convenience type alias for Storage Results
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Convenience type alias for Serializer Results
pub type SerializerResult<T> = std::result::Result<T, SerializerError>;
