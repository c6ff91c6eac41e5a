//! Error types for storage handles and root management.

use std::io;

use thiserror::Error;

/// Errors raised by storage backends and the root registry.
#[derive(Debug, Error)]
pub enum FsError {
    /// No entry exists at the path.
    #[error("not found: {path}")]
    NotFound { path: String },

    /// The entry exists but is of the other kind (file vs directory).
    #[error("{path} is not a {expected}")]
    TypeMismatch { path: String, expected: &'static str },

    /// The backing store refused access.
    #[error("permission denied: {path}")]
    PermissionDenied { path: String },

    /// A directory still has children and the removal was not recursive.
    #[error("directory not empty: {path}")]
    NotEmpty { path: String },

    /// An entry name was empty, a dot segment, or contained a separator.
    #[error("invalid entry name: {name:?}")]
    InvalidName { name: String },

    /// The operation is not available on this backend.
    #[error("unsupported operation: {operation}")]
    Unsupported { operation: String },

    /// The durable key-value store could not be read or written.
    #[error("persistence failed: {message}")]
    Persist { message: String },

    /// Any other I/O failure.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FsError {
    /// Map an I/O error onto the typed variants where possible.
    pub fn from_io(err: io::Error, path: impl Into<String>) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => FsError::NotFound { path: path.into() },
            io::ErrorKind::PermissionDenied => FsError::PermissionDenied { path: path.into() },
            _ => FsError::Io(err),
        }
    }

    /// True for errors that mean "nothing there".
    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound { .. })
    }
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, FsError>;
