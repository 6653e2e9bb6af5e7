//! Error types for the grove metadata store.

use std::path::PathBuf;
use thiserror::Error;

/// Backend-level errors
///
/// Raised by codecs and the atomic write path. `PermissionDenied` is kept apart
/// from generic I/O so entity initialization can fall back to read-only access.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    #[error("State file not found: {0}")]
    NotFound(PathBuf),

    #[error("State file {path} is missing required field '{field}'")]
    MissingField { path: PathBuf, field: &'static str },

    #[error("Failed to encode state for {path}: {message}")]
    Encode { path: PathBuf, message: String },

    #[error("Failed to decode state from {path}: {message}")]
    Decode { path: PathBuf, message: String },

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl StorageError {
    /// Classify an I/O error raised while touching `path`.
    pub fn from_io(path: &std::path::Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => StorageError::PermissionDenied(path.to_path_buf()),
            std::io::ErrorKind::NotFound => StorageError::NotFound(path.to_path_buf()),
            _ => StorageError::IoError(std::io::Error::new(
                err.kind(),
                format!("{}: {}", path.display(), err),
            )),
        }
    }

    /// Whether this failure means the storage cannot be written.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, StorageError::PermissionDenied(_))
    }
}

/// Public API errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Only strings can be added as tags; tried to add {value} which is a {actual_type}")]
    InvalidTagType { value: String, actual_type: &'static str },

    #[error("Category keys must be strings; got {value} which is a {actual_type}")]
    InvalidKeyType { value: String, actual_type: &'static str },

    #[error("Category values must be ints, floats, strings, or bools; '{key}' got {value} which is a {actual_type}")]
    InvalidValueType {
        key: String,
        value: String,
        actual_type: &'static str,
    },

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Multiple state files found in {dir}: {}", .files.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", "))]
    MultipleMatchesFound { dir: PathBuf, files: Vec<PathBuf> },

    #[error("Permission denied; cannot write to {0}")]
    PermissionDenied(PathBuf),

    #[error("Timed out after {waited_ms} ms waiting for {mode} lock on {path}")]
    LockTimeout {
        path: PathBuf,
        mode: &'static str,
        waited_ms: u128,
    },

    #[error("Another thread is already upgrading its read of {path} to a write; release the read and retry")]
    UpgradeConflict { path: PathBuf },

    #[error("Missing '{field}' data, and cannot write to {path}")]
    MissingState { path: PathBuf, field: &'static str },

    #[error("Index {index} out of range for collection of {len} members")]
    IndexOutOfRange { index: isize, len: usize },

    #[error("Invalid index: {0}")]
    InvalidIndex(String),

    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::PermissionDenied(path) => ApiError::PermissionDenied(path),
            other => ApiError::Storage(other),
        }
    }
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

/// Name the kind of a dynamically typed value, for error messages.
pub(crate) fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(n) if n.is_f64() => "float",
        serde_json::Value::Number(_) => "int",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "list",
        serde_json::Value::Object(_) => "mapping",
    }
}
