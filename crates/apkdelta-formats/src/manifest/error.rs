//! Manifest error types

use thiserror::Error;

/// Errors raised while parsing, validating or writing manifests
#[derive(Debug, Error)]
pub enum ManifestError {
    /// JSON syntax error, unknown `format` tag, or missing required field
    #[error("malformed manifest: {0}")]
    Json(#[from] serde_json::Error),

    /// A digest field is not lowercase hex of the expected width
    #[error("field {field} is not a {expected_len}-char lowercase hex digest: '{value}'")]
    InvalidDigest {
        /// Manifest field name
        field: &'static str,
        /// Offending value
        value: String,
        /// Expected hex length
        expected_len: usize,
    },

    /// An `add`-mode raw entry has no record path
    #[error("apkraw entry '{name}' has mode 'add' but no recordPath")]
    MissingRecordPath {
        /// Entry name
        name: String,
    },

    /// A required non-digest field is empty
    #[error("manifest field {field} must not be empty")]
    EmptyField {
        /// Manifest field name
        field: &'static str,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for manifest operations
pub type ManifestResult<T> = Result<T, ManifestError>;
