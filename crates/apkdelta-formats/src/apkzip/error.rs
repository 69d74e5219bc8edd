//! apkzip error types

use crate::rawzip::RawZipError;
use thiserror::Error;

/// Errors raised while building or applying `apkzip-1` patches
#[derive(Debug, Error)]
pub enum ApkZipError {
    /// Recipe entry found neither in the patch nor in the baseline
    #[error("entry '{name}' is in the rebuild recipe but neither in the patch nor the baseline")]
    MissingEntry {
        /// Entry name
        name: String,
    },

    /// Recipe names a compression method outside {{stored, deflated}}
    #[error("entry '{name}' uses unsupported compression method {method}")]
    UnsupportedMethod {
        /// Entry name
        name: String,
        /// Method value from the manifest
        method: u16,
    },

    /// Rebuilt archive's zip-tree signature differs from the manifest
    #[error("rebuilt zip tree mismatch: expected {expected}, produced {actual}")]
    TreeMismatch {
        /// Signature recorded in the manifest
        expected: String,
        /// Signature of the rebuilt archive
        actual: String,
    },

    /// ZIP archive error from the entry codec
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Structural ZIP parsing error
    #[error(transparent)]
    RawZip(#[from] RawZipError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for apkzip operations
pub type ApkZipResult<T> = Result<T, ApkZipError>;
