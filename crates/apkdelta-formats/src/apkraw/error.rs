//! apkraw error types

use crate::rawzip::RawZipError;
use thiserror::Error;

/// Errors raised while building or applying `apkraw-1` patches
#[derive(Debug, Error)]
pub enum ApkRawError {
    /// A `copy` recipe row names an entry the baseline does not have
    #[error("copy record '{name}' missing from baseline")]
    MissingBaselineRecord {
        /// Entry name
        name: String,
    },

    /// Reconstructed file digest differs from the manifest target
    #[error("target sha256 mismatch: expected {expected}, produced {actual}")]
    TargetDigestMismatch {
        /// Digest recorded in the manifest
        expected: String,
        /// Digest of the produced output
        actual: String,
    },

    /// ZIP error from the patch container
    #[error("patch container error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Structural ZIP parsing error
    #[error(transparent)]
    RawZip(#[from] RawZipError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for apkraw operations
pub type ApkRawResult<T> = Result<T, ApkRawError>;
