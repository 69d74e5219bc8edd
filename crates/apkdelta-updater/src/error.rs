//! Error types for patch build and apply orchestration

use apkdelta_formats::apkraw::ApkRawError;
use apkdelta_formats::apkzip::ApkZipError;
use apkdelta_formats::manifest::ManifestError;
use apkdelta_formats::opatch::OpatchError;
use apkdelta_formats::rawzip::RawZipError;
use apkdelta_release::ReleaseError;
use thiserror::Error;

/// Error types for update operations
#[derive(Debug, Error)]
pub enum UpdateError {
    /// Local file's identity key does not equal the manifest's baseline key
    ///
    /// Not a hard failure: callers typically fall back to a full download.
    /// The chain applier never surfaces this; an unmatched baseline simply
    /// ends the chain.
    #[error("baseline mismatch: manifest expects {expected}, local file is {actual}")]
    BaselineMismatch {
        /// Baseline key from the manifest
        expected: String,
        /// Identity key of the local file
        actual: String,
    },

    /// Patch artifact digest does not match the manifest
    #[error("patch sha256 mismatch: manifest says {expected}, artifact is {actual}")]
    PatchIntegrity {
        /// Digest recorded in the manifest
        expected: String,
        /// Digest of the downloaded artifact
        actual: String,
    },

    /// Post-apply identity check failed
    #[error("target integrity failure: expected {expected}, produced {actual}")]
    TargetIntegrity {
        /// Target key from the manifest
        expected: String,
        /// Identity key of the produced file
        actual: String,
    },

    /// opatch codec failure
    #[error(transparent)]
    Opatch(#[from] OpatchError),

    /// apkzip codec failure
    #[error(transparent)]
    ApkZip(#[from] ApkZipError),

    /// apkraw codec failure
    #[error(transparent)]
    ApkRaw(#[from] ApkRawError),

    /// Manifest parse/serialize failure
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Structural ZIP parsing failure
    #[error(transparent)]
    RawZip(#[from] RawZipError),

    /// Catalog or artifact transfer failure
    #[error(transparent)]
    Release(#[from] ReleaseError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for update operations
pub type UpdateResult<T> = Result<T, UpdateError>;

impl UpdateError {
    /// Whether this error means "this patch does not apply here" rather
    /// than "something is broken"
    pub fn is_baseline_mismatch(&self) -> bool {
        matches!(self, Self::BaselineMismatch { .. })
    }
}
