//! Error types for release catalog and artifact operations

use thiserror::Error;

/// Error types for release operations
#[derive(Debug, Error)]
pub enum ReleaseError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned a non-success status that is not retryable
    #[error("API error {status} for {url}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Request URL
        url: String,
    },

    /// No release exists for a tag
    #[error("release not found for tag '{tag}'")]
    ReleaseNotFound {
        /// Release tag
        tag: String,
    },

    /// A named asset is missing from a release
    #[error("asset '{asset}' not found in release '{tag}'")]
    AssetNotFound {
        /// Release tag
        tag: String,
        /// Asset name
        asset: String,
    },

    /// No manifest could be recovered from a release
    #[error("release '{tag}' carries no patch manifest")]
    ManifestNotFound {
        /// Release tag
        tag: String,
    },

    /// Publishing requires a token and none was supplied or found
    #[error("no GitHub token: set GITHUB_TOKEN, GH_TOKEN or GITHUB_PAT")]
    MissingToken,

    /// Publishing would not strictly advance the patch chain
    #[error("version ordering violation: {from} -> {to} does not advance the chain")]
    VersionOrdering {
        /// Baseline version string
        from: String,
        /// Target version string
        to: String,
    },

    /// The manifest's baseline and target identities are equal
    #[error("refusing to publish a no-op patch (baseline and target keys are equal)")]
    NoOpPatch,

    /// Invalid URL construction
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The offending URL
        url: String,
    },

    /// Manifest parse/serialize failure
    #[error(transparent)]
    Manifest(#[from] apkdelta_formats::manifest::ManifestError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for release operations
pub type ReleaseResult<T> = Result<T, ReleaseError>;

impl ReleaseError {
    /// Create an invalid URL error
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }
}
