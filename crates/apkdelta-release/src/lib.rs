//! Release catalog discovery and artifact transfer for apkdelta
//!
//! The patch engine itself never performs network I/O; it works against the
//! [`ManifestSource`] and [`ArtifactSink`] traits defined here. The shipped
//! implementation, [`GithubReleases`], treats a GitHub repository's releases
//! as the patch catalog: every release carries a patch artifact and its JSON
//! manifest (in the release body or as a `.json` asset).
//!
//! Transient network failures, server errors and rate limiting are retried
//! with exponential backoff and jitter; client errors are surfaced
//! immediately. Publishing is gated by [`publish::ensure_publishable`] so a
//! patch that does not strictly advance its chain never reaches the catalog.

#![warn(missing_docs)]

pub mod error;
mod github;
/// Publish gating and release notes
pub mod publish;
mod traits;

pub use error::{ReleaseError, ReleaseResult};
pub use github::{GithubReleases, token_from_env};
pub use traits::{ArtifactSink, ManifestSource, ReleaseDraft};
