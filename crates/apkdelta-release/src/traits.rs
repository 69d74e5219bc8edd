//! Injected collaborator traits
//!
//! The patch core never talks to a catalog or an artifact store directly;
//! callers inject implementations of these traits. The production
//! implementation is [`crate::GithubReleases`]; tests inject local or
//! in-memory sources.

use crate::error::ReleaseResult;
use apkdelta_formats::Manifest;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Discovers published patch manifests and fetches their artifacts
#[async_trait]
pub trait ManifestSource: Send + Sync {
    /// List every reachable manifest, in catalog order
    ///
    /// Catalog order is significant: the chain applier breaks target-version
    /// ties in favor of earlier entries.
    async fn catalog(&self) -> ReleaseResult<Vec<Manifest>>;

    /// Download a manifest's patch artifact to `dest`
    async fn fetch_artifact(&self, manifest: &Manifest, dest: &Path) -> ReleaseResult<()>;
}

/// Uploads a finished patch release (manifest + artifact)
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Publish `assets` under the release described by `draft`
    ///
    /// Creates the release when the tag does not exist yet; replaces
    /// same-named assets when it does.
    async fn publish(&self, draft: &ReleaseDraft, assets: &[PathBuf]) -> ReleaseResult<()>;
}

/// Coordinates of a release to create or update
#[derive(Debug, Clone)]
pub struct ReleaseDraft {
    /// Git tag the release is attached to
    pub tag: String,
    /// Human-readable release title
    pub title: String,
    /// Release notes body
    pub notes: String,
}
