//! Patch-chain walking
//!
//! Given a local baseline and a catalog of manifests, repeatedly select the
//! best applicable patch and apply it until nothing matches the current
//! identity. Each iteration recomputes both identity keys of the work file,
//! so a chain may freely mix formats: an `opatch-1` step changes the raw
//! digest, and the following step may match it via either metric.
//!
//! Termination: publishers never emit no-op patches, so every applied patch
//! changes the identity key, and the walk is additionally capped at the
//! catalog length to survive a pathological catalog.

use crate::applier::apply_manifest;
use crate::error::UpdateResult;
use apkdelta_formats::{LocalIdentity, Manifest};
use apkdelta_release::ManifestSource;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name of the intermediate work file inside the work directory
const WORK_FILE: &str = "apkdelta_work.apk";

/// What a chain walk did
#[derive(Debug, Clone)]
pub struct ChainOutcome {
    /// Number of patches applied
    pub applied: usize,
    /// Tags of the applied patches, in order
    pub tags: Vec<String>,
}

impl ChainOutcome {
    /// Whether the walk reached a new file
    pub fn upgraded(&self) -> bool {
        self.applied > 0
    }
}

/// Walks a catalog of manifests from a local baseline to the latest
/// reachable target
pub struct ChainApplier<'a, S: ManifestSource + ?Sized> {
    source: &'a S,
    work_dir: PathBuf,
    keep_artifacts: bool,
}

impl<'a, S: ManifestSource + ?Sized> ChainApplier<'a, S> {
    /// Create a chain applier that stages downloads in `work_dir`
    pub fn new(source: &'a S, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            source,
            work_dir: work_dir.into(),
            keep_artifacts: false,
        }
    }

    /// Keep downloaded patch artifacts in the work directory after the walk
    ///
    /// By default every artifact the walk downloaded is removed once the
    /// walk finishes; patches that were already on disk are left alone
    /// either way.
    pub fn with_keep_artifacts(mut self, keep: bool) -> Self {
        self.keep_artifacts = keep;
        self
    }

    /// Upgrade `baseline` as far as the catalog reaches, writing `output`
    ///
    /// Returns `applied == 0` (and writes nothing) when no manifest's
    /// baseline matches the local file; callers treat that as "fall back to
    /// a full download". The baseline itself is never modified.
    pub async fn upgrade(&self, baseline: &Path, output: &Path) -> UpdateResult<ChainOutcome> {
        let catalog = self.source.catalog().await?;
        debug!("catalog holds {} manifests", catalog.len());

        std::fs::create_dir_all(&self.work_dir)?;
        let work = self.work_dir.join(WORK_FILE);
        std::fs::copy(baseline, &work)?;

        let mut downloaded = Vec::new();
        let result = self.walk(&catalog, &work, &mut downloaded).await;

        if !self.keep_artifacts {
            for path in &downloaded {
                let _ = std::fs::remove_file(path);
            }
        }

        match result {
            Ok(outcome) if outcome.upgraded() => {
                let _ = std::fs::remove_file(output);
                std::fs::rename(&work, output)?;
                info!(
                    "upgraded via {} patch(es): {}",
                    outcome.applied,
                    outcome.tags.join(" -> ")
                );
                Ok(outcome)
            }
            Ok(outcome) => {
                let _ = std::fs::remove_file(&work);
                info!("no applicable patch for the current baseline");
                Ok(outcome)
            }
            Err(err) => {
                let _ = std::fs::remove_file(&work);
                Err(err)
            }
        }
    }

    async fn walk(
        &self,
        catalog: &[Manifest],
        work: &Path,
        downloaded: &mut Vec<PathBuf>,
    ) -> UpdateResult<ChainOutcome> {
        let mut outcome = ChainOutcome {
            applied: 0,
            tags: Vec::new(),
        };

        // Every applied patch changes the identity, so |catalog| bounds any
        // real chain; the explicit cap defends against one that lies.
        for _ in 0..catalog.len() {
            let local = LocalIdentity::of(work)?;
            let Some(manifest) = select_candidate(catalog, &local) else {
                break;
            };

            let patch_path = self.work_dir.join(&manifest.patch_file);
            if !patch_path.exists() {
                debug!("downloading {}", manifest.patch_file);
                self.source.fetch_artifact(manifest, &patch_path).await?;
                downloaded.push(patch_path.clone());
            }

            apply_manifest(manifest, work, &patch_path, work)?;
            outcome.applied += 1;
            outcome.tags.push(manifest.tag.clone());
        }

        Ok(outcome)
    }
}

/// Pick the matching manifest with the highest target version
///
/// Ties keep the first candidate in catalog order (strictly-greater scan).
fn select_candidate<'m>(catalog: &'m [Manifest], local: &LocalIdentity) -> Option<&'m Manifest> {
    let mut best: Option<&Manifest> = None;
    for manifest in catalog {
        if !manifest.matches_baseline(local) {
            continue;
        }
        match best {
            Some(current) if manifest.target_version() <= current.target_version() => {}
            _ => best = Some(manifest),
        }
    }
    best
}
