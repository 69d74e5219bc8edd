//! Patch build orchestration
//!
//! Dispatches to the requested codec, derives artifact and manifest names
//! from version coordinates (or digest prefixes for hash-only patches), and
//! assembles the manifest. The creation timestamp is supplied by the caller
//! so builds stay deterministic and testable.

use crate::error::UpdateResult;
use apkdelta_formats::manifest::{
    ApkRawDetail, ApkZipDetail, Manifest, ManifestDetail, OpatchDetail,
};
use apkdelta_formats::version::format_with_patch;
use apkdelta_formats::{apkraw, apkzip, hash, opatch};
use std::path::PathBuf;
use tracing::info;

/// Which delta format to build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchFormat {
    /// `opatch-1`: generic fixed-block delta
    Opatch,
    /// `apkzip-1`: ZIP-entry-level delta
    ApkZip,
    /// `apkraw-1`: byte-exact raw record delta
    ApkRaw,
}

/// A request to build one patch
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Baseline file
    pub from: PathBuf,
    /// Target file
    pub to: PathBuf,
    /// Delta format to build
    pub format: PatchFormat,
    /// Baseline version, if version-addressed
    pub from_version: Option<String>,
    /// Target version, if version-addressed
    pub to_version: Option<String>,
    /// Baseline hot-patch index
    pub from_patch_index: Option<i64>,
    /// Target hot-patch index
    pub to_patch_index: Option<i64>,
    /// Block size for `opatch-1`
    pub block_size: u32,
    /// Repository the release will live in
    pub repo: String,
    /// Explicit release tag; derived from versions or digests when absent
    pub tag: Option<String>,
    /// Manifest creation time, Unix epoch seconds
    pub created_at: i64,
    /// Directory the patch and manifest are written into
    pub out_dir: PathBuf,
}

/// What a build produced
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    /// The assembled manifest
    pub manifest: Manifest,
    /// Where the manifest was written
    pub manifest_path: PathBuf,
    /// Where the patch artifact was written
    pub patch_path: PathBuf,
    /// Changed entries (`apkzip-1` builds only), sorted
    pub changed_files: Vec<String>,
    /// Deleted entries (`apkzip-1` builds only), sorted
    pub deleted_files: Vec<String>,
}

/// Build a patch and its manifest into `request.out_dir`
pub fn build_patch(request: &BuildRequest) -> UpdateResult<BuildOutcome> {
    let base_sha256 = hash::sha256_hex_file(&request.from)?;
    let target_sha256 = hash::sha256_hex_file(&request.to)?;
    let base_short = &base_sha256[..12];
    let target_short = &target_sha256[..12];

    let coords = VersionCoords::derive(request);
    let tag = request.tag.clone().unwrap_or_else(|| match &coords {
        Some(c) => format!("v{}", c.to_string_pair().1),
        None => format!("patch_{base_short}_{target_short}"),
    });

    let (patch_name, manifest_name) = artifact_names(
        request.format,
        coords.as_ref(),
        base_short,
        target_short,
    );

    std::fs::create_dir_all(&request.out_dir)?;
    let patch_path = request.out_dir.join(&patch_name);
    let manifest_path = request.out_dir.join(&manifest_name);

    info!("building {patch_name}");
    let (detail, changed_files, deleted_files) = match request.format {
        PatchFormat::Opatch => {
            let summary = opatch::build(&request.from, &request.to, &patch_path, request.block_size)?;
            (
                ManifestDetail::Opatch(OpatchDetail {
                    block_size: summary.block_size,
                }),
                Vec::new(),
                Vec::new(),
            )
        }
        PatchFormat::ApkZip => {
            let summary = apkzip::build(&request.from, &request.to, &patch_path)?;
            (
                ManifestDetail::ApkZip(ApkZipDetail {
                    base_zip_tree_sha256: summary.base_zip_tree_sha256,
                    target_zip_tree_sha256: summary.target_zip_tree_sha256,
                    target_entries: summary.target_entries,
                }),
                summary.changed_files,
                summary.deleted_files,
            )
        }
        PatchFormat::ApkRaw => {
            let summary = apkraw::build(&request.from, &request.to, &patch_path)?;
            (
                ManifestDetail::ApkRaw(ApkRawDetail {
                    apk_raw_entries: summary.entries,
                    apk_raw_tail_file: summary.tail_file,
                }),
                Vec::new(),
                Vec::new(),
            )
        }
    };

    let manifest = Manifest {
        repo: request.repo.clone(),
        tag,
        from_version: coords.as_ref().map(|c| c.from_version.clone()),
        to_version: coords.as_ref().map(|c| c.to_version.clone()),
        from_patch_index: coords.as_ref().map(|c| c.from_index),
        to_patch_index: coords.as_ref().map(|c| c.to_index),
        base_sha256,
        target_sha256,
        patch_file: patch_name,
        patch_sha256: hash::sha256_hex_file(&patch_path)?,
        created_at: request.created_at,
        detail,
    };
    manifest.write_to(&manifest_path)?;

    Ok(BuildOutcome {
        manifest,
        manifest_path,
        patch_path,
        changed_files,
        deleted_files,
    })
}

/// Fully defaulted version coordinates, present when `to_version` is set
struct VersionCoords {
    from_version: String,
    to_version: String,
    from_index: i64,
    to_index: i64,
}

impl VersionCoords {
    /// Apply the defaulting rules: a missing target index means 0, a
    /// missing baseline version means the target's, and a missing baseline
    /// index means "one patch back" for same-version builds.
    fn derive(request: &BuildRequest) -> Option<Self> {
        let to_version = request.to_version.clone()?;
        let to_index = request.to_patch_index.unwrap_or(0);
        let from_version = request
            .from_version
            .clone()
            .unwrap_or_else(|| to_version.clone());
        let from_index = request.from_patch_index.unwrap_or_else(|| {
            if from_version == to_version && to_index > 0 {
                to_index - 1
            } else {
                0
            }
        });
        Some(Self {
            from_version,
            to_version,
            from_index,
            to_index,
        })
    }

    fn to_string_pair(&self) -> (String, String) {
        (
            format_with_patch(&self.from_version, self.from_index),
            format_with_patch(&self.to_version, self.to_index),
        )
    }
}

fn artifact_names(
    format: PatchFormat,
    coords: Option<&VersionCoords>,
    base_short: &str,
    target_short: &str,
) -> (String, String) {
    match coords {
        Some(c) => {
            let (from_vs, to_vs) = c.to_string_pair();
            let patch = match format {
                PatchFormat::ApkRaw => {
                    format!("apkrawpatch_{from_vs}_to_{to_vs}_{base_short}_{target_short}.zip")
                }
                PatchFormat::ApkZip => {
                    format!("apkpatch_{from_vs}_to_{to_vs}_{base_short}_{target_short}.zip")
                }
                PatchFormat::Opatch => {
                    format!("opatch_{from_vs}_to_{to_vs}_{base_short}_{target_short}.opatch.gz")
                }
            };
            let manifest = format!("patch_{from_vs}_to_{to_vs}_{base_short}_{target_short}.json");
            (patch, manifest)
        }
        None => {
            let patch = match format {
                PatchFormat::ApkRaw => format!("apkrawpatch_{base_short}_{target_short}.zip"),
                PatchFormat::ApkZip => format!("apkpatch_{base_short}_{target_short}.zip"),
                PatchFormat::Opatch => format!("patch_{base_short}_{target_short}.opatch.gz"),
            };
            let manifest = format!("patch_{base_short}_{target_short}.json");
            (patch, manifest)
        }
    }
}
