//! Single-patch application pipeline
//!
//! Verification order: patch artifact digest, then baseline identity, then
//! the codec's own checks while it writes a temporary output, then the
//! manifest's target key, and only then the atomic rename onto the
//! destination. A failure at any point removes the temporary file and
//! leaves the destination untouched, so cancellation or crash mid-apply is
//! always safe.

use crate::error::{UpdateError, UpdateResult};
use apkdelta_formats::manifest::{Manifest, ManifestDetail};
use apkdelta_formats::rawzip::RawZip;
use apkdelta_formats::{apkraw, apkzip, hash, opatch};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Apply a manifest's patch to `baseline`, producing `dest`
///
/// `patch` must already be on disk (downloaded or local). `dest` may equal
/// `baseline`; the baseline is fully consumed before the rename happens.
pub fn apply_manifest(
    manifest: &Manifest,
    baseline: &Path,
    patch: &Path,
    dest: &Path,
) -> UpdateResult<()> {
    // 1. The artifact must be exactly what the manifest was built for.
    let patch_sha = hash::sha256_hex_file(patch)?;
    if patch_sha != manifest.patch_sha256 {
        return Err(UpdateError::PatchIntegrity {
            expected: manifest.patch_sha256.clone(),
            actual: patch_sha,
        });
    }

    // 2. The local file must be the baseline the patch was built against.
    let local_key = local_baseline_key(manifest, baseline)?;
    if local_key != manifest.baseline_key() {
        return Err(UpdateError::BaselineMismatch {
            expected: manifest.baseline_key().to_string(),
            actual: local_key,
        });
    }

    // 3. Codec apply into a temporary sibling of the destination.
    let tmp = temp_output(dest);
    debug!("applying {} patch into {}", manifest.format_name(), tmp.display());
    match &manifest.detail {
        ManifestDetail::Opatch(_) => {
            let header = opatch::apply(baseline, patch, &tmp)?;
            // The embedded target digest was verified against the output;
            // tie it back to the manifest's own claim.
            let produced = hex::encode(header.target_sha256);
            if produced != manifest.target_sha256 {
                let _ = std::fs::remove_file(&tmp);
                return Err(UpdateError::TargetIntegrity {
                    expected: manifest.target_sha256.clone(),
                    actual: produced,
                });
            }
        }
        ManifestDetail::ApkZip(detail) => {
            apkzip::apply(baseline, patch, &tmp, detail)?;
        }
        ManifestDetail::ApkRaw(detail) => {
            apkraw::apply(baseline, patch, &tmp, detail, &manifest.target_sha256)?;
        }
    }

    // 4. Atomic replace.
    std::fs::rename(&tmp, dest).inspect_err(|_| {
        let _ = std::fs::remove_file(&tmp);
    })?;
    info!(
        "applied {} ({} -> {})",
        manifest.tag,
        manifest.baseline_key(),
        manifest.target_key()
    );
    Ok(())
}

/// Compute the local file's identity key in the manifest's metric
fn local_baseline_key(manifest: &Manifest, baseline: &Path) -> UpdateResult<String> {
    match manifest.detail {
        ManifestDetail::ApkZip(_) => Ok(RawZip::open(baseline)?.tree_signature()),
        ManifestDetail::Opatch(_) | ManifestDetail::ApkRaw(_) => {
            Ok(hash::sha256_hex_file(baseline)?)
        }
    }
}

/// `<dest>.tmp`, next to the destination so the final rename stays on one
/// filesystem
fn temp_output(dest: &Path) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}
