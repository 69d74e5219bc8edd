//! Publish gating and release notes
//!
//! A published chain must strictly advance: within one base version every
//! new patch needs a higher patch index than its baseline, and a patch whose
//! baseline and target identities are equal is never publishable. Full
//! releases (patch index 0, tag without a `+N` suffix) escape the index
//! check because they start a fresh chain rather than extend one.

use crate::error::{ReleaseError, ReleaseResult};
use apkdelta_formats::Manifest;
use apkdelta_formats::version::{Version, format_with_patch};

/// Check that publishing `manifest` would strictly advance the chain
pub fn ensure_publishable(manifest: &Manifest) -> ReleaseResult<()> {
    if manifest.baseline_key() == manifest.target_key() {
        return Err(ReleaseError::NoOpPatch);
    }

    let to_index = manifest.to_patch_index.unwrap_or(0);
    let release_escape = to_index == 0 && !manifest.tag.contains('+');
    if release_escape {
        return Ok(());
    }

    if let (Some(from_v), Some(to_v)) = (
        manifest.from_version.as_deref(),
        manifest.to_version.as_deref(),
    ) {
        let from_index = manifest.from_patch_index.unwrap_or(0);
        if Version::parse(from_v) == Version::parse(to_v) && to_index <= from_index {
            return Err(ReleaseError::VersionOrdering {
                from: format_with_patch(from_v, from_index),
                to: format_with_patch(to_v, to_index),
            });
        }
    }
    Ok(())
}

/// Render the release-notes body: the manifest envelope as sorted JSON
///
/// The notes double as a machine-readable manifest copy, which lets the
/// catalog walker skip the asset download for releases published this way.
pub fn release_notes(manifest: &Manifest, manifest_file: &str) -> ReleaseResult<String> {
    let value = serde_json::to_value(manifest).map_err(apkdelta_formats::manifest::ManifestError::from)?;
    let mut notes = serde_json::Map::new();
    for key in [
        "format",
        "tag",
        "fromVersion",
        "toVersion",
        "fromPatchIndex",
        "toPatchIndex",
        "baseSha256",
        "targetSha256",
        "patchFile",
        "patchSha256",
        "createdAt",
    ] {
        if let Some(v) = value.get(key) {
            notes.insert(key.to_string(), v.clone());
        }
    }
    notes.insert(
        "metaFile".to_string(),
        serde_json::Value::String(manifest_file.to_string()),
    );
    serde_json::to_string_pretty(&serde_json::Value::Object(notes))
        .map_err(|e| ReleaseError::Manifest(e.into()))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use apkdelta_formats::manifest::{ManifestDetail, OpatchDetail};

    fn manifest(
        from_version: &str,
        from_index: i64,
        to_version: &str,
        to_index: i64,
        tag: &str,
    ) -> Manifest {
        Manifest {
            repo: "o/r".to_string(),
            tag: tag.to_string(),
            from_version: Some(from_version.to_string()),
            to_version: Some(to_version.to_string()),
            from_patch_index: Some(from_index),
            to_patch_index: Some(to_index),
            base_sha256: "a".repeat(64),
            target_sha256: "b".repeat(64),
            patch_file: "p.opatch.gz".to_string(),
            patch_sha256: "c".repeat(64),
            created_at: 1_700_000_000,
            detail: ManifestDetail::Opatch(OpatchDetail { block_size: 4096 }),
        }
    }

    #[test]
    fn test_patch_build_must_advance_index() {
        assert!(ensure_publishable(&manifest("1.0.0", 0, "1.0.0", 1, "v1.0.0+1")).is_ok());
        assert!(matches!(
            ensure_publishable(&manifest("1.0.0", 1, "1.0.0", 1, "v1.0.0+1")),
            Err(ReleaseError::VersionOrdering { .. })
        ));
        assert!(matches!(
            ensure_publishable(&manifest("1.0.0", 2, "1.0.0", 1, "v1.0.0+1")),
            Err(ReleaseError::VersionOrdering { .. })
        ));
    }

    #[test]
    fn test_release_escape() {
        // A full release restarts the chain at index 0 with a plain tag.
        assert!(ensure_publishable(&manifest("1.0.0", 3, "1.1.0", 0, "v1.1.0")).is_ok());
        // Same shape but a plus-suffixed tag is a patch build and must advance.
        assert!(matches!(
            ensure_publishable(&manifest("1.0.0", 3, "1.0.0", 0, "v1.0.0+0")),
            Err(ReleaseError::VersionOrdering { .. })
        ));
    }

    #[test]
    fn test_noop_patch_rejected() {
        let mut m = manifest("1.0.0", 0, "1.0.0", 1, "v1.0.0+1");
        m.target_sha256 = m.base_sha256.clone();
        assert!(matches!(
            ensure_publishable(&m),
            Err(ReleaseError::NoOpPatch)
        ));
    }

    #[test]
    fn test_version_bump_allows_any_index() {
        assert!(ensure_publishable(&manifest("1.0.0", 5, "1.0.1", 1, "v1.0.1+1")).is_ok());
    }

    #[test]
    fn test_release_notes_shape() {
        let notes =
            release_notes(&manifest("1.0.0", 0, "1.0.0", 1, "v1.0.0+1"), "meta.json").unwrap();
        let value: serde_json::Value = serde_json::from_str(&notes).unwrap();
        assert_eq!(value["format"], "opatch-1");
        assert_eq!(value["metaFile"], "meta.json");
        assert_eq!(value["toPatchIndex"], 1);
        assert!(value.get("blockSize").is_none());
    }
}
