//! Patch manifest: the JSON sidecar published next to every patch artifact
//!
//! A manifest names the release coordinates, the baseline and target
//! identities, the patch artifact and its digest, plus the per-format
//! application recipe. The `format` key tags which of the three delta
//! formats the artifact uses:
//!
//! - `opatch-1`: generic fixed-block delta, identity is the raw SHA-256
//! - `apkzip-1`: ZIP-entry-level delta, identity is the zip-tree signature
//! - `apkraw-1`: raw ZIP-record delta, identity is the raw SHA-256
//!
//! Manifests are written with sorted keys and 2-space indentation, read
//! tolerantly (unknown keys ignored, key order irrelevant), and rejected
//! when the `format` value is unknown or a per-format field is missing.

use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod error;

pub use error::{ManifestError, ManifestResult};

/// One published patch: envelope plus format-specific recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Repository the release lives in, `owner/name`
    pub repo: String,
    /// Release tag the artifacts are attached to
    pub tag: String,
    /// Baseline version, if the patch is version-addressed
    pub from_version: Option<String>,
    /// Target version, if the patch is version-addressed
    pub to_version: Option<String>,
    /// Baseline hot-patch index within `from_version`
    pub from_patch_index: Option<i64>,
    /// Target hot-patch index within `to_version`
    pub to_patch_index: Option<i64>,
    /// SHA-256 of the baseline file, lowercase hex
    pub base_sha256: String,
    /// SHA-256 of the target file, lowercase hex
    pub target_sha256: String,
    /// Name of the patch artifact in the same release
    pub patch_file: String,
    /// SHA-256 of the patch artifact, lowercase hex
    pub patch_sha256: String,
    /// Creation time, Unix epoch seconds
    pub created_at: i64,
    /// Format tag and per-format recipe
    #[serde(flatten)]
    pub detail: ManifestDetail,
}

/// Per-format recipe, tagged by the `format` key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format")]
pub enum ManifestDetail {
    /// Generic fixed-block delta
    #[serde(rename = "opatch-1")]
    Opatch(OpatchDetail),
    /// ZIP-entry-level delta
    #[serde(rename = "apkzip-1")]
    ApkZip(ApkZipDetail),
    /// Raw ZIP-record delta
    #[serde(rename = "apkraw-1")]
    ApkRaw(ApkRawDetail),
}

/// `opatch-1` recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpatchDetail {
    /// Block granularity the patch was built with
    pub block_size: u32,
}

/// `apkzip-1` recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApkZipDetail {
    /// Zip-tree signature of the baseline
    pub base_zip_tree_sha256: String,
    /// Zip-tree signature of the target
    pub target_zip_tree_sha256: String,
    /// Every non-directory target entry, in target order
    pub target_entries: Vec<TargetEntry>,
}

/// `apkraw-1` recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApkRawDetail {
    /// Record recipe, in target local-record order
    pub apk_raw_entries: Vec<RawEntry>,
    /// Name of the tail blob inside the patch (central dir + EOCD)
    pub apk_raw_tail_file: String,
}

/// One rebuild row for `apkzip-1`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetEntry {
    /// Entry name
    pub name: String,
    /// Compression method for the rebuilt entry (0 = stored, 8 = deflated)
    pub compress_type: u16,
}

/// One record row for `apkraw-1`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEntry {
    /// Entry name
    pub name: String,
    /// Where the record bytes come from
    pub mode: RawMode,
    /// Path of the record blob inside the patch, for `add` rows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_path: Option<String>,
}

/// Source of a raw record's bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawMode {
    /// Reuse the identically-named record from the baseline
    Copy,
    /// Read the record bytes from the patch artifact
    Add,
}

impl Manifest {
    /// The wire name of this manifest's format
    pub fn format_name(&self) -> &'static str {
        match self.detail {
            ManifestDetail::Opatch(_) => "opatch-1",
            ManifestDetail::ApkZip(_) => "apkzip-1",
            ManifestDetail::ApkRaw(_) => "apkraw-1",
        }
    }

    /// Effective target version for chain ordering
    ///
    /// Hash-only manifests (no `toVersion`) sort as `0.0.0`.
    pub fn target_version(&self) -> Version {
        Version::from_manifest_fields(self.to_version.as_deref(), self.to_patch_index)
    }

    /// Parse from JSON, rejecting unknown formats and invalid digests
    pub fn from_json(json: &str) -> ManifestResult<Self> {
        let manifest: Self = serde_json::from_str(json)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Read and parse a manifest file
    pub fn read_from(path: &Path) -> ManifestResult<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Serialize with sorted keys and 2-space indentation
    pub fn to_json(&self) -> ManifestResult<String> {
        self.validate()?;
        let value = sort_keys(serde_json::to_value(self)?);
        Ok(serde_json::to_string_pretty(&value)?)
    }

    /// Validate and write the manifest to a file
    pub fn write_to(&self, path: &Path) -> ManifestResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Structural validation beyond what serde enforces
    pub fn validate(&self) -> ManifestResult<()> {
        check_hex("baseSha256", &self.base_sha256, 64)?;
        check_hex("targetSha256", &self.target_sha256, 64)?;
        check_hex("patchSha256", &self.patch_sha256, 64)?;
        if self.patch_file.is_empty() {
            return Err(ManifestError::EmptyField {
                field: "patchFile",
            });
        }
        if self.tag.is_empty() {
            return Err(ManifestError::EmptyField { field: "tag" });
        }

        match &self.detail {
            ManifestDetail::Opatch(_) => {}
            ManifestDetail::ApkZip(detail) => {
                check_hex("baseZipTreeSha256", &detail.base_zip_tree_sha256, 64)?;
                check_hex("targetZipTreeSha256", &detail.target_zip_tree_sha256, 64)?;
            }
            ManifestDetail::ApkRaw(detail) => {
                for entry in &detail.apk_raw_entries {
                    if entry.mode == RawMode::Add && entry.record_path.is_none() {
                        return Err(ManifestError::MissingRecordPath {
                            name: entry.name.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// Recursively rebuild a JSON value with object keys in sorted order
fn sort_keys(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut entries: Vec<(String, serde_json::Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = serde_json::Map::new();
            for (key, value) in entries {
                sorted.insert(key, sort_keys(value));
            }
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(sort_keys).collect())
        }
        other => other,
    }
}

fn check_hex(field: &'static str, value: &str, expected_len: usize) -> ManifestResult<()> {
    let ok = value.len() == expected_len
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if ok {
        Ok(())
    } else {
        Err(ManifestError::InvalidDigest {
            field,
            value: value.to_string(),
            expected_len,
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SHA_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const SHA_B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
    const SHA_C: &str = "cccccccccccccccccccccccccccccccccccccccccccccccccccccccccccccccc";

    fn opatch_manifest() -> Manifest {
        Manifest {
            repo: "example/releases".to_string(),
            tag: "v1.0.0+1".to_string(),
            from_version: Some("1.0.0".to_string()),
            to_version: Some("1.0.0".to_string()),
            from_patch_index: Some(0),
            to_patch_index: Some(1),
            base_sha256: SHA_A.to_string(),
            target_sha256: SHA_B.to_string(),
            patch_file: "opatch_1.0.0_to_1.0.0+1.opatch.gz".to_string(),
            patch_sha256: SHA_C.to_string(),
            created_at: 1_700_000_000,
            detail: ManifestDetail::Opatch(OpatchDetail { block_size: 4096 }),
        }
    }

    #[test]
    fn test_round_trip() {
        let manifest = opatch_manifest();
        let json = manifest.to_json().unwrap();
        let parsed = Manifest::from_json(&json).unwrap();
        assert_eq!(parsed, manifest);
    }

    #[test]
    fn test_output_is_sorted_and_indented() {
        let json = opatch_manifest().to_json().unwrap();
        let keys: Vec<&str> = json
            .lines()
            .filter_map(|l| l.trim_start().strip_prefix('"'))
            .filter_map(|l| l.split('"').next())
            .collect();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        assert_eq!(keys, sorted);
        assert!(json.contains("\n  \"format\": \"opatch-1\""));
    }

    #[test]
    fn test_determinism() {
        let manifest = opatch_manifest();
        assert_eq!(manifest.to_json().unwrap(), manifest.to_json().unwrap());
    }

    #[test]
    fn test_unknown_format_rejected() {
        let json = opatch_manifest().to_json().unwrap().replace("opatch-1", "opatch-9");
        assert!(matches!(
            Manifest::from_json(&json),
            Err(ManifestError::Json(_))
        ));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let mut value: serde_json::Value =
            serde_json::from_str(&opatch_manifest().to_json().unwrap()).unwrap();
        value["futureField"] = serde_json::json!({"nested": true});
        let parsed = Manifest::from_json(&value.to_string()).unwrap();
        assert_eq!(parsed, opatch_manifest());
    }

    #[test]
    fn test_missing_per_format_field_rejected() {
        let mut value: serde_json::Value =
            serde_json::from_str(&opatch_manifest().to_json().unwrap()).unwrap();
        value.as_object_mut().unwrap().remove("blockSize");
        assert!(Manifest::from_json(&value.to_string()).is_err());
    }

    #[test]
    fn test_uppercase_digest_rejected() {
        let mut manifest = opatch_manifest();
        manifest.base_sha256 = manifest.base_sha256.to_uppercase();
        assert!(matches!(
            manifest.to_json(),
            Err(ManifestError::InvalidDigest { field: "baseSha256", .. })
        ));
    }

    #[test]
    fn test_apkzip_detail_round_trip() {
        let manifest = Manifest {
            detail: ManifestDetail::ApkZip(ApkZipDetail {
                base_zip_tree_sha256: SHA_A.to_string(),
                target_zip_tree_sha256: SHA_B.to_string(),
                target_entries: vec![
                    TargetEntry {
                        name: "a.txt".to_string(),
                        compress_type: 0,
                    },
                    TargetEntry {
                        name: "b.txt".to_string(),
                        compress_type: 8,
                    },
                ],
            }),
            ..opatch_manifest()
        };
        let json = manifest.to_json().unwrap();
        assert!(json.contains("\"compressType\": 0"));
        assert_eq!(Manifest::from_json(&json).unwrap(), manifest);
    }

    #[test]
    fn test_apkraw_add_requires_record_path() {
        let manifest = Manifest {
            detail: ManifestDetail::ApkRaw(ApkRawDetail {
                apk_raw_entries: vec![RawEntry {
                    name: "classes.dex".to_string(),
                    mode: RawMode::Add,
                    record_path: None,
                }],
                apk_raw_tail_file: "tail.bin".to_string(),
            }),
            ..opatch_manifest()
        };
        assert!(matches!(
            manifest.validate(),
            Err(ManifestError::MissingRecordPath { .. })
        ));
    }

    #[test]
    fn test_hash_only_manifest_target_version() {
        let manifest = Manifest {
            from_version: None,
            to_version: None,
            from_patch_index: None,
            to_patch_index: None,
            ..opatch_manifest()
        };
        assert_eq!(manifest.target_version(), Version::default());
        // Null version fields survive the round trip.
        let parsed = Manifest::from_json(&manifest.to_json().unwrap()).unwrap();
        assert_eq!(parsed.to_version, None);
    }

    #[test]
    fn test_target_version_combines_index() {
        assert_eq!(
            opatch_manifest().target_version(),
            Version::parse("1.0.0+1")
        );
    }
}
