//! apkzip applier
//!
//! Rebuilds the target archive from the manifest recipe: each entry's bytes
//! come from the patch (`files/<name>`) when present, else from the baseline
//! under the same name. Output entries get the recipe's compression method
//! and a fixed 1980-01-01 00:00:00 timestamp, so the rebuilt archive is
//! structurally equivalent to the target without being byte-identical; only
//! the zip-tree signature is asserted. APK signing is expected to happen
//! downstream of this format.

use super::error::{ApkZipError, ApkZipResult};
use crate::manifest::ApkZipDetail;
use crate::rawzip::RawZip;
use std::fs::File;
use std::path::Path;
use tracing::debug;
use zip::CompressionMethod;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;

/// Apply an `apkzip-1` patch to `old_apk`, producing `out_path`
///
/// `out_path` is removed on every error path.
pub fn apply(
    old_apk: &Path,
    patch_zip: &Path,
    out_path: &Path,
    detail: &ApkZipDetail,
) -> ApkZipResult<()> {
    let result = apply_inner(old_apk, patch_zip, out_path, detail);
    if result.is_err() {
        let _ = std::fs::remove_file(out_path);
    }
    result
}

fn apply_inner(
    old_apk: &Path,
    patch_zip: &Path,
    out_path: &Path,
    detail: &ApkZipDetail,
) -> ApkZipResult<()> {
    let mut baseline = zip::ZipArchive::new(File::open(old_apk)?)?;
    let mut patch = zip::ZipArchive::new(File::open(patch_zip)?)?;
    let mut writer = zip::ZipWriter::new(File::create(out_path)?);

    let mut from_patch = 0usize;
    for entry in &detail.target_entries {
        let method = match entry.compress_type {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflated,
            other => {
                return Err(ApkZipError::UnsupportedMethod {
                    name: entry.name.clone(),
                    method: other,
                });
            }
        };
        let options = SimpleFileOptions::default()
            .compression_method(method)
            .last_modified_time(zip::DateTime::default());

        let patch_name = format!("files/{}", entry.name);
        match patch.by_name(&patch_name) {
            Ok(mut source) => {
                writer.start_file(entry.name.as_str(), options)?;
                std::io::copy(&mut source, &mut writer)?;
                from_patch += 1;
            }
            Err(ZipError::FileNotFound) => match baseline.by_name(&entry.name) {
                Ok(mut source) => {
                    writer.start_file(entry.name.as_str(), options)?;
                    std::io::copy(&mut source, &mut writer)?;
                }
                Err(ZipError::FileNotFound) => {
                    return Err(ApkZipError::MissingEntry {
                        name: entry.name.clone(),
                    });
                }
                Err(err) => return Err(err.into()),
            },
            Err(err) => return Err(err.into()),
        }
    }

    let file = writer.finish()?;
    file.sync_all()?;
    drop(file);
    debug!(
        "rebuilt {} entries ({from_patch} from patch)",
        detail.target_entries.len()
    );

    let actual = RawZip::open(out_path)?.tree_signature();
    if actual != detail.target_zip_tree_sha256 {
        return Err(ApkZipError::TreeMismatch {
            expected: detail.target_zip_tree_sha256.clone(),
            actual,
        });
    }
    Ok(())
}
