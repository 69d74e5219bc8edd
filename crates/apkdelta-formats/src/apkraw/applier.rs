//! apkraw applier
//!
//! Streams the recipe's records into the output file in order (baseline
//! bytes for `copy` rows, patch bytes for `add` rows), appends the tail
//! blob, and verifies the whole file's SHA-256 against the manifest target.
//! The output is removed on every error path.

use super::error::{ApkRawError, ApkRawResult};
use crate::hash::Sha256TeeWriter;
use crate::manifest::{ApkRawDetail, RawMode};
use crate::rawzip::{RawZip, ZipEntry};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Apply an `apkraw-1` patch to `old_apk`, producing `out_path`
///
/// `expected_sha256` is the manifest's `targetSha256`; reconstruction is
/// byte-exact, so a raw digest comparison is the integrity check.
pub fn apply(
    old_apk: &Path,
    patch_zip: &Path,
    out_path: &Path,
    detail: &ApkRawDetail,
    expected_sha256: &str,
) -> ApkRawResult<()> {
    let result = apply_inner(old_apk, patch_zip, out_path, detail, expected_sha256);
    if result.is_err() {
        let _ = std::fs::remove_file(out_path);
    }
    result
}

fn apply_inner(
    old_apk: &Path,
    patch_zip: &Path,
    out_path: &Path,
    detail: &ApkRawDetail,
    expected_sha256: &str,
) -> ApkRawResult<()> {
    let mut old_raw = RawZip::open(old_apk)?;
    let old_entries: HashMap<String, ZipEntry> = old_raw
        .entries()
        .iter()
        .filter(|e| !e.is_dir())
        .map(|e| (e.name.clone(), e.clone()))
        .collect();

    let mut patch = zip::ZipArchive::new(File::open(patch_zip)?)?;
    let mut out = Sha256TeeWriter::new(File::create(out_path)?);

    let mut copied = 0usize;
    for row in &detail.apk_raw_entries {
        match row.mode {
            RawMode::Copy => {
                let entry = old_entries.get(&row.name).ok_or_else(|| {
                    ApkRawError::MissingBaselineRecord {
                        name: row.name.clone(),
                    }
                })?;
                let record = old_raw.read_local_record(entry)?;
                out.write_all(&record.bytes)?;
                copied += 1;
            }
            RawMode::Add => {
                // Manifest validation guarantees a record path on add rows.
                let record_path = row.record_path.as_deref().unwrap_or_default();
                let mut source = patch.by_name(record_path)?;
                std::io::copy(&mut source, &mut out)?;
            }
        }
    }

    let mut tail = patch.by_name(&detail.apk_raw_tail_file)?;
    std::io::copy(&mut tail, &mut out)?;

    let (file, written, digest) = out.finish();
    file.sync_all()?;
    drop(file);

    let actual = hex::encode(digest);
    if actual != expected_sha256 {
        return Err(ApkRawError::TargetDigestMismatch {
            expected: expected_sha256.to_string(),
            actual,
        });
    }

    debug!(
        "reconstructed {written} bytes from {} records ({copied} copied from baseline)",
        detail.apk_raw_entries.len()
    );
    Ok(())
}
