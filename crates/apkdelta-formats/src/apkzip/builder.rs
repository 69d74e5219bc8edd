//! apkzip builder
//!
//! Diffs two archives by entry name on the `(crc32, uncompressedSize,
//! compressMethod)` triple read from their central directories. Changed and
//! new entries ship decompressed inside the patch ZIP under `files/<name>`;
//! everything else is rebuilt from the baseline at apply time. The manifest
//! recipe (`targetEntries`) lists every non-directory target entry in target
//! order so the applier can reproduce the structure exactly.

use super::error::ApkZipResult;
use crate::manifest::TargetEntry;
use crate::rawzip::RawZip;
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::path::Path;
use tracing::debug;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

/// What a build produced, ready to drop into a manifest
#[derive(Debug, Clone)]
pub struct ApkZipSummary {
    /// Entries that ship in the patch, sorted by name
    pub changed_files: Vec<String>,
    /// Baseline entries absent from the target, sorted by name
    pub deleted_files: Vec<String>,
    /// Rebuild recipe: every non-directory target entry, in target order
    pub target_entries: Vec<TargetEntry>,
    /// Zip-tree signature of the baseline
    pub base_zip_tree_sha256: String,
    /// Zip-tree signature of the target
    pub target_zip_tree_sha256: String,
}

/// Build an `apkzip-1` patch from `old_apk` to `new_apk`
pub fn build(old_apk: &Path, new_apk: &Path, out_patch: &Path) -> ApkZipResult<ApkZipSummary> {
    let old_raw = RawZip::open(old_apk)?;
    let new_raw = RawZip::open(new_apk)?;
    let base_zip_tree_sha256 = old_raw.tree_signature();
    let target_zip_tree_sha256 = new_raw.tree_signature();

    let old_by_name: HashMap<&str, (u32, u64, u16)> = old_raw
        .entries()
        .iter()
        .filter(|e| !e.is_dir())
        .map(|e| (e.name.as_str(), (e.crc32, e.uncompressed_size, e.method)))
        .collect();

    let mut changed = BTreeSet::new();
    let mut target_entries = Vec::new();
    for entry in new_raw.entries().iter().filter(|e| !e.is_dir()) {
        match old_by_name.get(entry.name.as_str()) {
            Some(&(crc32, uncompressed_size, method))
                if crc32 == entry.crc32
                    && uncompressed_size == entry.uncompressed_size
                    && method == entry.method => {}
            _ => {
                changed.insert(entry.name.clone());
            }
        }
        target_entries.push(TargetEntry {
            name: entry.name.clone(),
            compress_type: entry.method,
        });
    }

    let new_names: BTreeSet<&str> = target_entries.iter().map(|e| e.name.as_str()).collect();
    let mut deleted_files: Vec<String> = old_by_name
        .keys()
        .filter(|name| !new_names.contains(*name))
        .map(|name| (*name).to_string())
        .collect();
    deleted_files.sort_unstable();

    debug!(
        "apkzip diff: {} changed, {} deleted, {} total target entries",
        changed.len(),
        deleted_files.len(),
        target_entries.len()
    );

    let mut source = zip::ZipArchive::new(File::open(new_apk)?)?;
    let mut writer = zip::ZipWriter::new(File::create(out_patch)?);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());

    for name in &changed {
        let mut entry = source.by_name(name)?;
        writer.start_file(format!("files/{name}"), options)?;
        std::io::copy(&mut entry, &mut writer)?;
    }
    writer.finish()?;

    Ok(ApkZipSummary {
        changed_files: changed.into_iter().collect(),
        deleted_files,
        target_entries,
        base_zip_tree_sha256,
        target_zip_tree_sha256,
    })
}
