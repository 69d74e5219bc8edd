//! apkraw builder
//!
//! Walks the target's local records in ascending header-offset order. A
//! record whose name exists in the baseline with byte-identical raw bytes
//! becomes a `copy` row; every other record is stored verbatim in the patch
//! as `records/NNNNN.bin`. The archive tail (signing block if present,
//! central directory, EOCD) is captured as `tail.bin` so the applier can
//! reproduce the target byte for byte.

use super::error::ApkRawResult;
use crate::manifest::{RawEntry, RawMode};
use crate::rawzip::{RawZip, ZipEntry};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::debug;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

/// Name of the tail blob inside the patch
pub const TAIL_FILE: &str = "tail.bin";

/// What a build produced, ready to drop into a manifest
#[derive(Debug, Clone)]
pub struct ApkRawSummary {
    /// Record recipe, in target local-record order
    pub entries: Vec<RawEntry>,
    /// Name of the tail blob inside the patch
    pub tail_file: String,
    /// How many records ship in the patch
    pub changed_count: usize,
}

/// Build an `apkraw-1` patch from `old_apk` to `new_apk`
pub fn build(old_apk: &Path, new_apk: &Path, out_patch: &Path) -> ApkRawResult<ApkRawSummary> {
    let mut old_raw = RawZip::open(old_apk)?;
    let mut new_raw = RawZip::open(new_apk)?;

    let old_entries: HashMap<String, ZipEntry> = old_raw
        .entries()
        .iter()
        .filter(|e| !e.is_dir())
        .map(|e| (e.name.clone(), e.clone()))
        .collect();

    let mut new_entries: Vec<ZipEntry> = new_raw
        .entries()
        .iter()
        .filter(|e| !e.is_dir())
        .cloned()
        .collect();
    new_entries.sort_by_key(|e| e.header_offset);

    let mut writer = zip::ZipWriter::new(File::create(out_patch)?);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());

    let mut entries = Vec::with_capacity(new_entries.len());
    let mut changed_count = 0usize;
    let mut tail_start = 0u64;

    for (index, entry) in new_entries.iter().enumerate() {
        let new_record = new_raw.read_local_record(entry)?;
        tail_start = tail_start.max(new_record.end_offset);

        let can_copy = old_entries.get(&entry.name).is_some_and(|old_entry| {
            old_raw
                .read_local_record(old_entry)
                .is_ok_and(|old_record| old_record.bytes == new_record.bytes)
        });

        if can_copy {
            entries.push(RawEntry {
                name: entry.name.clone(),
                mode: RawMode::Copy,
                record_path: None,
            });
        } else {
            changed_count += 1;
            let record_path = format!("records/{index:05}.bin");
            writer.start_file(record_path.as_str(), options)?;
            writer.write_all(&new_record.bytes)?;
            entries.push(RawEntry {
                name: entry.name.clone(),
                mode: RawMode::Add,
                record_path: Some(record_path),
            });
        }
    }

    let mut tail = Vec::new();
    let mut new_file = File::open(new_apk)?;
    new_file.seek(SeekFrom::Start(tail_start))?;
    new_file.read_to_end(&mut tail)?;
    writer.start_file(TAIL_FILE, options)?;
    writer.write_all(&tail)?;
    writer.finish()?;

    debug!(
        "apkraw diff: {changed_count} of {} records ship in the patch, tail {} bytes",
        entries.len(),
        tail.len()
    );

    Ok(ApkRawSummary {
        entries,
        tail_file: TAIL_FILE.to_string(),
        changed_count,
    })
}
