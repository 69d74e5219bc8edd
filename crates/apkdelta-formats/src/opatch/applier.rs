//! opatch applier
//!
//! Interprets the op stream against a verified baseline, streaming output
//! through an incremental digest so the final size and SHA-256 checks never
//! re-read the produced file. On any failure the partial output is removed.

use super::builder::{OP_ADD, OP_COPY, OP_END, copy_exact};
use super::error::{OpatchError, OpatchResult};
use super::header::OpatchHeader;
use crate::hash::{self, Sha256TeeWriter};
use byteorder::{LittleEndian, ReadBytesExt};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, trace};

/// Read just the header of a patch file
pub fn read_header(patch_path: &Path) -> OpatchResult<OpatchHeader> {
    let mut reader = GzDecoder::new(BufReader::new(File::open(patch_path)?));
    OpatchHeader::read(&mut reader)
}

/// Apply an `opatch-1` patch to `old_path`, producing `out_path`
///
/// Verifies the baseline's size and SHA-256 against the patch header before
/// writing anything, and the output's size and SHA-256 after the END marker.
/// `out_path` is removed on every error path.
pub fn apply(old_path: &Path, patch_path: &Path, out_path: &Path) -> OpatchResult<OpatchHeader> {
    let result = apply_inner(old_path, patch_path, out_path);
    if result.is_err() {
        let _ = std::fs::remove_file(out_path);
    }
    result
}

fn apply_inner(old_path: &Path, patch_path: &Path, out_path: &Path) -> OpatchResult<OpatchHeader> {
    let mut patch = GzDecoder::new(BufReader::new(File::open(patch_path)?));
    let header = OpatchHeader::read(&mut patch)?;

    let old_size = std::fs::metadata(old_path)?.len();
    if old_size != header.old_size {
        return Err(OpatchError::BaselineSizeMismatch {
            expected: header.old_size,
            actual: old_size,
        });
    }
    let actual_base = hash::sha256_file(old_path)?;
    if actual_base != header.base_sha256 {
        return Err(OpatchError::BaselineDigestMismatch {
            expected: hex::encode(header.base_sha256),
            actual: hex::encode(actual_base),
        });
    }

    let mut old_file = File::open(old_path)?;
    let mut out = Sha256TeeWriter::new(File::create(out_path)?);

    loop {
        let op = patch
            .read_u8()
            .map_err(|_| OpatchError::Truncated { context: "opcode" })?;
        match op {
            OP_END => break,
            OP_COPY => {
                let offset = patch
                    .read_u64::<LittleEndian>()
                    .map_err(|_| OpatchError::Truncated { context: "copy op" })?;
                let length = patch
                    .read_u64::<LittleEndian>()
                    .map_err(|_| OpatchError::Truncated { context: "copy op" })?;
                if offset.checked_add(length).is_none_or(|end| end > header.old_size) {
                    return Err(OpatchError::CopyOutOfRange {
                        offset,
                        length,
                        old_size: header.old_size,
                    });
                }
                trace!("copy {length} bytes from baseline offset {offset}");
                old_file.seek(SeekFrom::Start(offset))?;
                copy_exact(&mut old_file, &mut out, length, "copy payload")?;
            }
            OP_ADD => {
                let length = patch
                    .read_u64::<LittleEndian>()
                    .map_err(|_| OpatchError::Truncated { context: "add op" })?;
                trace!("add {length} literal bytes");
                copy_exact(&mut patch, &mut out, length, "add payload")?;
            }
            other => return Err(OpatchError::UnknownOpcode(other)),
        }
    }

    // Drain the stream so the gzip trailer checksum is verified too.
    patch.read_to_end(&mut Vec::new())?;

    let (file, written, digest) = out.finish();
    file.sync_all()?;
    drop(file);

    if written != header.new_size {
        return Err(OpatchError::OutputSizeMismatch {
            expected: header.new_size,
            actual: written,
        });
    }
    if digest != header.target_sha256 {
        return Err(OpatchError::TargetDigestMismatch {
            expected: hex::encode(header.target_sha256),
            actual: hex::encode(digest),
        });
    }

    debug!("applied opatch: {} -> {} bytes", header.old_size, header.new_size);
    Ok(header)
}
