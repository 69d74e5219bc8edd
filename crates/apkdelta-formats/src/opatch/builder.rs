//! opatch builder
//!
//! Walks the target in fixed-size blocks, matching each block against the
//! baseline first at the same block index (aligned) and then anywhere the
//! block hash was seen (unaligned). Matches become COPY ops, coalesced when
//! contiguous in the baseline; misses accumulate into ADD ops flushed at
//! 4 MiB. The whole op stream is gzip-compressed.

use super::error::{OpatchError, OpatchResult};
use super::header::OpatchHeader;
use crate::hash::{self, READ_CHUNK_BYTES};
use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::debug;

/// Default block granularity
pub const DEFAULT_BLOCK_SIZE: u32 = 4096;

/// ADD payload is flushed once it reaches this size
pub const MAX_ADD_CHUNK_BYTES: usize = 4 * 1024 * 1024;

pub(super) const OP_END: u8 = 0x00;
pub(super) const OP_COPY: u8 = 0x01;
pub(super) const OP_ADD: u8 = 0x02;

/// What a build produced, ready to drop into a manifest
#[derive(Debug, Clone)]
pub struct OpatchSummary {
    /// Baseline size in bytes
    pub old_size: u64,
    /// Target size in bytes
    pub new_size: u64,
    /// Block granularity used
    pub block_size: u32,
    /// SHA-256 of the baseline, lowercase hex
    pub base_sha256: String,
    /// SHA-256 of the target, lowercase hex
    pub target_sha256: String,
}

/// Pending op being coalesced during the target walk
enum Pending {
    None,
    Copy { offset: u64, length: u64 },
    Add(Vec<u8>),
}

impl Pending {
    fn flush<W: Write>(&mut self, out: &mut W) -> OpatchResult<()> {
        match std::mem::replace(self, Self::None) {
            Self::None => {}
            Self::Copy { offset, length } => {
                out.write_u8(OP_COPY)?;
                out.write_u64::<LittleEndian>(offset)?;
                out.write_u64::<LittleEndian>(length)?;
            }
            Self::Add(buf) => {
                out.write_u8(OP_ADD)?;
                out.write_u64::<LittleEndian>(buf.len() as u64)?;
                out.write_all(&buf)?;
            }
        }
        Ok(())
    }
}

/// Build an `opatch-1` patch from `old` to `new`, written to `out_patch`
pub fn build(
    old_path: &Path,
    new_path: &Path,
    out_patch: &Path,
    block_size: u32,
) -> OpatchResult<OpatchSummary> {
    if block_size == 0 {
        return Err(OpatchError::ZeroBlockSize);
    }

    let old_size = std::fs::metadata(old_path)?.len();
    let new_size = std::fs::metadata(new_path)?.len();
    let base_sha256 = hash::sha256_file(old_path)?;
    let target_sha256 = hash::sha256_file(new_path)?;

    let (old_seq, old_map) = index_baseline(old_path, block_size)?;
    debug!(
        "indexed baseline: {} blocks of {} bytes, {} distinct",
        old_seq.len(),
        block_size,
        old_map.len()
    );

    let header = OpatchHeader {
        block_size,
        old_size,
        new_size,
        base_sha256,
        target_sha256,
    };

    let mut out = GzEncoder::new(File::create(out_patch)?, Compression::best());
    header.write(&mut out)?;

    let mut new_file = File::open(new_path)?;
    let mut block = vec![0u8; block_size as usize];
    let mut pending = Pending::None;
    let mut index = 0u64;

    loop {
        let n = read_block(&mut new_file, &mut block)?;
        if n == 0 {
            break;
        }
        let chunk = &block[..n];
        let digest = hash::sha1_block(chunk);

        // Aligned match beats any other occurrence of the same block.
        let offset = if (index as usize) < old_seq.len() && old_seq[index as usize] == digest {
            Some(index * u64::from(block_size))
        } else {
            old_map.get(&digest).copied()
        };

        match offset {
            Some(offset) => {
                if let Pending::Copy {
                    offset: run_offset,
                    length,
                } = &mut pending
                {
                    if *run_offset + *length == offset {
                        *length += n as u64;
                        index += 1;
                        continue;
                    }
                }
                pending.flush(&mut out)?;
                pending = Pending::Copy {
                    offset,
                    length: n as u64,
                };
            }
            None => {
                if !matches!(pending, Pending::Add(_)) {
                    pending.flush(&mut out)?;
                    pending = Pending::Add(Vec::new());
                }
                let full = if let Pending::Add(buf) = &mut pending {
                    buf.extend_from_slice(chunk);
                    buf.len() >= MAX_ADD_CHUNK_BYTES
                } else {
                    false
                };
                if full {
                    pending.flush(&mut out)?;
                }
            }
        }
        index += 1;
    }

    pending.flush(&mut out)?;
    out.write_u8(OP_END)?;
    out.finish()?;

    Ok(OpatchSummary {
        old_size,
        new_size,
        block_size,
        base_sha256: hex::encode(base_sha256),
        target_sha256: hex::encode(target_sha256),
    })
}

/// Hash every baseline block: the aligned sequence plus a first-offset map
#[allow(clippy::type_complexity)]
fn index_baseline(
    old_path: &Path,
    block_size: u32,
) -> OpatchResult<(Vec<[u8; 20]>, HashMap<[u8; 20], u64>)> {
    let mut file = File::open(old_path)?;
    let mut block = vec![0u8; block_size as usize];
    let mut seq = Vec::new();
    let mut map = HashMap::new();

    loop {
        let n = read_block(&mut file, &mut block)?;
        if n == 0 {
            break;
        }
        let digest = hash::sha1_block(&block[..n]);
        let offset = seq.len() as u64 * u64::from(block_size);
        seq.push(digest);
        // First observed offset wins; repeats of a block keep the original.
        map.entry(digest).or_insert(offset);
    }

    Ok((seq, map))
}

/// Fill `block` as far as possible; returns bytes read (0 at EOF)
fn read_block(file: &mut File, block: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < block.len() {
        let n = file.read(&mut block[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Copy `length` bytes from `reader` to `writer` in bounded chunks
pub(super) fn copy_exact<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    length: u64,
    context: &'static str,
) -> OpatchResult<u64> {
    let mut remaining = length;
    let mut buf = vec![0u8; READ_CHUNK_BYTES.min(length as usize).max(1)];
    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let n = reader.read(&mut buf[..want])?;
        if n == 0 {
            return Err(OpatchError::Truncated { context });
        }
        writer.write_all(&buf[..n])?;
        remaining -= n as u64;
    }
    Ok(length)
}
