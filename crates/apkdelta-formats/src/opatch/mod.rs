//! `opatch-1`: generic fixed-block binary delta
//!
//! The simplest of the three formats and the only one that knows nothing
//! about ZIP structure. The baseline is split into fixed-size blocks; the
//! target is walked at the same granularity and each block either COPYs a
//! matching baseline range or ships literally in an ADD. Best when deltas
//! are small and local; identity is the raw SHA-256 on both sides.
//!
//! # Wire format (gzip-wrapped)
//!
//! ```text
//! magic:       8 bytes  "OPATCH1\0"
//! header:      <u32 blockSize> <u64 oldSize> <u64 newSize>   little-endian
//! baselineSha: 32 bytes SHA-256 of baseline
//! targetSha:   32 bytes SHA-256 of target
//! ops:
//!   COPY = 0x01 <u64 offset> <u64 length>
//!   ADD  = 0x02 <u64 length> <length bytes>
//!   END  = 0x00
//! ```

mod applier;
mod builder;
/// opatch error types
pub mod error;
mod header;

pub use applier::{apply, read_header};
pub use builder::{DEFAULT_BLOCK_SIZE, MAX_ADD_CHUNK_BYTES, OpatchSummary, build};
pub use error::{OpatchError, OpatchResult};
pub use header::{MAGIC, OpatchHeader};

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use byteorder::{LittleEndian, ReadBytesExt};
    use flate2::read::GzDecoder;
    use std::fs::File;
    use std::io::Read;
    use std::path::{Path, PathBuf};

    struct Fixture {
        _dir: tempfile::TempDir,
        old: PathBuf,
        new: PathBuf,
        patch: PathBuf,
        out: PathBuf,
    }

    fn fixture(old_bytes: &[u8], new_bytes: &[u8]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("old.bin");
        let new = dir.path().join("new.bin");
        let patch = dir.path().join("delta.opatch.gz");
        let out = dir.path().join("out.bin");
        std::fs::write(&old, old_bytes).unwrap();
        std::fs::write(&new, new_bytes).unwrap();
        Fixture {
            _dir: dir,
            old,
            new,
            patch,
            out,
        }
    }

    #[derive(Debug, PartialEq, Eq)]
    enum Op {
        Copy { offset: u64, length: u64 },
        Add { length: u64 },
    }

    fn decode_ops(patch: &Path) -> Vec<Op> {
        let mut reader = GzDecoder::new(File::open(patch).unwrap());
        OpatchHeader::read(&mut reader).unwrap();
        let mut ops = Vec::new();
        loop {
            match reader.read_u8().unwrap() {
                0x00 => break,
                0x01 => ops.push(Op::Copy {
                    offset: reader.read_u64::<LittleEndian>().unwrap(),
                    length: reader.read_u64::<LittleEndian>().unwrap(),
                }),
                0x02 => {
                    let length = reader.read_u64::<LittleEndian>().unwrap();
                    std::io::copy(&mut (&mut reader).take(length), &mut std::io::sink()).unwrap();
                    ops.push(Op::Add { length });
                }
                other => panic!("unexpected opcode {other}"),
            }
        }
        ops
    }

    #[test]
    fn test_small_text_delta() {
        // 8 KiB of zeros with one 5-byte word swapped between the files.
        let mut old_bytes = vec![0u8; 8192];
        old_bytes[100..105].copy_from_slice(b"HELLO");
        let mut new_bytes = vec![0u8; 8192];
        new_bytes[100..105].copy_from_slice(b"WORLD");

        let f = fixture(&old_bytes, &new_bytes);
        let summary = build(&f.old, &f.new, &f.patch, 4096).unwrap();
        assert_eq!(summary.old_size, 8192);
        assert_eq!(summary.new_size, 8192);

        // Changed word sits in block 0, so block 0 ships literally and
        // block 1 copies aligned.
        assert_eq!(
            decode_ops(&f.patch),
            vec![
                Op::Add { length: 4096 },
                Op::Copy {
                    offset: 4096,
                    length: 4096
                }
            ]
        );

        apply(&f.old, &f.patch, &f.out).unwrap();
        assert_eq!(std::fs::read(&f.out).unwrap(), new_bytes);
    }

    #[test]
    fn test_identical_runs_coalesce_into_one_copy() {
        let old_bytes = vec![7u8; 4096 * 5 + 100];
        let f = fixture(&old_bytes, &old_bytes);
        build(&f.old, &f.new, &f.patch, 4096).unwrap();

        // Every target block is an aligned hit on a contiguous run.
        assert_eq!(
            decode_ops(&f.patch),
            vec![Op::Copy {
                offset: 0,
                length: 4096 * 5 + 100
            }]
        );

        apply(&f.old, &f.patch, &f.out).unwrap();
        assert_eq!(std::fs::read(&f.out).unwrap(), old_bytes);
    }

    #[test]
    fn test_unaligned_match_found_through_map() {
        // Target reorders the baseline's blocks: B C A.
        let a = vec![1u8; 4096];
        let b = vec![2u8; 4096];
        let c = vec![3u8; 4096];
        let old_bytes: Vec<u8> = [a.clone(), b.clone(), c.clone()].concat();
        let new_bytes: Vec<u8> = [b, c, a].concat();

        let f = fixture(&old_bytes, &new_bytes);
        build(&f.old, &f.new, &f.patch, 4096).unwrap();

        assert_eq!(
            decode_ops(&f.patch),
            vec![
                Op::Copy {
                    offset: 4096,
                    length: 8192
                },
                Op::Copy {
                    offset: 0,
                    length: 4096
                }
            ]
        );

        apply(&f.old, &f.patch, &f.out).unwrap();
        assert_eq!(std::fs::read(&f.out).unwrap(), new_bytes);
    }

    #[test]
    fn test_growth_and_shrink_round_trip() {
        let old_bytes: Vec<u8> = (0..40_000u32).flat_map(|i| i.to_le_bytes()).collect();
        let mut new_bytes = old_bytes[5000..120_000].to_vec();
        new_bytes.extend_from_slice(b"trailing additions that never appeared in the baseline");

        let f = fixture(&old_bytes, &new_bytes);
        build(&f.old, &f.new, &f.patch, 4096).unwrap();
        apply(&f.old, &f.patch, &f.out).unwrap();
        assert_eq!(std::fs::read(&f.out).unwrap(), new_bytes);
    }

    #[test]
    fn test_wrong_baseline_rejected() {
        let f = fixture(&vec![0u8; 9000], &vec![1u8; 9000]);
        build(&f.old, &f.new, &f.patch, 4096).unwrap();

        let other = f.old.with_file_name("other.bin");
        std::fs::write(&other, vec![2u8; 9000]).unwrap();
        assert!(matches!(
            apply(&other, &f.patch, &f.out),
            Err(OpatchError::BaselineDigestMismatch { .. })
        ));
        assert!(!f.out.exists());

        let shorter = f.old.with_file_name("short.bin");
        std::fs::write(&shorter, vec![0u8; 100]).unwrap();
        assert!(matches!(
            apply(&shorter, &f.patch, &f.out),
            Err(OpatchError::BaselineSizeMismatch { .. })
        ));
    }

    #[test]
    fn test_truncated_patch_leaves_no_output() {
        let f = fixture(&vec![0u8; 10_000], &vec![9u8; 10_000]);
        build(&f.old, &f.new, &f.patch, 4096).unwrap();

        let bytes = std::fs::read(&f.patch).unwrap();
        std::fs::write(&f.patch, &bytes[..bytes.len() - 1]).unwrap();

        let err = apply(&f.old, &f.patch, &f.out).unwrap_err();
        assert!(
            matches!(err, OpatchError::Truncated { .. } | OpatchError::Io(_)),
            "unexpected error: {err:?}"
        );
        assert!(!f.out.exists(), "partial output must be removed");
    }

    #[test]
    fn test_tampered_payload_detected() {
        let f = fixture(&vec![5u8; 20_000], &vec![6u8; 20_000]);
        build(&f.old, &f.new, &f.patch, 4096).unwrap();
        let pristine = std::fs::read(&f.patch).unwrap();

        // Flip every byte past the gzip header; each mutation must fail.
        for index in 10..pristine.len() {
            let mut mutated = pristine.clone();
            mutated[index] ^= 0xFF;
            std::fs::write(&f.patch, &mutated).unwrap();
            assert!(
                apply(&f.old, &f.patch, &f.out).is_err(),
                "mutation at byte {index} went undetected"
            );
            assert!(!f.out.exists());
        }
    }

    #[test]
    fn test_deterministic_artifacts() {
        let old_bytes: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();
        let mut new_bytes = old_bytes.clone();
        new_bytes[30_000..30_050].fill(0xEE);

        let f = fixture(&old_bytes, &new_bytes);
        build(&f.old, &f.new, &f.patch, 4096).unwrap();
        let first = std::fs::read(&f.patch).unwrap();
        build(&f.old, &f.new, &f.patch, 4096).unwrap();
        assert_eq!(first, std::fs::read(&f.patch).unwrap());
    }

    #[test]
    fn test_header_inspection() {
        let f = fixture(b"aaaa", b"bbbb");
        let summary = build(&f.old, &f.new, &f.patch, 2).unwrap();
        let header = read_header(&f.patch).unwrap();
        assert_eq!(header.block_size, 2);
        assert_eq!(header.old_size, 4);
        assert_eq!(header.new_size, 4);
        assert_eq!(hex::encode(header.target_sha256), summary.target_sha256);
    }

    #[test]
    fn test_zero_block_size_rejected() {
        let f = fixture(b"a", b"b");
        assert!(matches!(
            build(&f.old, &f.new, &f.patch, 0),
            Err(OpatchError::ZeroBlockSize)
        ));
    }
}
