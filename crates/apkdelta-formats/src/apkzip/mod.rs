//! `apkzip-1`: ZIP-entry-level delta
//!
//! The smallest wire format when a handful of entries change between two
//! archives: only changed entries travel (decompressed, re-deflated inside
//! the patch), and the target is re-packed from the recipe at apply time.
//! Because re-packing normalizes timestamps and alignment, identity on both
//! sides is the structural zip-tree signature rather than raw bytes, which
//! makes this format unsuitable for archives that must keep an existing
//! APK signature intact; use `apkraw-1` for those.

mod applier;
mod builder;
/// apkzip error types
pub mod error;

pub use applier::apply;
pub use builder::{ApkZipSummary, build};
pub use error::{ApkZipError, ApkZipResult};

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::manifest::{ApkZipDetail, TargetEntry};
    use crate::rawzip;
    use std::fs::File;
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &[u8], zip::CompressionMethod)]) {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, data, method) in entries {
            let options = SimpleFileOptions::default().compression_method(*method);
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }

    fn detail_from(summary: &ApkZipSummary) -> ApkZipDetail {
        ApkZipDetail {
            base_zip_tree_sha256: summary.base_zip_tree_sha256.clone(),
            target_zip_tree_sha256: summary.target_zip_tree_sha256.clone(),
            target_entries: summary.target_entries.clone(),
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        old: PathBuf,
        new: PathBuf,
        patch: PathBuf,
        out: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        Fixture {
            old: dir.path().join("old.apk"),
            new: dir.path().join("new.apk"),
            patch: dir.path().join("patch.zip"),
            out: dir.path().join("out.apk"),
            _dir: dir,
        }
    }

    #[test]
    fn test_entry_addition() {
        let f = fixture();
        write_zip(&f.old, &[("a.txt", b"A", zip::CompressionMethod::Stored)]);
        write_zip(
            &f.new,
            &[
                ("a.txt", b"A", zip::CompressionMethod::Stored),
                ("b.txt", b"B", zip::CompressionMethod::Deflated),
            ],
        );

        let summary = build(&f.old, &f.new, &f.patch).unwrap();
        assert_eq!(summary.changed_files, vec!["b.txt"]);
        assert!(summary.deleted_files.is_empty());
        assert_eq!(
            summary.target_entries,
            vec![
                TargetEntry {
                    name: "a.txt".to_string(),
                    compress_type: 0
                },
                TargetEntry {
                    name: "b.txt".to_string(),
                    compress_type: 8
                },
            ]
        );

        // Only the new entry travels in the patch.
        let mut patch = zip::ZipArchive::new(File::open(&f.patch).unwrap()).unwrap();
        let names: Vec<String> = (0..patch.len())
            .map(|i| patch.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(names, vec!["files/b.txt"]);

        apply(&f.old, &f.patch, &f.out, &detail_from(&summary)).unwrap();
        assert_eq!(
            rawzip::tree_signature_hex(&f.out).unwrap(),
            summary.target_zip_tree_sha256
        );
    }

    #[test]
    fn test_entry_modification_and_deletion() {
        let f = fixture();
        write_zip(
            &f.old,
            &[
                ("keep.txt", b"same", zip::CompressionMethod::Deflated),
                ("mod.txt", b"before", zip::CompressionMethod::Deflated),
                ("gone.txt", b"bye", zip::CompressionMethod::Stored),
            ],
        );
        write_zip(
            &f.new,
            &[
                ("keep.txt", b"same", zip::CompressionMethod::Deflated),
                ("mod.txt", b"after!", zip::CompressionMethod::Deflated),
            ],
        );

        let summary = build(&f.old, &f.new, &f.patch).unwrap();
        assert_eq!(summary.changed_files, vec!["mod.txt"]);
        assert_eq!(summary.deleted_files, vec!["gone.txt"]);

        apply(&f.old, &f.patch, &f.out, &detail_from(&summary)).unwrap();

        let mut rebuilt = zip::ZipArchive::new(File::open(&f.out).unwrap()).unwrap();
        assert!(rebuilt.by_name("gone.txt").is_err());
        let mut contents = String::new();
        std::io::Read::read_to_string(&mut rebuilt.by_name("mod.txt").unwrap(), &mut contents)
            .unwrap();
        assert_eq!(contents, "after!");
    }

    #[test]
    fn test_method_change_is_a_change() {
        let f = fixture();
        write_zip(&f.old, &[("x.bin", b"xxxx", zip::CompressionMethod::Stored)]);
        write_zip(&f.new, &[("x.bin", b"xxxx", zip::CompressionMethod::Deflated)]);

        let summary = build(&f.old, &f.new, &f.patch).unwrap();
        assert_eq!(summary.changed_files, vec!["x.bin"]);

        apply(&f.old, &f.patch, &f.out, &detail_from(&summary)).unwrap();
    }

    #[test]
    fn test_unknown_compress_method_rejected() {
        let f = fixture();
        write_zip(&f.old, &[("a.txt", b"A", zip::CompressionMethod::Stored)]);
        write_zip(&f.new, &[("a.txt", b"A", zip::CompressionMethod::Stored)]);
        let summary = build(&f.old, &f.new, &f.patch).unwrap();

        let mut detail = detail_from(&summary);
        detail.target_entries[0].compress_type = 14;
        assert!(matches!(
            apply(&f.old, &f.patch, &f.out, &detail),
            Err(ApkZipError::UnsupportedMethod { method: 14, .. })
        ));
        assert!(!f.out.exists());
    }

    #[test]
    fn test_wrong_baseline_never_silently_succeeds() {
        let f = fixture();
        write_zip(&f.old, &[("a.txt", b"A", zip::CompressionMethod::Stored)]);
        write_zip(
            &f.new,
            &[
                ("a.txt", b"A", zip::CompressionMethod::Stored),
                ("b.txt", b"B", zip::CompressionMethod::Deflated),
            ],
        );
        let summary = build(&f.old, &f.new, &f.patch).unwrap();

        // Baseline with different content for the entry the recipe reuses.
        let other = f.old.with_file_name("other.apk");
        write_zip(&other, &[("a.txt", b"Z", zip::CompressionMethod::Stored)]);
        assert!(matches!(
            apply(&other, &f.patch, &f.out, &detail_from(&summary)),
            Err(ApkZipError::TreeMismatch { .. })
        ));
        assert!(!f.out.exists());

        // Baseline missing the entry entirely.
        let empty = f.old.with_file_name("empty.apk");
        write_zip(&empty, &[]);
        assert!(matches!(
            apply(&empty, &f.patch, &f.out, &detail_from(&summary)),
            Err(ApkZipError::MissingEntry { .. })
        ));
    }

    #[test]
    fn test_deterministic_patch_bytes() {
        let f = fixture();
        write_zip(&f.old, &[("a.txt", b"AAAA", zip::CompressionMethod::Stored)]);
        write_zip(
            &f.new,
            &[
                ("a.txt", b"AAAB", zip::CompressionMethod::Stored),
                ("b.txt", b"BBBB", zip::CompressionMethod::Deflated),
            ],
        );

        build(&f.old, &f.new, &f.patch).unwrap();
        let first = std::fs::read(&f.patch).unwrap();
        build(&f.old, &f.new, &f.patch).unwrap();
        assert_eq!(first, std::fs::read(&f.patch).unwrap());
    }
}
