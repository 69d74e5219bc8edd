//! `apkraw-1`: byte-exact raw ZIP-record delta
//!
//! Reconstructs the target file exactly, preserving entry ordering,
//! alignment padding and anything sitting between the last local record and
//! end of file, which is where APK signing blocks live. This is the only
//! format safe to use after an APK has been v2/v3-signed, because those
//! signatures cover the central directory and would be broken by any
//! structural re-pack. Identity on both sides is the raw SHA-256.
//!
//! The patch is a ZIP containing `records/NNNNN.bin` blobs for records the
//! baseline cannot supply, plus a `tail.bin` blob for everything after the
//! last local record.

mod applier;
mod builder;
/// apkraw error types
pub mod error;

pub use applier::apply;
pub use builder::{ApkRawSummary, TAIL_FILE, build};
pub use error::{ApkRawError, ApkRawResult};
