//! Delta patch formats for Android application packages
//!
//! This crate is the synchronous core of apkdelta: given a baseline and a
//! target APK it builds a compact patch in one of three interoperable
//! formats, and given a baseline plus a patch it deterministically
//! reconstructs the target.
//!
//! # Formats
//!
//! - [`opatch`]: `opatch-1`, a generic fixed-block binary delta. Knows
//!   nothing about ZIP structure; smallest for small localized changes.
//! - [`apkzip`]: `apkzip-1`, a ZIP-entry-level delta. Smallest wire format
//!   when few entries change, but re-packing loses byte exactness; its
//!   identity metric is the structural zip-tree signature.
//! - [`apkraw`]: `apkraw-1`, a raw ZIP-record delta. Byte-exact, and
//!   therefore the only format usable on APKs whose v2/v3 signature covers
//!   the central directory.
//!
//! # Supporting modules
//!
//! - [`hash`]: streaming SHA-256 / per-block SHA-1
//! - [`rawzip`]: read-only, byte-exact ZIP structure parsing
//! - [`manifest`]: the JSON sidecar published next to every patch
//! - [`identity`]: which digest identifies a file under which format
//! - [`version`]: `[v]MAJOR.MINOR.PATCH[+N]` parsing and total ordering
//!
//! Builders and appliers hold no shared state; callers may run them
//! concurrently on disjoint paths. Appliers write to a caller-chosen output
//! path and remove it on any failure, so a crash or error never leaves a
//! partial file masquerading as a patched APK.

#![warn(missing_docs)]

pub mod apkraw;
pub mod apkzip;
pub mod hash;
pub mod identity;
pub mod manifest;
pub mod opatch;
pub mod rawzip;
pub mod version;

pub use identity::{IdentityKind, LocalIdentity};
pub use manifest::{Manifest, ManifestDetail};
pub use version::Version;
