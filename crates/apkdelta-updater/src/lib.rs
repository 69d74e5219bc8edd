//! Patch build orchestration and chain application for apkdelta
//!
//! Sits between the synchronous format codecs (`apkdelta-formats`) and the
//! injected release collaborators (`apkdelta-release`):
//!
//! - [`build_patch`] builds one patch plus its manifest, deriving names and
//!   version coordinates the same way the release tooling expects them.
//! - [`apply_manifest`] runs the full verification pipeline for one patch:
//!   artifact digest, baseline identity, codec apply into a temp file,
//!   target identity, atomic rename.
//! - [`ChainApplier`] walks a catalog from a local baseline to the latest
//!   reachable target, one verified patch at a time.

#![warn(missing_docs)]

mod applier;
mod builder;
mod chain;
/// Error types for update operations
pub mod error;

pub use applier::apply_manifest;
pub use builder::{BuildOutcome, BuildRequest, PatchFormat, build_patch};
pub use chain::{ChainApplier, ChainOutcome};
pub use error::{UpdateError, UpdateResult};
