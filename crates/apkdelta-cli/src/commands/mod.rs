//! Subcommand handlers

use apkdelta_formats::apkraw::ApkRawError;
use apkdelta_formats::apkzip::ApkZipError;
use apkdelta_formats::opatch::OpatchError;
use apkdelta_release::ReleaseError;
use apkdelta_updater::UpdateError;

pub mod apply;
pub mod build;
pub mod inspect;
pub mod update;

/// Exit code when no patch applies and callers should fall back to a full
/// download
pub const EXIT_NO_PATCH: i32 = 3;

/// Map an error to the process exit code the release tooling expects:
/// 2 malformed input, 3 baseline mismatch, 4 patch integrity, 5 target
/// integrity, 1 anything else.
pub fn exit_code(error: &anyhow::Error) -> i32 {
    if let Some(release) = error.downcast_ref::<ReleaseError>() {
        return match release {
            ReleaseError::VersionOrdering { .. } | ReleaseError::NoOpPatch => 2,
            _ => 1,
        };
    }
    let Some(update) = error.downcast_ref::<UpdateError>() else {
        return 1;
    };
    match update {
        UpdateError::BaselineMismatch { .. } => 3,
        UpdateError::PatchIntegrity { .. } => 4,
        UpdateError::TargetIntegrity { .. } => 5,
        UpdateError::Manifest(_) => 2,
        UpdateError::Opatch(err) => match err {
            OpatchError::TargetDigestMismatch { .. } => 5,
            OpatchError::BaselineSizeMismatch { .. }
            | OpatchError::BaselineDigestMismatch { .. } => 3,
            _ => 4,
        },
        UpdateError::ApkZip(err) => match err {
            ApkZipError::TreeMismatch { .. } => 5,
            ApkZipError::UnsupportedMethod { .. } => 2,
            _ => 4,
        },
        UpdateError::ApkRaw(err) => match err {
            ApkRawError::TargetDigestMismatch { .. } => 5,
            _ => 4,
        },
        _ => 1,
    }
}
