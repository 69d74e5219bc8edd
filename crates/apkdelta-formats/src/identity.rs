//! Baseline and target identity keys
//!
//! Which digest identifies a file depends on the patch format: `apkzip-1`
//! rebuilds are structurally equivalent rather than byte-exact, so they are
//! addressed by zip-tree signature; the other formats reproduce exact bytes
//! and use the raw SHA-256.

use crate::hash;
use crate::manifest::{Manifest, ManifestDetail};
use crate::rawzip::RawZip;
use std::io;
use std::path::Path;
use tracing::debug;

/// Which digest a key is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKind {
    /// Raw SHA-256 of the file bytes
    RawSha256,
    /// Structural zip-tree signature
    ZipTree,
}

/// Both identity digests of a local file, computed once
#[derive(Debug, Clone)]
pub struct LocalIdentity {
    /// Raw SHA-256, lowercase hex
    pub sha256: String,
    /// Zip-tree signature, absent when the file does not parse as a ZIP
    pub zip_tree: Option<String>,
}

impl LocalIdentity {
    /// Compute both keys of a file
    ///
    /// A file that does not parse as a ZIP still gets a raw digest; such a
    /// file simply cannot match any `apkzip-1` baseline.
    pub fn of(path: &Path) -> io::Result<Self> {
        let sha256 = hash::sha256_hex_file(path)?;
        let zip_tree = match RawZip::open(path) {
            Ok(zip) => Some(zip.tree_signature()),
            Err(err) => {
                debug!("no zip-tree identity for {}: {err}", path.display());
                None
            }
        };
        Ok(Self { sha256, zip_tree })
    }
}

impl Manifest {
    /// The kind of identity key this manifest's format uses
    pub fn identity_kind(&self) -> IdentityKind {
        match self.detail {
            ManifestDetail::ApkZip(_) => IdentityKind::ZipTree,
            ManifestDetail::Opatch(_) | ManifestDetail::ApkRaw(_) => IdentityKind::RawSha256,
        }
    }

    /// The baseline key this manifest was built against
    pub fn baseline_key(&self) -> &str {
        match &self.detail {
            ManifestDetail::ApkZip(detail) => &detail.base_zip_tree_sha256,
            ManifestDetail::Opatch(_) | ManifestDetail::ApkRaw(_) => &self.base_sha256,
        }
    }

    /// The target key used for post-apply verification
    pub fn target_key(&self) -> &str {
        match &self.detail {
            ManifestDetail::ApkZip(detail) => &detail.target_zip_tree_sha256,
            ManifestDetail::Opatch(_) | ManifestDetail::ApkRaw(_) => &self.target_sha256,
        }
    }

    /// Whether a local file's identity matches this manifest's baseline
    pub fn matches_baseline(&self, local: &LocalIdentity) -> bool {
        match self.identity_kind() {
            IdentityKind::RawSha256 => self.baseline_key() == local.sha256,
            IdentityKind::ZipTree => local
                .zip_tree
                .as_deref()
                .is_some_and(|tree| self.baseline_key() == tree),
        }
    }

    /// Whether a local file's identity matches this manifest's target
    pub fn matches_target(&self, local: &LocalIdentity) -> bool {
        match self.identity_kind() {
            IdentityKind::RawSha256 => self.target_key() == local.sha256,
            IdentityKind::ZipTree => local
                .zip_tree
                .as_deref()
                .is_some_and(|tree| self.target_key() == tree),
        }
    }
}
