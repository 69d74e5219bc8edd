//! `apkdelta inspect`

use anyhow::Context;
use apkdelta_formats::manifest::ManifestDetail;
use apkdelta_formats::{Manifest, opatch};
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
#[group(required = true, multiple = false)]
pub struct InspectArgs {
    /// Print a parsed manifest
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Print an opatch artifact's header
    #[arg(long)]
    patch: Option<PathBuf>,
}

pub fn handle(args: InspectArgs) -> anyhow::Result<()> {
    if let Some(path) = args.manifest {
        let manifest = Manifest::read_from(&path)
            .with_context(|| format!("reading manifest {}", path.display()))?;
        println!("format:   {}", manifest.format_name());
        println!("tag:      {} ({})", manifest.tag, manifest.repo);
        println!(
            "chain:    {} (index {}) -> {} (index {})",
            manifest.from_version.as_deref().unwrap_or("-"),
            manifest.from_patch_index.unwrap_or(0),
            manifest.to_version.as_deref().unwrap_or("-"),
            manifest.to_patch_index.unwrap_or(0),
        );
        println!("baseline: {}", manifest.baseline_key());
        println!("target:   {}", manifest.target_key());
        println!("patch:    {} ({})", manifest.patch_file, manifest.patch_sha256);
        match &manifest.detail {
            ManifestDetail::Opatch(detail) => {
                println!("blocks:   {} bytes", detail.block_size);
            }
            ManifestDetail::ApkZip(detail) => {
                println!("entries:  {}", detail.target_entries.len());
            }
            ManifestDetail::ApkRaw(detail) => {
                let added = detail
                    .apk_raw_entries
                    .iter()
                    .filter(|e| e.record_path.is_some())
                    .count();
                println!(
                    "records:  {} total, {} shipped, tail {}",
                    detail.apk_raw_entries.len(),
                    added,
                    detail.apk_raw_tail_file
                );
            }
        }
        return Ok(());
    }

    if let Some(path) = args.patch {
        let header = opatch::read_header(&path)
            .with_context(|| format!("reading opatch header from {}", path.display()))?;
        println!("format:   opatch-1");
        println!("blocks:   {} bytes", header.block_size);
        println!("old:      {} bytes, sha256 {}", header.old_size, hex::encode(header.base_sha256));
        println!("new:      {} bytes, sha256 {}", header.new_size, hex::encode(header.target_sha256));
    }

    Ok(())
}
