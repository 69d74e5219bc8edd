//! `apkdelta apply`

use anyhow::Context;
use apkdelta_formats::Manifest;
use apkdelta_updater::apply_manifest;
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct ApplyArgs {
    /// Baseline APK
    #[arg(long, default_value = "from.apk")]
    from: PathBuf,

    /// Patch artifact on disk
    #[arg(long)]
    patch: PathBuf,

    /// Manifest describing the patch
    #[arg(long)]
    manifest: PathBuf,

    /// Where to write the reconstructed APK
    #[arg(long, default_value = "to.apk")]
    output: PathBuf,
}

pub fn handle(args: ApplyArgs) -> anyhow::Result<()> {
    let manifest = Manifest::read_from(&args.manifest)
        .with_context(|| format!("reading manifest {}", args.manifest.display()))?;

    apply_manifest(&manifest, &args.from, &args.patch, &args.output)?;
    println!("ok -> {}", args.output.display());
    Ok(())
}
