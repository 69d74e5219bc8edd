//! `apkdelta build`

use anyhow::Context;
use apkdelta_release::publish::{ensure_publishable, release_notes};
use apkdelta_release::{ArtifactSink, GithubReleases, ReleaseDraft};
use apkdelta_updater::{BuildRequest, PatchFormat, build_patch};
use clap::Args;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Args)]
pub struct BuildArgs {
    /// Baseline APK
    #[arg(long, default_value = "from.apk")]
    from: PathBuf,

    /// Target APK
    #[arg(long, default_value = "to.apk")]
    to: PathBuf,

    /// Patch format to build
    #[arg(long, value_enum, default_value = "apkraw")]
    format: FormatArg,

    /// Baseline version (defaults to --to-version)
    #[arg(long)]
    from_version: Option<String>,

    /// Target version
    #[arg(long)]
    to_version: Option<String>,

    /// Baseline hot-patch index
    #[arg(long)]
    from_patch_index: Option<i64>,

    /// Target hot-patch index
    #[arg(long)]
    to_patch_index: Option<i64>,

    /// Block size for the opatch format
    #[arg(long, default_value_t = 4096)]
    block_size: u32,

    /// Repository the release lives in, owner/name
    #[arg(long)]
    repo: String,

    /// Explicit release tag (derived from versions or digests when absent)
    #[arg(long)]
    tag: Option<String>,

    /// Directory to write the patch and manifest into
    #[arg(long, default_value = ".")]
    out: PathBuf,

    /// Publish the artifacts as a GitHub release after building
    #[arg(long)]
    publish: bool,

    /// GitHub token (falls back to GITHUB_TOKEN / GH_TOKEN / GITHUB_PAT)
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Opatch,
    Apkzip,
    Apkraw,
}

impl From<FormatArg> for PatchFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Opatch => Self::Opatch,
            FormatArg::Apkzip => Self::ApkZip,
            FormatArg::Apkraw => Self::ApkRaw,
        }
    }
}

pub async fn handle(args: BuildArgs) -> anyhow::Result<()> {
    anyhow::ensure!(args.from.exists(), "baseline not found: {}", args.from.display());
    anyhow::ensure!(args.to.exists(), "target not found: {}", args.to.display());

    let created_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    let outcome = build_patch(&BuildRequest {
        from: args.from.clone(),
        to: args.to.clone(),
        format: args.format.into(),
        from_version: args.from_version,
        to_version: args.to_version,
        from_patch_index: args.from_patch_index,
        to_patch_index: args.to_patch_index,
        block_size: args.block_size,
        repo: args.repo.clone(),
        tag: args.tag,
        created_at,
        out_dir: args.out,
    })?;

    println!("patch:    {}", outcome.patch_path.display());
    println!("manifest: {}", outcome.manifest_path.display());
    if !outcome.changed_files.is_empty() || !outcome.deleted_files.is_empty() {
        println!(
            "entries:  {} changed, {} deleted",
            outcome.changed_files.len(),
            outcome.deleted_files.len()
        );
    }

    if args.publish {
        ensure_publishable(&outcome.manifest)?;

        let mut client = GithubReleases::new(&args.repo)?;
        client = match args.token {
            Some(token) => client.with_token(token),
            None => client.with_token_from_env(),
        };

        let manifest_file = outcome
            .manifest_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("manifest.json");
        let draft = ReleaseDraft {
            tag: outcome.manifest.tag.clone(),
            title: outcome.manifest.tag.clone(),
            notes: release_notes(&outcome.manifest, manifest_file)?,
        };
        client
            .publish(&draft, &[outcome.patch_path, outcome.manifest_path])
            .await
            .context("publishing release")?;
        println!("published {} {}", args.repo, outcome.manifest.tag);
    }

    Ok(())
}
