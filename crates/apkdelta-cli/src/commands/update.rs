//! `apkdelta update`

use apkdelta_release::GithubReleases;
use apkdelta_updater::ChainApplier;
use clap::Args;
use std::path::PathBuf;

use super::EXIT_NO_PATCH;

#[derive(Args)]
pub struct UpdateArgs {
    /// Repository holding the patch releases, owner/name
    #[arg(long)]
    repo: String,

    /// Baseline APK to upgrade from
    #[arg(long, default_value = "from.apk")]
    from: PathBuf,

    /// Where to write the upgraded APK
    #[arg(long, default_value = "to.apk")]
    output: PathBuf,

    /// How many release pages to walk
    #[arg(long, default_value_t = 5)]
    max_pages: u32,

    /// Release page size
    #[arg(long, default_value_t = 30)]
    per_page: u32,

    /// Directory for downloaded patches and the work file
    #[arg(long, default_value = ".")]
    work_dir: PathBuf,

    /// Keep downloaded patch files instead of removing them afterwards
    #[arg(long)]
    keep: bool,

    /// GitHub token (falls back to GITHUB_TOKEN / GH_TOKEN / GITHUB_PAT)
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

pub async fn handle(args: UpdateArgs) -> anyhow::Result<()> {
    anyhow::ensure!(args.from.exists(), "baseline not found: {}", args.from.display());

    let mut source = GithubReleases::new(&args.repo)?
        .with_max_pages(args.max_pages)
        .with_per_page(args.per_page);
    source = match args.token {
        Some(token) => source.with_token(token),
        None => source.with_token_from_env(),
    };

    let applier = ChainApplier::new(&source, &args.work_dir).with_keep_artifacts(args.keep);
    let outcome = applier.upgrade(&args.from, &args.output).await?;

    if !outcome.upgraded() {
        eprintln!("no applicable patch found for current apk (fallback to full download)");
        std::process::exit(EXIT_NO_PATCH);
    }

    println!(
        "applied {} patch(es): {}",
        outcome.applied,
        outcome.tags.join(" -> ")
    );
    println!("ok -> {}", args.output.display());
    Ok(())
}
