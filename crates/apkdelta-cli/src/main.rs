use clap::{Parser, Subcommand};
use tracing::Level;

mod commands;

use commands::{apply::ApplyArgs, build::BuildArgs, inspect::InspectArgs, update::UpdateArgs};

#[derive(Parser)]
#[command(
    name = "apkdelta",
    about = "Binary delta updates for Android application packages",
    version,
    author,
    long_about = "Builds compact binary patches between two APKs, publishes them as release \
                  artifacts, and applies patch chains on devices to reconstruct the latest \
                  version without a full download."
)]
struct Cli {
    /// Set the logging level
    #[arg(short, long, value_enum, default_value = "info")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build a patch (and manifest) between two APKs
    Build(BuildArgs),

    /// Apply a single local patch to a baseline APK
    Apply(ApplyArgs),

    /// Walk the release catalog and apply every reachable patch
    Update(UpdateArgs),

    /// Print a manifest or an opatch header
    Inspect(InspectArgs),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(Level::from(cli.log_level))
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Build(args) => commands::build::handle(args).await,
        Commands::Apply(args) => commands::apply::handle(args),
        Commands::Update(args) => commands::update::handle(args).await,
        Commands::Inspect(args) => commands::inspect::handle(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(commands::exit_code(&e));
    }

    Ok(())
}
