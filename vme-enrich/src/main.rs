//! vme-enrich - Vault Music Enricher command-line entry point
//!
//! `enrich` runs the full pipeline against MusicBrainz; `scan` previews
//! which notes would be processed without touching the network.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vme_common::config::{CliOverrides, ResolvedConfig};
use vme_enrich::{
    client_for, load_config, run_enrichment, scan_vault, EnrichOptions, Reporter, ScanReport,
};

/// Command-line arguments for vme-enrich
#[derive(Parser, Debug)]
#[command(name = "vme-enrich")]
#[command(about = "Fill artist and album notes with MusicBrainz metadata")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Look up and write metadata for every artist and album note
    Enrich(EnrichArgs),
    /// List the notes that would be processed (no network access)
    Scan(ScanArgs),
}

/// Options shared by every subcommand
#[derive(Args, Debug)]
struct CommonArgs {
    /// Vault root folder
    vault: Option<PathBuf>,

    /// Music folder, relative to the vault root
    #[arg(long)]
    music_folder: Option<String>,

    /// Config file (default: platform config dir, then /etc/vme/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Args, Debug)]
struct SelectionArgs {
    /// Process notes even when their metadata is already complete
    #[arg(long)]
    force: bool,

    /// Leave artist notes alone
    #[arg(long)]
    skip_artists: bool,

    /// Leave album notes alone
    #[arg(long)]
    skip_albums: bool,
}

#[derive(Args, Debug)]
struct EnrichArgs {
    #[command(flatten)]
    common: CommonArgs,

    #[command(flatten)]
    selection: SelectionArgs,

    /// Report what would change without writing any file
    #[arg(long)]
    dry_run: bool,

    /// Seconds between MusicBrainz requests (minimum 0.1)
    #[arg(long)]
    rate_limit: Option<f64>,

    /// Copy the music folder aside before modifying anything
    #[arg(long)]
    backup: bool,

    /// Write a JSON report to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ScanArgs {
    #[command(flatten)]
    common: CommonArgs,

    #[command(flatten)]
    selection: SelectionArgs,
}

impl CommonArgs {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            vault_path: self.vault.clone(),
            music_folder: self.music_folder.clone(),
            log_level: self.log_level.clone(),
            ..Default::default()
        }
    }
}

impl SelectionArgs {
    fn options(&self, dry_run: bool) -> EnrichOptions {
        EnrichOptions {
            dry_run,
            force: self.force,
            skip_artists: self.skip_artists,
            skip_albums: self.skip_albums,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Command::Enrich(args) => enrich(args).await,
        Command::Scan(args) => scan(args),
    }
}

async fn enrich(args: EnrichArgs) -> Result<ExitCode> {
    let overrides = CliOverrides {
        rate_limit_seconds: args.rate_limit,
        report_path: args.report.clone(),
        ..args.common.overrides()
    };
    let config = load_config(&overrides, args.common.config.as_deref())
        .context("Failed to load configuration")?;
    init_tracing(&config);

    info!("Starting vme-enrich {}", env!("CARGO_PKG_VERSION"));
    info!(
        vault = %config.vault_path.display(),
        music_folder = %config.music_folder,
        rate_limit_ms = config.rate_limit.as_millis() as u64,
        "Configuration resolved"
    );

    let client = client_for(&config).context("Failed to create MusicBrainz client")?;
    let options = args.selection.options(args.dry_run);

    let summary = run_enrichment(&config, client, options, args.backup)
        .await
        .context("Enrichment aborted")?;

    Reporter::print_summary(&summary);

    if let Some(path) = &config.report_path {
        Reporter::write_json(&summary, path).context("Failed to write report")?;
    }

    Ok(if summary.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn scan(args: ScanArgs) -> Result<ExitCode> {
    let config = load_config(&args.common.overrides(), args.common.config.as_deref())
        .context("Failed to load configuration")?;
    init_tracing(&config);

    let report = scan_vault(&config).context("Scan failed")?;
    print_preview(&report, &args.selection.options(true));

    Ok(if report.rejections.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_preview(report: &ScanReport, options: &EnrichOptions) {
    let mut pending = 0usize;

    for file in &report.files {
        let action = match options.skip_reason(file) {
            Some(reason) => format!("skip ({})", reason),
            None => {
                pending += 1;
                "lookup".to_string()
            }
        };
        println!("{:<6} {:<40} {}", file.kind.as_str(), action, file.path.display());
    }

    for rejection in &report.rejections {
        println!("{:<6} {:<40} {}", "-", rejection.reason, rejection.path.display());
    }

    println!(
        "\n{} note(s) found, {} would be looked up, {} rejected",
        report.files.len(),
        pending,
        report.rejections.len()
    );
}

/// `RUST_LOG` wins; otherwise the configured level applies to our crates
fn init_tracing(config: &ResolvedConfig) {
    let fallback = format!(
        "vme_enrich={level},vme_common={level}",
        level = config.log_level
    );

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
