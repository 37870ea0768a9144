//! # Vault Music Enricher
//!
//! Fills artist and album notes in a markdown vault with MusicBrainz
//! metadata.
//!
//! **Pipeline:** scan → (backup) → skip check → lookup → merge → write
//!
//! The scanner classifies notes by their `Artists`/`Albums` ancestor folder,
//! the client searches MusicBrainz at a bounded request rate, and the writer
//! merges results into the YAML frontmatter without touching the note body.

pub mod error;
pub mod models;
pub mod report;
pub mod services;
pub mod utils;

use std::path::Path;

use vme_common::config::{load_toml_config, resolve_config, CliOverrides, ResolvedConfig};

pub use error::{EnrichError, Result};
pub use models::{EnrichmentOutcome, FileKind, OutcomeStatus, RunSummary, VaultFile};
pub use report::Reporter;
pub use services::{
    ClientSettings, EnrichOptions, MetadataLookup, MusicBrainzClient, MusicEnricher, ScanReport,
    VaultScanner,
};

use services::backup::{backup_music_folder, DEFAULT_BACKUP_DIR};
use utils::RetryPolicy;

/// Load the TOML file (explicit or default location) and resolve it against
/// command-line and environment overrides
pub fn load_config(cli: &CliOverrides, config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let toml_config = load_toml_config(config_path)?;
    Ok(resolve_config(cli, &toml_config)?)
}

/// Scanner using the configured folder names
pub fn scanner_for(config: &ResolvedConfig) -> VaultScanner {
    VaultScanner::new(config.artist_folder.clone(), config.album_folder.clone())
}

/// MusicBrainz client using the configured rate limit, retries and user agent
pub fn client_for(config: &ResolvedConfig) -> Result<MusicBrainzClient> {
    let settings = ClientSettings {
        user_agent: config.user_agent.clone(),
        rate_limit: config.rate_limit,
        retry: RetryPolicy::new(config.max_retries),
        ..Default::default()
    };
    Ok(MusicBrainzClient::new(settings)?)
}

/// Scan the vault without any network access
pub fn scan_vault(config: &ResolvedConfig) -> Result<ScanReport> {
    Ok(scanner_for(config).scan(&config.vault_path, &config.music_folder)?)
}

/// Full run: scan, optional backup, then enrich every note.
///
/// Setup failures (missing vault, failed backup) are returned before any
/// note is modified. Backup is ignored in dry-run.
pub async fn run_enrichment<L: MetadataLookup>(
    config: &ResolvedConfig,
    lookup: L,
    options: EnrichOptions,
    backup: bool,
) -> Result<RunSummary> {
    let report = scan_vault(config)?;

    if backup {
        if options.dry_run {
            tracing::info!("Dry run: backup skipped");
        } else {
            let backup_root = config.vault_path.join(DEFAULT_BACKUP_DIR);
            backup_music_folder(&config.vault_path, &config.music_folder, &backup_root)?;
        }
    }

    let enricher = MusicEnricher::new(lookup, options);
    Ok(enricher.enrich(report).await)
}
