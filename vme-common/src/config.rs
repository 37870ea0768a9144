//! Configuration loading and resolution
//!
//! Every setting is resolved in the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the vault root
pub const ENV_VAULT_PATH: &str = "VME_VAULT_PATH";
/// Environment variable naming the music subfolder
pub const ENV_MUSIC_FOLDER: &str = "VME_MUSIC_FOLDER";
/// Environment variable overriding the inter-call delay (seconds)
pub const ENV_RATE_LIMIT: &str = "VME_RATE_LIMIT";
/// Environment variable overriding the log level
pub const ENV_LOG_LEVEL: &str = "VME_LOG_LEVEL";

/// Smallest accepted delay between MusicBrainz calls
pub const MIN_RATE_LIMIT_SECONDS: f64 = 0.1;

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Logging section of the TOML config
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: Option<String>,
}

/// On-disk TOML configuration. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub vault_path: Option<PathBuf>,
    pub music_folder: Option<String>,
    pub artist_folder: Option<String>,
    pub album_folder: Option<String>,
    pub rate_limit_seconds: Option<f64>,
    pub max_retries: Option<u32>,
    pub user_agent: Option<String>,
    pub report_path: Option<PathBuf>,
    pub logging: LoggingConfig,
}

/// Compiled defaults used when no other source provides a value
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub vault_path: PathBuf,
    pub music_folder: String,
    pub artist_folder: String,
    pub album_folder: String,
    pub rate_limit_seconds: f64,
    pub max_retries: u32,
    pub user_agent: String,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let vault_path = dirs::home_dir()
            .map(|d| d.join("Obsidian").join("Vault"))
            .unwrap_or_else(|| PathBuf::from("./vault"));

        Self {
            vault_path,
            music_folder: "Music".to_string(),
            artist_folder: "Artists".to_string(),
            album_folder: "Albums".to_string(),
            rate_limit_seconds: 2.0,
            max_retries: 3,
            user_agent: format!(
                "VaultMusicEnricher/{} ( https://github.com/vme/vault-music-enricher )",
                env!("CARGO_PKG_VERSION")
            ),
            log_level: "info".to_string(),
        }
    }
}

/// Values supplied on the command line. `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub vault_path: Option<PathBuf>,
    pub music_folder: Option<String>,
    pub rate_limit_seconds: Option<f64>,
    pub log_level: Option<String>,
    pub report_path: Option<PathBuf>,
}

/// Fully resolved settings
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub vault_path: PathBuf,
    pub music_folder: String,
    pub artist_folder: String,
    pub album_folder: String,
    pub rate_limit: Duration,
    pub max_retries: u32,
    pub user_agent: String,
    pub report_path: Option<PathBuf>,
    pub log_level: String,
}

/// Resolve all settings from CLI, environment, TOML and compiled defaults
pub fn resolve_config(cli: &CliOverrides, toml_config: &TomlConfig) -> Result<ResolvedConfig> {
    let defaults = CompiledDefaults::for_current_platform();

    let vault_path = cli
        .vault_path
        .clone()
        .or_else(|| env_value(ENV_VAULT_PATH).map(PathBuf::from))
        .or_else(|| toml_config.vault_path.clone())
        .unwrap_or(defaults.vault_path);

    let music_folder = cli
        .music_folder
        .clone()
        .or_else(|| env_value(ENV_MUSIC_FOLDER))
        .or_else(|| toml_config.music_folder.clone())
        .unwrap_or(defaults.music_folder);

    let rate_limit_seconds = match cli.rate_limit_seconds {
        Some(secs) => secs,
        None => match env_value(ENV_RATE_LIMIT) {
            Some(raw) => raw.trim().parse::<f64>().map_err(|_| {
                Error::Config(format!("{} is not a number: {:?}", ENV_RATE_LIMIT, raw))
            })?,
            None => toml_config
                .rate_limit_seconds
                .unwrap_or(defaults.rate_limit_seconds),
        },
    };

    let log_level = cli
        .log_level
        .clone()
        .or_else(|| env_value(ENV_LOG_LEVEL))
        .or_else(|| toml_config.logging.level.clone())
        .unwrap_or(defaults.log_level);

    Ok(ResolvedConfig {
        vault_path,
        music_folder: non_empty_segment("music_folder", music_folder)?,
        artist_folder: non_empty_segment(
            "artist_folder",
            toml_config
                .artist_folder
                .clone()
                .unwrap_or(defaults.artist_folder),
        )?,
        album_folder: non_empty_segment(
            "album_folder",
            toml_config
                .album_folder
                .clone()
                .unwrap_or(defaults.album_folder),
        )?,
        rate_limit: validate_rate_limit(rate_limit_seconds)?,
        max_retries: toml_config.max_retries.unwrap_or(defaults.max_retries),
        user_agent: toml_config
            .user_agent
            .clone()
            .unwrap_or(defaults.user_agent),
        report_path: cli
            .report_path
            .clone()
            .or_else(|| toml_config.report_path.clone()),
        log_level: normalize_log_level(&log_level)?,
    })
}

/// Load the TOML config file.
///
/// With an explicit path the file must exist. Without one, the platform
/// default location is tried and a missing file yields an empty config.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit {
        Some(path) => {
            if !path.is_file() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            path.to_path_buf()
        }
        None => match default_config_path() {
            Some(path) => path,
            None => {
                tracing::debug!("No config file found, using defaults");
                return Ok(TomlConfig::default());
            }
        },
    };

    read_toml_config(&path)
}

/// Parse a TOML config file
pub fn read_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
    tracing::debug!(path = %path.display(), "Loaded config file");
    Ok(config)
}

/// Locate the config file for the platform, if one exists
pub fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("vme").join("config.toml"));
    if let Some(path) = user_config {
        if path.is_file() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/vme/config.toml");
        if system_config.is_file() {
            return Some(system_config);
        }
    }

    None
}

/// Validate and convert the inter-call delay
pub fn validate_rate_limit(seconds: f64) -> Result<Duration> {
    if !seconds.is_finite() || seconds < MIN_RATE_LIMIT_SECONDS {
        return Err(Error::Config(format!(
            "rate limit must be at least {} seconds, got {}",
            MIN_RATE_LIMIT_SECONDS, seconds
        )));
    }
    Ok(Duration::from_secs_f64(seconds))
}

/// Normalize a log level name to the form `EnvFilter` understands
pub fn normalize_log_level(level: &str) -> Result<String> {
    let lower = level.trim().to_lowercase();
    let normalized = match lower.as_str() {
        "warning" => "warn".to_string(),
        "critical" => "error".to_string(),
        _ => lower,
    };

    if VALID_LOG_LEVELS.contains(&normalized.as_str()) {
        Ok(normalized)
    } else {
        Err(Error::Config(format!(
            "Invalid log level {:?}. Must be one of {}",
            level,
            VALID_LOG_LEVELS.join(", ")
        )))
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn non_empty_segment(field: &str, value: String) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::Config(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}
