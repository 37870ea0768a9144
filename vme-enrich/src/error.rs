//! Crate-level error type for setup and pipeline failures
//!
//! Per-file problems never surface here; they become failed outcomes.

use thiserror::Error;

use crate::report::ReportError;
use crate::services::{BackupError, MBError, ScanError};

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("Configuration error: {0}")]
    Config(#[from] vme_common::Error),

    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),

    #[error("Backup failed: {0}")]
    Backup(#[from] BackupError),

    #[error("MusicBrainz client error: {0}")]
    Client(#[from] MBError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

pub type Result<T> = std::result::Result<T, EnrichError>;
