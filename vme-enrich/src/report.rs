//! Run summary output: console table and JSON report

use chrono::Utc;
use serde::Serialize;
use serde_yaml::Mapping;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::{FileKind, OutcomeCounts, OutcomeStatus, RunSummary};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// JSON report document
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub timestamp: String,
    pub dry_run: bool,
    pub elapsed_seconds: f64,
    pub counts: OutcomeCounts,
    pub files: Vec<FileEntry<'a>>,
    pub failures: Vec<FailureEntry<'a>>,
}

#[derive(Debug, Serialize)]
pub struct FileEntry<'a> {
    pub path: &'a Path,
    pub kind: Option<FileKind>,
    pub status: OutcomeStatus,
    pub message: &'a str,
    pub metadata: Option<&'a Mapping>,
}

#[derive(Debug, Serialize)]
pub struct FailureEntry<'a> {
    pub path: &'a Path,
    pub message: &'a str,
}

impl<'a> JsonReport<'a> {
    pub fn from_summary(summary: &'a RunSummary) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            dry_run: summary.dry_run,
            elapsed_seconds: summary.elapsed.as_secs_f64(),
            counts: summary.counts(),
            files: summary
                .outcomes
                .iter()
                .map(|o| FileEntry {
                    path: &o.path,
                    kind: o.kind,
                    status: o.status,
                    message: &o.message,
                    metadata: o.metadata.as_ref(),
                })
                .collect(),
            failures: summary
                .failures()
                .map(|o| FailureEntry {
                    path: &o.path,
                    message: &o.message,
                })
                .collect(),
        }
    }
}

/// Prints and saves run summaries
pub struct Reporter;

impl Reporter {
    /// Console summary text
    pub fn render_summary(summary: &RunSummary) -> String {
        let counts = summary.counts();
        let mut out = String::new();

        let title = if summary.dry_run {
            "Enrichment summary (dry run)"
        } else {
            "Enrichment summary"
        };
        out.push_str(title);
        out.push('\n');
        out.push_str(&"=".repeat(title.len()));
        out.push('\n');

        for (label, count) in [
            ("Total", counts.total),
            ("Updated", counts.updated),
            ("Unchanged", counts.unchanged),
            ("Skipped", counts.skipped),
            ("Failed", counts.failed),
        ] {
            out.push_str(&format!("{:<10} {:>6}\n", label, count));
        }
        out.push_str(&format!("Elapsed    {:>5.1}s\n", summary.elapsed.as_secs_f64()));

        if counts.failed > 0 {
            out.push_str("\nFailures:\n");
            for failure in summary.failures() {
                out.push_str(&format!(
                    "  {}: {}\n",
                    failure.path.display(),
                    failure.message
                ));
            }
        }

        out
    }

    pub fn print_summary(summary: &RunSummary) {
        println!("{}", Self::render_summary(summary));
    }

    /// Write the JSON report to `path`, creating parent directories
    pub fn write_json(summary: &RunSummary, path: &Path) -> Result<(), ReportError> {
        let json = serde_json::to_string_pretty(&JsonReport::from_summary(summary))?;

        let io_err = |source: io::Error| ReportError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(path, json).map_err(io_err)?;

        tracing::info!(path = %path.display(), "Report written");
        Ok(())
    }
}
