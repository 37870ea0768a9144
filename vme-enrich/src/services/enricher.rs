//! Enrichment orchestrator
//!
//! Drives each scanned note through skip check, lookup and merge. Files are
//! handled one at a time; a failure on one file never stops the run.

use std::time::Instant;

use super::lookup::MetadataLookup;
use super::metadata_writer::MetadataWriter;
use super::vault_scanner::{Rejection, ScanReport};
use crate::models::{EnrichmentOutcome, FileKind, OutcomeStatus, Record, RunSummary, VaultFile};

/// Run switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichOptions {
    /// Compute outcomes without writing
    pub dry_run: bool,
    /// Look up files even when their frontmatter is already complete
    pub force: bool,
    pub skip_artists: bool,
    pub skip_albums: bool,
}

impl EnrichOptions {
    /// Skip check applied before any network call.
    ///
    /// Kind toggles win over `force`; `force` only bypasses the
    /// completeness check.
    pub fn skip_reason(&self, file: &VaultFile) -> Option<&'static str> {
        let disabled = match file.kind {
            FileKind::Artist => self.skip_artists.then_some("artist processing disabled"),
            FileKind::Album => self.skip_albums.then_some("album processing disabled"),
        };
        if disabled.is_some() {
            return disabled;
        }

        if !self.force && file.is_complete() {
            return Some("metadata already complete");
        }
        None
    }
}

/// Orchestrates lookup and write for every scanned note
pub struct MusicEnricher<L> {
    lookup: L,
    writer: MetadataWriter,
    options: EnrichOptions,
}

impl<L: MetadataLookup> MusicEnricher<L> {
    pub fn new(lookup: L, options: EnrichOptions) -> Self {
        Self {
            lookup,
            writer: MetadataWriter::new(options.dry_run),
            options,
        }
    }

    pub fn options(&self) -> EnrichOptions {
        self.options
    }

    /// Why `file` would be skipped without a lookup, if it would be
    pub fn skip_reason(&self, file: &VaultFile) -> Option<&'static str> {
        self.options.skip_reason(file)
    }

    /// Process a whole scan.
    ///
    /// Rejections come first as failed outcomes, then artists, then albums,
    /// each ordered by path.
    pub async fn enrich(&self, report: ScanReport) -> RunSummary {
        let start = Instant::now();
        let ScanReport { mut files, rejections } = report;

        files.sort_by(|a, b| {
            kind_rank(a.kind)
                .cmp(&kind_rank(b.kind))
                .then_with(|| a.path.cmp(&b.path))
        });

        let mut outcomes: Vec<EnrichmentOutcome> =
            rejections.into_iter().map(rejection_outcome).collect();

        tracing::info!(
            files = files.len(),
            rejected = outcomes.len(),
            dry_run = self.options.dry_run,
            force = self.options.force,
            "Starting enrichment"
        );

        let total = files.len();
        for (index, file) in files.iter().enumerate() {
            let outcome = self.process_file(file).await;
            log_progress(index + 1, total, &outcome);
            outcomes.push(outcome);
        }

        let summary = RunSummary {
            outcomes,
            elapsed: start.elapsed(),
            dry_run: self.options.dry_run,
        };

        let counts = summary.counts();
        tracing::info!(
            total = counts.total,
            updated = counts.updated,
            unchanged = counts.unchanged,
            skipped = counts.skipped,
            failed = counts.failed,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Enrichment finished"
        );

        summary
    }

    /// Skip check, lookup and merge for one note
    pub async fn process_file(&self, file: &VaultFile) -> EnrichmentOutcome {
        if let Some(reason) = self.skip_reason(file) {
            return EnrichmentOutcome::skipped(file, reason);
        }

        let record = match (file.kind, file.existing_id()) {
            (FileKind::Artist, Some(id)) => {
                tracing::debug!(name = %file.name, id = %id, "Fetching artist by existing id");
                self.lookup
                    .artist_by_id(&id)
                    .await
                    .map(|found| found.map(Record::Artist))
            }
            (FileKind::Album, Some(id)) => {
                tracing::debug!(title = %file.name, id = %id, "Fetching album by existing id");
                self.lookup
                    .album_by_id(&id)
                    .await
                    .map(|found| found.map(Record::Album))
            }
            (FileKind::Artist, None) => self
                .lookup
                .lookup_artist(&file.name)
                .await
                .map(|found| found.map(Record::Artist)),
            (FileKind::Album, None) => {
                let hint = file.artist_hint();
                tracing::debug!(title = %file.name, hint = ?hint, "Looking up album");
                self.lookup
                    .lookup_album(&file.name, hint.as_deref())
                    .await
                    .map(|found| found.map(Record::Album))
            }
        };

        match record {
            Ok(record) => self.writer.apply(file, record.as_ref()),
            Err(e) => {
                tracing::error!(path = %file.path.display(), error = %e, "Lookup failed");
                EnrichmentOutcome::failed(file, format!("lookup failed: {}", e))
            }
        }
    }
}

fn kind_rank(kind: FileKind) -> u8 {
    match kind {
        FileKind::Artist => 0,
        FileKind::Album => 1,
    }
}

fn rejection_outcome(rejection: Rejection) -> EnrichmentOutcome {
    EnrichmentOutcome {
        path: rejection.path,
        kind: None,
        status: OutcomeStatus::Failed,
        message: rejection.reason,
        metadata: None,
    }
}

fn log_progress(index: usize, total: usize, outcome: &EnrichmentOutcome) {
    let path = outcome.path.display();
    match outcome.status {
        OutcomeStatus::Failed => tracing::error!(
            "[{}/{}] {} {}: {}",
            index,
            total,
            outcome.status,
            path,
            outcome.message
        ),
        _ => tracing::info!(
            "[{}/{}] {} {}: {}",
            index,
            total,
            outcome.status,
            path,
            outcome.message
        ),
    }
}
