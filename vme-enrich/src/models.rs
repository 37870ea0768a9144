//! Data model shared by the scanner, lookup, writer and orchestrator

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::services::frontmatter::{extract_wikilinks, link_target};

/// Frontmatter key holding the MusicBrainz id
pub const KEY_MBID: &str = "musicbrainz_id";
/// Keys a note may already carry its MusicBrainz id under, in priority order
pub const ID_KEYS: &[&str] = &[KEY_MBID, "mbid", "musicbrainz", "id"];
/// Frontmatter key holding the genre list
pub const KEY_GENRES: &str = "genres";
/// Frontmatter key holding the album artist reference
pub const KEY_ARTIST: &str = "artist";
/// Frontmatter key holding the album release date
pub const KEY_RELEASE_DATE: &str = "release_date";
/// Frontmatter discriminator key
pub const KEY_TYPE: &str = "type";

/// Kind of note, inferred from its folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Artist,
    Album,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Artist => "artist",
            FileKind::Album => "album",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified, parsed markdown note
#[derive(Debug, Clone)]
pub struct VaultFile {
    /// Absolute path on disk
    pub path: PathBuf,
    /// Raw file contents as read
    pub raw: String,
    /// Parsed frontmatter (empty if the note has none)
    pub frontmatter: Mapping,
    /// Everything after the frontmatter block, byte for byte
    pub body: String,
    /// Artist or album
    pub kind: FileKind,
    /// Display name (file stem)
    pub name: String,
    /// Raw `[[...]]` link contents found in the body, in order
    pub links: Vec<String>,
}

impl VaultFile {
    /// Artist name to narrow an album search.
    ///
    /// First body wiki-link, else the existing `artist` frontmatter value.
    pub fn artist_hint(&self) -> Option<String> {
        if let Some(hint) = self.links.iter().find_map(|raw| link_target(raw)) {
            return Some(hint);
        }

        let existing = self.frontmatter.get(KEY_ARTIST)?.as_str()?;
        match extract_wikilinks(existing).first() {
            Some(raw) => link_target(raw),
            None => {
                let trimmed = existing.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
        }
    }

    /// MusicBrainz id already present in the frontmatter, under any of
    /// [`ID_KEYS`]
    pub fn existing_id(&self) -> Option<String> {
        ID_KEYS.iter().find_map(|key| match self.frontmatter.get(*key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    /// True when the note already carries everything a lookup would fill in:
    /// an id, at least one genre, and for albums an artist and release date.
    pub fn is_complete(&self) -> bool {
        let base = self.existing_id().is_some() && has_value(&self.frontmatter, KEY_GENRES);
        match self.kind {
            FileKind::Artist => base,
            FileKind::Album => {
                base && has_value(&self.frontmatter, KEY_ARTIST)
                    && has_value(&self.frontmatter, KEY_RELEASE_DATE)
            }
        }
    }
}

/// True when `key` is present with a non-empty value
pub fn has_value(map: &Mapping, key: &str) -> bool {
    map.get(key).map(|v| !is_empty_value(v)).unwrap_or(false)
}

/// Null, blank strings and empty sequences/mappings count as empty
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Sequence(seq) => seq.is_empty(),
        Value::Mapping(map) => map.is_empty(),
        _ => false,
    }
}

/// Artist metadata from MusicBrainz
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtistRecord {
    pub musicbrainz_id: String,
    pub name: String,
    pub sort_name: Option<String>,
    pub country: Option<String>,
    /// Year the artist was born or formed
    pub formed: Option<String>,
    /// Year the artist died or disbanded
    pub disbanded: Option<String>,
    /// MusicBrainz artist type (Person, Group, ...)
    pub artist_type: Option<String>,
    pub genres: Vec<String>,
    pub disambiguation: Option<String>,
}

/// Release (album) metadata from MusicBrainz
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlbumRecord {
    pub musicbrainz_id: String,
    pub title: String,
    /// Artist display name; written as `[[name]]`
    pub artist: String,
    pub artist_mbid: Option<String>,
    /// ISO-8601 date as given by MusicBrainz (`2019`, `2019-05`, `2019-05-17`)
    pub release_date: Option<String>,
    pub country: Option<String>,
    pub label: Option<String>,
    pub barcode: Option<String>,
    pub track_count: Option<u32>,
    pub genres: Vec<String>,
    /// Release status, lowercase (`official`, `promotion`, ...)
    pub status: Option<String>,
}

/// Result of a successful lookup
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Artist(ArtistRecord),
    Album(AlbumRecord),
}

impl Record {
    pub fn kind(&self) -> FileKind {
        match self {
            Record::Artist(_) => FileKind::Artist,
            Record::Album(_) => FileKind::Album,
        }
    }
}

/// Terminal state of one file in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    /// Frontmatter changed (or would change, in dry-run)
    Updated,
    /// Lookup succeeded but nothing changed; no bytes written
    Unchanged,
    /// Lookup never attempted
    Skipped,
    Failed,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Updated => "updated",
            OutcomeStatus::Unchanged => "unchanged",
            OutcomeStatus::Skipped => "skipped",
            OutcomeStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichmentOutcome {
    pub path: PathBuf,
    /// `None` when the file could not be classified or parsed
    pub kind: Option<FileKind>,
    pub status: OutcomeStatus,
    pub message: String,
    /// Fields written (or that would be written in dry-run)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Mapping>,
}

impl EnrichmentOutcome {
    pub fn skipped(file: &VaultFile, message: impl Into<String>) -> Self {
        Self {
            path: file.path.clone(),
            kind: Some(file.kind),
            status: OutcomeStatus::Skipped,
            message: message.into(),
            metadata: None,
        }
    }

    pub fn failed(file: &VaultFile, message: impl Into<String>) -> Self {
        Self {
            path: file.path.clone(),
            kind: Some(file.kind),
            status: OutcomeStatus::Failed,
            message: message.into(),
            metadata: None,
        }
    }
}

/// Outcome counts for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub total: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Everything a run produced, in processing order
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub outcomes: Vec<EnrichmentOutcome>,
    pub elapsed: Duration,
    pub dry_run: bool,
}

impl RunSummary {
    pub fn counts(&self) -> OutcomeCounts {
        let mut counts = OutcomeCounts {
            total: self.outcomes.len(),
            ..Default::default()
        };
        for outcome in &self.outcomes {
            match outcome.status {
                OutcomeStatus::Updated => counts.updated += 1,
                OutcomeStatus::Unchanged => counts.unchanged += 1,
                OutcomeStatus::Skipped => counts.skipped += 1,
                OutcomeStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    pub fn failures(&self) -> impl Iterator<Item = &EnrichmentOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Failed)
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}
