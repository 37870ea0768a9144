//! Frontmatter merging and note rewriting
//!
//! Merge strategy: new non-empty values overwrite old ones, keys the record
//! does not define are left alone, empty record fields never remove
//! anything. The note body is written back byte for byte.

use serde_yaml::{Mapping, Value};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::frontmatter::{format_wikilink, render_note, FrontmatterError};
use crate::models::{
    is_empty_value, AlbumRecord, ArtistRecord, EnrichmentOutcome, FileKind, OutcomeStatus, Record,
    VaultFile, KEY_TYPE,
};

/// Note write errors
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Render(#[from] FrontmatterError),
}

/// Merged frontmatter plus the subset of keys whose value changed
#[derive(Debug, Clone, PartialEq)]
pub struct MergeResult {
    pub merged: Mapping,
    pub changed: Mapping,
}

impl MergeResult {
    pub fn is_unchanged(&self) -> bool {
        self.changed.is_empty()
    }
}

/// Non-empty record fields in schema order, excluding `type`
pub fn record_fields(record: &Record) -> Vec<(&'static str, Value)> {
    let fields = match record {
        Record::Artist(artist) => artist_fields(artist),
        Record::Album(album) => album_fields(album),
    };

    fields
        .into_iter()
        .filter(|(_, value)| !is_empty_value(value))
        .collect()
}

fn artist_fields(artist: &ArtistRecord) -> Vec<(&'static str, Value)> {
    vec![
        ("musicbrainz_id", string(Some(&artist.musicbrainz_id))),
        ("name", string(Some(&artist.name))),
        ("sort_name", string(artist.sort_name.as_ref())),
        ("country", string(artist.country.as_ref())),
        ("formed", string(artist.formed.as_ref())),
        ("disbanded", string(artist.disbanded.as_ref())),
        ("artist_type", string(artist.artist_type.as_ref())),
        ("genres", sequence(&artist.genres)),
        ("disambiguation", string(artist.disambiguation.as_ref())),
    ]
}

fn album_fields(album: &AlbumRecord) -> Vec<(&'static str, Value)> {
    let artist = if album.artist.trim().is_empty() {
        Value::Null
    } else {
        Value::String(format_wikilink(&album.artist))
    };

    vec![
        ("musicbrainz_id", string(Some(&album.musicbrainz_id))),
        ("title", string(Some(&album.title))),
        ("artist", artist),
        ("artist_mbid", string(album.artist_mbid.as_ref())),
        ("release_date", string(album.release_date.as_ref())),
        ("country", string(album.country.as_ref())),
        ("label", string(album.label.as_ref())),
        ("barcode", string(album.barcode.as_ref())),
        (
            "track_count",
            album.track_count.map(Value::from).unwrap_or(Value::Null),
        ),
        ("genres", sequence(&album.genres)),
        ("status", string(album.status.as_ref())),
    ]
}

fn string(value: Option<&String>) -> Value {
    match value {
        Some(s) if !s.trim().is_empty() => Value::String(s.trim().to_string()),
        _ => Value::Null,
    }
}

fn sequence(items: &[String]) -> Value {
    Value::Sequence(items.iter().map(|s| Value::String(s.clone())).collect())
}

/// Merge `record` into `existing` for a note of the given kind
pub fn merge_frontmatter(existing: &Mapping, kind: FileKind, record: &Record) -> MergeResult {
    let mut merged = existing.clone();
    let mut changed = Mapping::new();

    let type_value = Value::String(kind.as_str().to_string());
    let fields = std::iter::once((KEY_TYPE, type_value)).chain(record_fields(record));

    for (key, value) in fields {
        let key = Value::String(key.to_string());
        if merged.get(&key) != Some(&value) {
            merged.insert(key.clone(), value.clone());
            changed.insert(key, value);
        }
    }

    MergeResult { merged, changed }
}

/// Applies lookup results to notes
pub struct MetadataWriter {
    dry_run: bool,
}

impl MetadataWriter {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Merge `record` into `file` and rewrite it if anything changed.
    ///
    /// In dry-run nothing is written, but the outcome is the same as a real
    /// pass would produce.
    pub fn apply(&self, file: &VaultFile, record: Option<&Record>) -> EnrichmentOutcome {
        let Some(record) = record else {
            return EnrichmentOutcome::failed(file, "no match found");
        };

        if record.kind() != file.kind {
            return EnrichmentOutcome::failed(
                file,
                format!("{} record cannot be applied to {} note", record.kind(), file.kind),
            );
        }

        let result = merge_frontmatter(&file.frontmatter, file.kind, record);

        if result.is_unchanged() {
            tracing::debug!(path = %file.path.display(), "Frontmatter already up to date");
            return EnrichmentOutcome {
                path: file.path.clone(),
                kind: Some(file.kind),
                status: OutcomeStatus::Unchanged,
                message: "already up to date".to_string(),
                metadata: None,
            };
        }

        if self.dry_run {
            tracing::info!(
                path = %file.path.display(),
                fields = result.changed.len(),
                "Dry run: would update frontmatter"
            );
        } else if let Err(e) = write_note(&file.path, &result.merged, &file.body) {
            tracing::error!(path = %file.path.display(), error = %e, "Failed to write note");
            return EnrichmentOutcome::failed(file, format!("write failed: {}", e));
        }

        let keys: Vec<&str> = result.changed.keys().filter_map(Value::as_str).collect();

        EnrichmentOutcome {
            path: file.path.clone(),
            kind: Some(file.kind),
            status: OutcomeStatus::Updated,
            message: format!("{} field(s) changed: {}", keys.len(), keys.join(", ")),
            metadata: Some(result.changed),
        }
    }
}

/// Render and atomically write a note
pub fn write_note(path: &Path, frontmatter: &Mapping, body: &str) -> Result<(), WriteError> {
    let contents = render_note(frontmatter, body)?;
    write_atomic(path, contents.as_bytes())?;
    tracing::debug!(path = %path.display(), bytes = contents.len(), "Note written");
    Ok(())
}

/// Write to a hidden sibling temp file, then rename over `path`.
///
/// An existing file's permissions carry over to the replacement.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let temp_path = temp_path_for(path);
    std::fs::write(&temp_path, contents)?;

    let replaced = match std::fs::metadata(path) {
        Ok(original) => std::fs::set_permissions(&temp_path, original.permissions()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
    .and_then(|()| std::fs::rename(&temp_path, path));

    if let Err(e) = replaced {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e);
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", file_name))
}
