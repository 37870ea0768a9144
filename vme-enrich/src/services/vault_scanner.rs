//! Vault scanner
//!
//! Recursive markdown discovery under the vault's music folder, with
//! artist/album classification by ancestor folder name.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

use super::frontmatter::{extract_wikilinks, parse_note};
use crate::models::{FileKind, VaultFile};

/// Fatal scanner errors. Per-file problems become [`Rejection`]s instead.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Specified path does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// A markdown file the scanner found but could not use
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub path: PathBuf,
    pub reason: String,
}

/// Scan result
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Classified and parsed notes, ordered by path
    pub files: Vec<VaultFile>,
    /// Notes excluded from processing, with the reason
    pub rejections: Vec<Rejection>,
}

/// Markdown note scanner
pub struct VaultScanner {
    artist_token: String,
    album_token: String,
}

impl VaultScanner {
    /// Create a scanner classifying by the given folder names
    pub fn new(artist_token: impl Into<String>, album_token: impl Into<String>) -> Self {
        Self {
            artist_token: artist_token.into(),
            album_token: album_token.into(),
        }
    }

    /// Scan `<vault_root>/<music_folder>` for artist and album notes
    pub fn scan(&self, vault_root: &Path, music_folder: &str) -> Result<ScanReport, ScanError> {
        ensure_directory(vault_root)?;
        let music_root = vault_root.join(music_folder);
        ensure_directory(&music_root)?;

        let mut report = ScanReport::default();

        let walker = WalkDir::new(&music_root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Error accessing entry: {}", e);
                    if let Some(path) = e.path() {
                        report.rejections.push(Rejection {
                            path: path.to_path_buf(),
                            reason: format!("unreadable: {}", e),
                        });
                    }
                    continue;
                }
            };

            if !entry.file_type().is_file() || !is_markdown(entry.path()) {
                continue;
            }

            match self.load(entry.path(), &music_root) {
                Ok(file) => {
                    tracing::debug!(path = %file.path.display(), kind = %file.kind, "Discovered note");
                    report.files.push(file);
                }
                Err(reason) => {
                    tracing::warn!(path = %entry.path().display(), reason = %reason, "Excluding note");
                    report.rejections.push(Rejection {
                        path: entry.path().to_path_buf(),
                        reason,
                    });
                }
            }
        }

        tracing::info!(
            artists = report.files.iter().filter(|f| f.kind == FileKind::Artist).count(),
            albums = report.files.iter().filter(|f| f.kind == FileKind::Album).count(),
            rejected = report.rejections.len(),
            "Scan complete"
        );

        Ok(report)
    }

    /// Classify by the nearest ancestor folder matching a token
    pub fn classify(&self, path: &Path, music_root: &Path) -> Option<FileKind> {
        let relative = path.strip_prefix(music_root).unwrap_or(path);
        let parent = relative.parent()?;

        parent
            .components()
            .rev()
            .filter_map(|c| match c {
                Component::Normal(name) => name.to_str(),
                _ => None,
            })
            .find_map(|segment| {
                if segment.eq_ignore_ascii_case(&self.artist_token) {
                    Some(FileKind::Artist)
                } else if segment.eq_ignore_ascii_case(&self.album_token) {
                    Some(FileKind::Album)
                } else {
                    None
                }
            })
    }

    fn load(&self, path: &Path, music_root: &Path) -> Result<VaultFile, String> {
        let kind = self.classify(path, music_root).ok_or_else(|| {
            format!(
                "not under an '{}' or '{}' folder",
                self.artist_token, self.album_token
            )
        })?;

        let raw = std::fs::read_to_string(path).map_err(|e| format!("read failed: {}", e))?;
        let parsed = parse_note(&raw).map_err(|e| e.to_string())?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let links = extract_wikilinks(&parsed.body);

        Ok(VaultFile {
            path: path.to_path_buf(),
            raw,
            frontmatter: parsed.frontmatter,
            body: parsed.body,
            kind,
            name,
            links,
        })
    }
}

impl Default for VaultScanner {
    fn default() -> Self {
        Self::new("Artists", "Albums")
    }
}

fn ensure_directory(path: &Path) -> Result<(), ScanError> {
    if !path.exists() {
        return Err(ScanError::PathNotFound(path.to_path_buf()));
    }
    if !path.is_dir() {
        return Err(ScanError::NotADirectory(path.to_path_buf()));
    }
    Ok(())
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("md"))
        .unwrap_or(false)
}
