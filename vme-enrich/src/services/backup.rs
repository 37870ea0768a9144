//! Pre-run backup of the music folder

use chrono::Local;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Folder under the vault root where backups land by default
pub const DEFAULT_BACKUP_DIR: &str = ".vme-backups";

/// Backup errors. Any of these aborts the run before files are touched.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Music folder not found: {0}")]
    SourceMissing(PathBuf),

    #[error("Backup target already exists: {0}")]
    TargetExists(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Failed to copy {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Copy `<vault>/<music_folder>` to `<backup_root>/<music_folder>-<timestamp>/`.
///
/// Returns the backup directory.
pub fn backup_music_folder(
    vault: &Path,
    music_folder: &str,
    backup_root: &Path,
) -> Result<PathBuf, BackupError> {
    let source = vault.join(music_folder);
    if !source.is_dir() {
        return Err(BackupError::SourceMissing(source));
    }

    let folder_name = Path::new(music_folder)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "music".to_string());
    let stamp = Local::now().format("%Y%m%d-%H%M%S");
    let target = backup_root.join(format!("{}-{}", folder_name, stamp));

    if target.exists() {
        return Err(BackupError::TargetExists(target));
    }

    tracing::info!(
        source = %source.display(),
        target = %target.display(),
        "Backing up music folder"
    );

    let mut copied = 0usize;
    for entry in WalkDir::new(&source).follow_links(false) {
        let entry = entry.map_err(|e| BackupError::Walk {
            path: e.path().map(Path::to_path_buf).unwrap_or_else(|| source.clone()),
            source: e,
        })?;

        let relative = entry.path().strip_prefix(&source).unwrap_or(entry.path());
        let destination = target.join(relative);

        let io_err = |source: io::Error| BackupError::Io {
            path: entry.path().to_path_buf(),
            source,
        };

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&destination).map_err(io_err)?;
        } else if entry.file_type().is_file() {
            std::fs::copy(entry.path(), &destination).map_err(io_err)?;
            copied += 1;
        }
    }

    tracing::info!(files = copied, target = %target.display(), "Backup complete");
    Ok(target)
}
