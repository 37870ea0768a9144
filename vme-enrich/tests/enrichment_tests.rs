//! End-to-end enrichment tests over a temporary vault with canned lookups

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_yaml::{Mapping, Value};
use tempfile::TempDir;

use vme_common::config::ResolvedConfig;
use vme_enrich::models::{AlbumRecord, ArtistRecord, OutcomeStatus, RunSummary};
use vme_enrich::services::frontmatter::parse_note;
use vme_enrich::services::{EnrichOptions, MBError, MetadataLookup};
use vme_enrich::{run_enrichment, EnrichError};

/// In-memory lookup recording every call
#[derive(Default)]
struct StaticLookup {
    artists: HashMap<String, ArtistRecord>,
    albums: HashMap<String, AlbumRecord>,
    album_calls: Mutex<Vec<(String, Option<String>)>>,
    artist_calls: Mutex<Vec<String>>,
    id_calls: Mutex<Vec<String>>,
}

impl StaticLookup {
    fn with_igor() -> Self {
        let mut lookup = Self::default();
        lookup.albums.insert(
            "IGOR".to_string(),
            AlbumRecord {
                musicbrainz_id: "rel-igor".to_string(),
                title: "IGOR".to_string(),
                artist: "Tyler, the Creator".to_string(),
                artist_mbid: Some("tyler-id".to_string()),
                release_date: Some("2019-05-17".to_string()),
                country: Some("US".to_string()),
                label: Some("Columbia".to_string()),
                track_count: Some(12),
                genres: vec!["hip hop".to_string(), "neo soul".to_string()],
                status: Some("official".to_string()),
                ..Default::default()
            },
        );
        lookup.artists.insert(
            "Mac Miller".to_string(),
            ArtistRecord {
                musicbrainz_id: "mac-id".to_string(),
                name: "Mac Miller".to_string(),
                sort_name: Some("Miller, Mac".to_string()),
                genres: vec!["hip hop".to_string()],
                artist_type: Some("Person".to_string()),
                ..Default::default()
            },
        );
        lookup
    }

    fn lookup_count(&self) -> usize {
        self.album_calls.lock().unwrap().len()
            + self.artist_calls.lock().unwrap().len()
            + self.id_calls.lock().unwrap().len()
    }

    fn search_count(&self) -> usize {
        self.album_calls.lock().unwrap().len() + self.artist_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl MetadataLookup for StaticLookup {
    async fn lookup_artist(&self, name: &str) -> Result<Option<ArtistRecord>, MBError> {
        self.artist_calls.lock().unwrap().push(name.to_string());
        Ok(self.artists.get(name).cloned())
    }

    async fn lookup_album(
        &self,
        title: &str,
        artist_hint: Option<&str>,
    ) -> Result<Option<AlbumRecord>, MBError> {
        self.album_calls
            .lock()
            .unwrap()
            .push((title.to_string(), artist_hint.map(str::to_string)));
        Ok(self.albums.get(title).cloned())
    }

    async fn artist_by_id(&self, mbid: &str) -> Result<Option<ArtistRecord>, MBError> {
        self.id_calls.lock().unwrap().push(mbid.to_string());
        Ok(self
            .artists
            .values()
            .find(|a| a.musicbrainz_id == mbid)
            .cloned())
    }

    async fn album_by_id(&self, mbid: &str) -> Result<Option<AlbumRecord>, MBError> {
        self.id_calls.lock().unwrap().push(mbid.to_string());
        Ok(self
            .albums
            .values()
            .find(|a| a.musicbrainz_id == mbid)
            .cloned())
    }
}

fn config(vault: &Path) -> ResolvedConfig {
    ResolvedConfig {
        vault_path: vault.to_path_buf(),
        music_folder: "Music".to_string(),
        artist_folder: "Artists".to_string(),
        album_folder: "Albums".to_string(),
        rate_limit: Duration::from_millis(100),
        max_retries: 0,
        user_agent: "vme-tests".to_string(),
        report_path: None,
        log_level: "info".to_string(),
    }
}

fn write_note(vault: &Path, rel: &str, content: &str) -> PathBuf {
    let path = vault.join("Music").join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

fn frontmatter_of(path: &Path) -> Mapping {
    parse_note(&fs::read_to_string(path).unwrap())
        .unwrap()
        .frontmatter
}

fn status_of(summary: &RunSummary, path: &Path) -> OutcomeStatus {
    summary
        .outcomes
        .iter()
        .find(|o| o.path == path)
        .map(|o| o.status)
        .unwrap()
}

async fn run(vault: &Path, lookup: &StaticLookup, options: EnrichOptions) -> RunSummary {
    run_enrichment(&config(vault), lookup, options, false)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_igor_album_enriched_end_to_end() {
    let vault = TempDir::new().unwrap();
    let path = write_note(
        vault.path(),
        "Albums/IGOR.md",
        "## Notes\nGreat album.",
    );
    let lookup = StaticLookup::with_igor();

    let summary = run(vault.path(), &lookup, EnrichOptions::default()).await;

    assert_eq!(status_of(&summary, &path), OutcomeStatus::Updated);
    assert!(!summary.has_failures());

    let written = fs::read_to_string(&path).unwrap();
    assert!(written.starts_with("---\n"));
    assert!(written.ends_with("\n---\n## Notes\nGreat album."));
    // YAML 1.1 readers would otherwise read the date as a timestamp
    assert!(written.contains("\nrelease_date: '2019-05-17'\n"));

    let fm = frontmatter_of(&path);
    assert_eq!(fm.get("type").and_then(Value::as_str), Some("album"));
    assert_eq!(fm.get("title").and_then(Value::as_str), Some("IGOR"));
    assert_eq!(
        fm.get("artist").and_then(Value::as_str),
        Some("[[Tyler, the Creator]]")
    );
    assert_eq!(
        fm.get("release_date").and_then(Value::as_str),
        Some("2019-05-17")
    );
    let genres: Vec<&str> = fm
        .get("genres")
        .and_then(Value::as_sequence)
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(genres, vec!["hip hop", "neo soul"]);
    assert_eq!(fm.get("track_count").and_then(Value::as_u64), Some(12));

    let keys: Vec<&str> = fm.keys().filter_map(Value::as_str).collect();
    assert_eq!(&keys[..3], &["type", "musicbrainz_id", "title"]);
}

#[tokio::test]
async fn test_second_run_is_unchanged_and_byte_identical() {
    let vault = TempDir::new().unwrap();
    let album = write_note(vault.path(), "Albums/IGOR.md", "## Notes\nGreat album.");
    let artist = write_note(vault.path(), "Artists/Mac Miller.md", "# Mac\n");
    let lookup = StaticLookup::with_igor();

    // force so the second run looks up again instead of skipping
    let options = EnrichOptions {
        force: true,
        ..Default::default()
    };

    run(vault.path(), &lookup, options).await;
    let album_bytes = fs::read(&album).unwrap();
    let artist_bytes = fs::read(&artist).unwrap();

    let second = run(vault.path(), &lookup, options).await;

    assert_eq!(status_of(&second, &album), OutcomeStatus::Unchanged);
    assert_eq!(status_of(&second, &artist), OutcomeStatus::Unchanged);
    assert_eq!(fs::read(&album).unwrap(), album_bytes);
    assert_eq!(fs::read(&artist).unwrap(), artist_bytes);
}

#[tokio::test]
async fn test_complete_note_skipped_without_lookup() {
    let vault = TempDir::new().unwrap();
    let path = write_note(
        vault.path(),
        "Albums/IGOR.md",
        "---\nmusicbrainz_id: rel-igor\ngenres: [rap]\nartist: '[[Tyler, the Creator]]'\nrelease_date: '2019'\n---\nbody",
    );
    let before = fs::read(&path).unwrap();
    let lookup = StaticLookup::with_igor();

    let summary = run(vault.path(), &lookup, EnrichOptions::default()).await;

    assert_eq!(status_of(&summary, &path), OutcomeStatus::Skipped);
    assert_eq!(lookup.lookup_count(), 0);
    assert_eq!(fs::read(&path).unwrap(), before);

    let forced = run(
        vault.path(),
        &lookup,
        EnrichOptions {
            force: true,
            ..Default::default()
        },
    )
    .await;
    assert_eq!(status_of(&forced, &path), OutcomeStatus::Updated);
    assert_eq!(lookup.lookup_count(), 1);
    assert_eq!(*lookup.id_calls.lock().unwrap(), vec!["rel-igor".to_string()]);
}

#[tokio::test]
async fn test_existing_alias_id_fetched_directly() {
    let vault = TempDir::new().unwrap();
    // the note title would not match any search; the id decides
    let path = write_note(
        vault.path(),
        "Albums/Igor (vinyl).md",
        "---\nmbid: rel-igor\nrating: 5\n---\nbody",
    );
    let lookup = StaticLookup::with_igor();

    let summary = run(vault.path(), &lookup, EnrichOptions::default()).await;

    assert_eq!(status_of(&summary, &path), OutcomeStatus::Updated);
    assert_eq!(*lookup.id_calls.lock().unwrap(), vec!["rel-igor".to_string()]);
    assert_eq!(lookup.search_count(), 0);

    let fm = frontmatter_of(&path);
    assert_eq!(fm.get("mbid").and_then(Value::as_str), Some("rel-igor"));
    assert_eq!(
        fm.get("musicbrainz_id").and_then(Value::as_str),
        Some("rel-igor")
    );
    assert_eq!(fm.get("rating").and_then(Value::as_u64), Some(5));
}

#[tokio::test]
async fn test_existing_id_without_match_is_failed() {
    let vault = TempDir::new().unwrap();
    let path = write_note(
        vault.path(),
        "Artists/Mac Miller.md",
        "---\nmusicbrainz: gone-id\n---\n",
    );
    let before = fs::read(&path).unwrap();
    let lookup = StaticLookup::with_igor();

    let summary = run(vault.path(), &lookup, EnrichOptions::default()).await;

    // a user-chosen id is not second-guessed by a name search
    assert_eq!(status_of(&summary, &path), OutcomeStatus::Failed);
    assert_eq!(lookup.search_count(), 0);
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[tokio::test]
async fn test_merge_keeps_user_keys_and_unmatched_values() {
    let vault = TempDir::new().unwrap();
    let path = write_note(
        vault.path(),
        "Artists/Mac Miller.md",
        "---\nrating: 5\ngenres:\n- old\ncountry: JP\n---\nMy notes about [[Swimming]].\n",
    );
    let lookup = StaticLookup::with_igor();

    run(vault.path(), &lookup, EnrichOptions::default()).await;

    let fm = frontmatter_of(&path);
    let keys: Vec<&str> = fm.keys().filter_map(Value::as_str).collect();
    assert_eq!(&keys[..3], &["rating", "genres", "country"]);
    assert_eq!(fm.get("rating").and_then(Value::as_u64), Some(5));
    // record has no country: existing value stays
    assert_eq!(fm.get("country").and_then(Value::as_str), Some("JP"));
    assert_eq!(
        fm.get("genres"),
        Some(&Value::Sequence(vec![Value::from("hip hop")]))
    );
    assert_eq!(fm.get("type").and_then(Value::as_str), Some("artist"));

    let written = fs::read_to_string(&path).unwrap();
    assert!(written.ends_with("---\nMy notes about [[Swimming]].\n"));
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let vault = TempDir::new().unwrap();
    let album = write_note(vault.path(), "Albums/IGOR.md", "## Notes\nGreat album.");
    let missing = write_note(vault.path(), "Albums/Unknown.md", "???");
    let lookup = StaticLookup::with_igor();

    let options = EnrichOptions {
        dry_run: true,
        ..Default::default()
    };
    let summary = run(vault.path(), &lookup, options).await;

    assert!(summary.dry_run);
    assert_eq!(status_of(&summary, &album), OutcomeStatus::Updated);
    assert_eq!(status_of(&summary, &missing), OutcomeStatus::Failed);
    assert_eq!(fs::read_to_string(&album).unwrap(), "## Notes\nGreat album.");

    let entries: Vec<_> = fs::read_dir(album.parent().unwrap())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(entries.len(), 2);
}

#[tokio::test]
async fn test_album_hint_from_each_link_form() {
    let vault = TempDir::new().unwrap();
    write_note(
        vault.path(),
        "Albums/A.md",
        "By [[Knowledge/Music/Artists/Mac Miller|Mac Miller]]",
    );
    write_note(vault.path(), "Albums/B.md", "By [[Knowledge/Music/Artists/Mac Miller]]");
    write_note(vault.path(), "Albums/C.md", "By [[Mac Miller]]");
    write_note(vault.path(), "Albums/D.md", "No links at all");
    let lookup = StaticLookup::default();

    run(vault.path(), &lookup, EnrichOptions::default()).await;

    let calls = lookup.album_calls.lock().unwrap().clone();
    let hint = Some("Mac Miller".to_string());
    assert_eq!(
        calls,
        vec![
            ("A".to_string(), hint.clone()),
            ("B".to_string(), hint.clone()),
            ("C".to_string(), hint),
            ("D".to_string(), None),
        ]
    );
}

#[tokio::test]
async fn test_rejections_and_ordering() {
    let vault = TempDir::new().unwrap();
    let stray = write_note(vault.path(), "Playlists/Road trip.md", "list");
    let broken = write_note(vault.path(), "Albums/Broken.md", "---\ntitle: [unclosed\n---\n");
    write_note(vault.path(), "Albums/IGOR.md", "## Notes\nGreat album.");
    write_note(vault.path(), "Artists/Mac Miller.md", "");
    write_note(vault.path(), "Artists/.hidden.md", "");
    let lookup = StaticLookup::with_igor();

    let summary = run(vault.path(), &lookup, EnrichOptions::default()).await;

    let names: Vec<String> = summary
        .outcomes
        .iter()
        .map(|o| o.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec!["Broken.md", "Road trip.md", "Mac Miller.md", "IGOR.md"]
    );
    assert_eq!(status_of(&summary, &stray), OutcomeStatus::Failed);
    assert_eq!(status_of(&summary, &broken), OutcomeStatus::Failed);
    assert_eq!(summary.counts().updated, 2);
    assert!(summary.has_failures());
}

#[tokio::test]
async fn test_skip_toggles() {
    let vault = TempDir::new().unwrap();
    let album = write_note(vault.path(), "Albums/IGOR.md", "x");
    let artist = write_note(vault.path(), "Artists/Mac Miller.md", "y");
    let lookup = StaticLookup::with_igor();

    let summary = run(
        vault.path(),
        &lookup,
        EnrichOptions {
            skip_artists: true,
            ..Default::default()
        },
    )
    .await;

    assert_eq!(status_of(&summary, &artist), OutcomeStatus::Skipped);
    assert_eq!(status_of(&summary, &album), OutcomeStatus::Updated);
    assert!(lookup.artist_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_backup_taken_before_changes() {
    let vault = TempDir::new().unwrap();
    write_note(vault.path(), "Albums/IGOR.md", "## Notes\nGreat album.");
    let lookup = StaticLookup::with_igor();

    run_enrichment(&config(vault.path()), &lookup, EnrichOptions::default(), true)
        .await
        .unwrap();

    let backups: Vec<PathBuf> = fs::read_dir(vault.path().join(".vme-backups"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(backups.len(), 1);
    assert_eq!(
        fs::read_to_string(backups[0].join("Albums/IGOR.md")).unwrap(),
        "## Notes\nGreat album."
    );
}

#[tokio::test]
async fn test_missing_music_folder_is_fatal() {
    let vault = TempDir::new().unwrap();
    let lookup = StaticLookup::default();

    let result = run_enrichment(&config(vault.path()), &lookup, EnrichOptions::default(), false).await;

    assert!(matches!(result, Err(EnrichError::Scan(_))));
}
