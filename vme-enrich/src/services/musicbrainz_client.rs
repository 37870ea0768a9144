//! MusicBrainz API client
//!
//! Name search plus detail fetch for artists and releases, sharing one
//! rate limiter and one retry policy.
//!
//! # API Reference
//! - Search: `/artist?query=...`, `/release?query=...`
//! - Lookup: `/artist/{mbid}`, `/release/{mbid}` with `inc=` subqueries
//! - Documentation: https://musicbrainz.org/doc/MusicBrainz_API

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

use super::lookup::MetadataLookup;
use crate::models::{AlbumRecord, ArtistRecord};
use crate::utils::retry::{retry_transient, RetryPolicy};

pub const MUSICBRAINZ_BASE_URL: &str = "https://musicbrainz.org/ws/2";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RATE_LIMIT: Duration = Duration::from_secs(2);
const SEARCH_LIMIT: u32 = 10;

/// MusicBrainz client errors
#[derive(Debug, Error)]
pub enum MBError {
    #[error("Network error: {0}")]
    NetworkError(String),

    /// HTTP 503 / 429: MusicBrainz is throttling us
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl MBError {
    /// Worth retrying: connection problems, throttling, server-side errors
    pub fn is_transient(&self) -> bool {
        match self {
            MBError::NetworkError(_) | MBError::RateLimitExceeded => true,
            MBError::ApiError(status, _) => *status >= 500,
            MBError::ParseError(_) => false,
        }
    }
}

/// Artist search response
#[derive(Debug, Clone, Deserialize)]
pub struct MBArtistSearch {
    #[serde(default)]
    pub artists: Vec<MBArtistSummary>,
}

/// Artist search hit
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MBArtistSummary {
    pub id: String,
    pub name: String,
    /// Search relevance, 0-100
    #[serde(default)]
    pub score: Option<u32>,
}

/// Full artist record
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MBArtist {
    pub id: String,
    pub name: String,
    #[serde(rename = "sort-name")]
    pub sort_name: Option<String>,
    pub country: Option<String>,
    /// Person, Group, Orchestra, ...
    #[serde(rename = "type")]
    pub artist_type: Option<String>,
    pub disambiguation: Option<String>,
    #[serde(rename = "life-span")]
    pub life_span: Option<MBLifeSpan>,
    #[serde(default)]
    pub genres: Vec<MBTag>,
    #[serde(default)]
    pub tags: Vec<MBTag>,
}

/// Artist begin/end dates
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MBLifeSpan {
    pub begin: Option<String>,
    pub end: Option<String>,
}

/// Genre or folksonomy tag with vote count
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MBTag {
    pub name: String,
    #[serde(default)]
    pub count: i64,
}

/// Release search response
#[derive(Debug, Clone, Deserialize)]
pub struct MBReleaseSearch {
    #[serde(default)]
    pub releases: Vec<MBReleaseSummary>,
}

/// Release search hit
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MBReleaseSummary {
    pub id: String,
    pub title: String,
    /// Official, Promotion, Bootleg, Pseudo-Release, ...
    pub status: Option<String>,
    #[serde(default)]
    pub score: Option<u32>,
    #[serde(rename = "artist-credit", default)]
    pub artist_credit: Vec<MBArtistCredit>,
}

/// Full release record
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MBRelease {
    pub id: String,
    pub title: String,
    pub status: Option<String>,
    /// Release date in YYYY, YYYY-MM or YYYY-MM-DD format
    pub date: Option<String>,
    pub country: Option<String>,
    pub barcode: Option<String>,
    #[serde(rename = "label-info", default)]
    pub label_info: Vec<MBLabelInfo>,
    #[serde(default)]
    pub media: Vec<MBMedium>,
    #[serde(rename = "artist-credit", default)]
    pub artist_credit: Vec<MBArtistCredit>,
    #[serde(default)]
    pub genres: Vec<MBTag>,
    #[serde(default)]
    pub tags: Vec<MBTag>,
}

/// MusicBrainz artist credit
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MBArtistCredit {
    /// Display name (may differ from artist.name for collaborations)
    pub name: String,
    pub artist: MBArtistRef,
}

/// Artist as referenced from a credit
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MBArtistRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MBLabelInfo {
    pub label: Option<MBLabel>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MBLabel {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MBMedium {
    #[serde(rename = "track-count")]
    pub track_count: Option<u32>,
}

/// Rate limiter enforcing a minimum interval between requests
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval,
        }
    }

    /// Wait if necessary to comply with rate limit
    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// Client construction parameters
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub user_agent: String,
    /// Minimum spacing between any two requests
    pub rate_limit: Duration,
    pub retry: RetryPolicy,
    pub timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: MUSICBRAINZ_BASE_URL.to_string(),
            user_agent: format!(
                "VaultMusicEnricher/{} ( https://github.com/vme/vault-music-enricher )",
                env!("CARGO_PKG_VERSION")
            ),
            rate_limit: DEFAULT_RATE_LIMIT,
            retry: RetryPolicy::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// MusicBrainz API client
pub struct MusicBrainzClient {
    http_client: reqwest::Client,
    base_url: String,
    rate_limiter: RateLimiter,
    retry: RetryPolicy,
}

impl MusicBrainzClient {
    pub fn new(settings: ClientSettings) -> Result<Self, MBError> {
        let http_client = reqwest::Client::builder()
            .user_agent(settings.user_agent)
            .timeout(settings.timeout)
            .build()
            .map_err(|e| MBError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            rate_limiter: RateLimiter::new(settings.rate_limit),
            retry: settings.retry,
        })
    }

    /// Search artists by name, best match first
    pub async fn search_artists(&self, name: &str) -> Result<Vec<MBArtistSummary>, MBError> {
        let query = search_query(&[("artist", name)]);
        let found: Option<MBArtistSearch> = self.get_json("artist", &query).await?;

        let mut artists = found.map(|r| r.artists).unwrap_or_default();
        artists.sort_by(|a, b| b.score.unwrap_or(0).cmp(&a.score.unwrap_or(0)));
        Ok(artists)
    }

    /// Fetch an artist with genres and tags. `None` if the id is unknown.
    pub async fn get_artist(&self, mbid: &str) -> Result<Option<MBArtist>, MBError> {
        let path = format!("artist/{}", mbid);
        self.get_json(&path, &[("inc", "genres tags".to_string())])
            .await
    }

    /// Search releases by title (and artist, if given), best match first
    pub async fn search_releases(
        &self,
        title: &str,
        artist: Option<&str>,
    ) -> Result<Vec<MBReleaseSummary>, MBError> {
        let mut fields = vec![("release", title)];
        if let Some(artist) = artist {
            fields.push(("artist", artist));
        }
        let query = search_query(&fields);
        let found: Option<MBReleaseSearch> = self.get_json("release", &query).await?;

        let mut releases = found.map(|r| r.releases).unwrap_or_default();
        releases.sort_by(|a, b| b.score.unwrap_or(0).cmp(&a.score.unwrap_or(0)));
        Ok(releases)
    }

    /// Fetch a release with credits, labels, media and genres
    pub async fn get_release(&self, mbid: &str) -> Result<Option<MBRelease>, MBError> {
        let path = format!("release/{}", mbid);
        self.get_json(
            &path,
            &[("inc", "artist-credits labels genres tags".to_string())],
        )
        .await
    }

    /// Search, take the top-ranked artist, fetch its details
    pub async fn find_artist(&self, name: &str) -> Result<Option<ArtistRecord>, MBError> {
        let candidates = self.search_artists(name).await?;
        let Some(top) = candidates.first() else {
            tracing::debug!(name = %name, "No artist candidates");
            return Ok(None);
        };

        let artist = self.get_artist(&top.id).await?;
        Ok(artist.map(artist_record))
    }

    /// Search, pick a release candidate, fetch its details.
    ///
    /// When the release carries no genres, the primary artist's genres are
    /// fetched instead.
    pub async fn find_album(
        &self,
        title: &str,
        artist_hint: Option<&str>,
    ) -> Result<Option<AlbumRecord>, MBError> {
        let candidates = self.search_releases(title, artist_hint).await?;
        let Some(candidate) = choose_release_candidate(&candidates) else {
            tracing::debug!(title = %title, hint = ?artist_hint, "No release candidates");
            return Ok(None);
        };

        let Some(release) = self.get_release(&candidate.id).await? else {
            return Ok(None);
        };

        self.complete_album(release, &candidate.artist_credit).await
    }

    /// Fetch an artist by id, skipping the name search
    pub async fn find_artist_by_id(&self, mbid: &str) -> Result<Option<ArtistRecord>, MBError> {
        Ok(self.get_artist(mbid).await?.map(artist_record))
    }

    /// Fetch a release by id, skipping the name search
    pub async fn find_album_by_id(&self, mbid: &str) -> Result<Option<AlbumRecord>, MBError> {
        let Some(release) = self.get_release(mbid).await? else {
            return Ok(None);
        };
        self.complete_album(release, &[]).await
    }

    /// Build the album record, borrowing the primary artist's genres when
    /// the release has none
    async fn complete_album(
        &self,
        release: MBRelease,
        fallback_credit: &[MBArtistCredit],
    ) -> Result<Option<AlbumRecord>, MBError> {
        let release_id = release.id.clone();
        let Some(mut record) = album_record(release, fallback_credit) else {
            tracing::warn!(release = %release_id, "Release has no artist credit");
            return Ok(None);
        };

        if record.genres.is_empty() {
            if let Some(artist_mbid) = record.artist_mbid.clone() {
                match self.get_artist(&artist_mbid).await {
                    Ok(Some(artist)) => record.genres = genre_names(&artist.genres, &artist.tags),
                    Ok(None) => {}
                    Err(e) => tracing::warn!(
                        artist = %artist_mbid,
                        error = %e,
                        "Artist genre lookup failed, keeping release without genres"
                    ),
                }
            }
        }

        Ok(Some(record))
    }

    /// Rate-limited, retried GET returning parsed JSON. 404 yields `None`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, MBError> {
        let url = format!("{}/{}", self.base_url, path);
        retry_transient(path, &self.retry, || self.request_once(&url, query)).await
    }

    async fn request_once<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, MBError> {
        // Every request, retries included, passes the limiter
        self.rate_limiter.wait().await;

        tracing::debug!(url = %url, query = ?query, "Querying MusicBrainz API");

        let response = self
            .http_client
            .get(url)
            .query(query)
            .query(&[("fmt", "json")])
            .send()
            .await
            .map_err(|e| MBError::NetworkError(e.to_string()))?;

        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if status == StatusCode::SERVICE_UNAVAILABLE || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(MBError::RateLimitExceeded);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(MBError::ApiError(status.as_u16(), error_text));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| MBError::NetworkError(e.to_string()))?;

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| MBError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl MetadataLookup for MusicBrainzClient {
    async fn lookup_artist(&self, name: &str) -> Result<Option<ArtistRecord>, MBError> {
        absent_on_transient(name, self.find_artist(name).await)
    }

    async fn lookup_album(
        &self,
        title: &str,
        artist_hint: Option<&str>,
    ) -> Result<Option<AlbumRecord>, MBError> {
        absent_on_transient(title, self.find_album(title, artist_hint).await)
    }

    async fn artist_by_id(&self, mbid: &str) -> Result<Option<ArtistRecord>, MBError> {
        absent_on_transient(mbid, self.find_artist_by_id(mbid).await)
    }

    async fn album_by_id(&self, mbid: &str) -> Result<Option<AlbumRecord>, MBError> {
        absent_on_transient(mbid, self.find_album_by_id(mbid).await)
    }
}

/// Exhausted transient faults read as "no match"
fn absent_on_transient<T>(
    name: &str,
    result: Result<Option<T>, MBError>,
) -> Result<Option<T>, MBError> {
    match result {
        Err(e) if e.is_transient() => {
            tracing::warn!(name = %name, error = %e, "Lookup gave up after retries");
            Ok(None)
        }
        other => other,
    }
}

/// Release candidate policy: the highest-ranked release whose status is
/// "official", else the highest-ranked release of any status.
pub fn choose_release_candidate(candidates: &[MBReleaseSummary]) -> Option<&MBReleaseSummary> {
    candidates
        .iter()
        .find(|c| {
            c.status
                .as_deref()
                .map(|s| s.eq_ignore_ascii_case("official"))
                .unwrap_or(false)
        })
        .or_else(|| candidates.first())
}

/// Genre names ordered by vote count; folksonomy tags if there are no genres
pub fn genre_names(genres: &[MBTag], tags: &[MBTag]) -> Vec<String> {
    let source = if genres.is_empty() { tags } else { genres };

    let mut ranked: Vec<&MBTag> = source.iter().collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count));

    let mut names: Vec<String> = Vec::with_capacity(ranked.len());
    for tag in ranked {
        let name = tag.name.trim();
        if !name.is_empty() && !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
            names.push(name.to_string());
        }
    }
    names
}

pub fn artist_record(artist: MBArtist) -> ArtistRecord {
    let genres = genre_names(&artist.genres, &artist.tags);
    let life_span = artist.life_span.unwrap_or_default();

    ArtistRecord {
        musicbrainz_id: artist.id,
        name: artist.name,
        sort_name: non_empty(artist.sort_name),
        country: non_empty(artist.country),
        formed: life_span.begin.as_deref().and_then(year_of),
        disbanded: life_span.end.as_deref().and_then(year_of),
        artist_type: non_empty(artist.artist_type),
        genres,
        disambiguation: non_empty(artist.disambiguation),
    }
}

/// Build an album record. `None` if neither the release nor the search hit
/// names an artist.
pub fn album_record(release: MBRelease, fallback_credit: &[MBArtistCredit]) -> Option<AlbumRecord> {
    let credit = release
        .artist_credit
        .first()
        .or_else(|| fallback_credit.first())?;

    let track_count = release
        .media
        .iter()
        .filter_map(|m| m.track_count)
        .sum::<u32>();

    let label = release
        .label_info
        .iter()
        .filter_map(|li| li.label.as_ref())
        .map(|l| l.name.trim())
        .find(|name| !name.is_empty())
        .map(str::to_string);

    Some(AlbumRecord {
        musicbrainz_id: release.id.clone(),
        title: release.title.clone(),
        artist: credit.artist.name.clone(),
        artist_mbid: non_empty(Some(credit.artist.id.clone())),
        release_date: non_empty(release.date.clone()),
        country: non_empty(release.country.clone()),
        label,
        barcode: non_empty(release.barcode.clone()),
        track_count: (track_count > 0).then_some(track_count),
        genres: genre_names(&release.genres, &release.tags),
        status: non_empty(release.status.clone()).map(|s| s.to_lowercase()),
    })
}

/// Lucene query such as `release:"IGOR" AND artist:"Tyler, the Creator"`
fn search_query(fields: &[(&str, &str)]) -> Vec<(&'static str, String)> {
    let query = fields
        .iter()
        .map(|(field, value)| format!("{}:\"{}\"", field, escape_phrase(value)))
        .collect::<Vec<_>>()
        .join(" AND ");

    vec![("query", query), ("limit", SEARCH_LIMIT.to_string())]
}

fn escape_phrase(value: &str) -> String {
    value.trim().replace('\\', "\\\\").replace('"', "\\\"")
}

/// Leading four-digit year of a MusicBrainz partial date
fn year_of(date: &str) -> Option<String> {
    let year = date.trim().get(..4)?;
    year.chars()
        .all(|c| c.is_ascii_digit())
        .then(|| year.to_string())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
