//! Metadata lookup seam
//!
//! The orchestrator talks to the metadata service only through this trait,
//! so tests can substitute canned responses.

use async_trait::async_trait;

use super::musicbrainz_client::MBError;
use crate::models::{AlbumRecord, ArtistRecord};

/// Metadata lookup by name, or directly by a known id.
///
/// `Ok(None)` means "no match" and is not an error.
#[async_trait]
pub trait MetadataLookup: Send + Sync {
    /// Best match for an artist name
    async fn lookup_artist(&self, name: &str) -> Result<Option<ArtistRecord>, MBError>;

    /// Best match for an album title, optionally narrowed by artist name
    async fn lookup_album(
        &self,
        title: &str,
        artist_hint: Option<&str>,
    ) -> Result<Option<AlbumRecord>, MBError>;

    /// Artist with a known id
    async fn artist_by_id(&self, mbid: &str) -> Result<Option<ArtistRecord>, MBError>;

    /// Release with a known id
    async fn album_by_id(&self, mbid: &str) -> Result<Option<AlbumRecord>, MBError>;
}

#[async_trait]
impl<T: MetadataLookup + ?Sized> MetadataLookup for &T {
    async fn lookup_artist(&self, name: &str) -> Result<Option<ArtistRecord>, MBError> {
        (**self).lookup_artist(name).await
    }

    async fn lookup_album(
        &self,
        title: &str,
        artist_hint: Option<&str>,
    ) -> Result<Option<AlbumRecord>, MBError> {
        (**self).lookup_album(title, artist_hint).await
    }

    async fn artist_by_id(&self, mbid: &str) -> Result<Option<ArtistRecord>, MBError> {
        (**self).artist_by_id(mbid).await
    }

    async fn album_by_id(&self, mbid: &str) -> Result<Option<AlbumRecord>, MBError> {
        (**self).album_by_id(mbid).await
    }
}
