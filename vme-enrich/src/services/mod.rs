//! Services for vault enrichment

pub mod backup;
pub mod enricher;
pub mod frontmatter;
pub mod lookup;
pub mod metadata_writer;
pub mod musicbrainz_client;
pub mod vault_scanner;

pub use backup::{backup_music_folder, BackupError};
pub use enricher::{EnrichOptions, MusicEnricher};
pub use frontmatter::FrontmatterError;
pub use lookup::MetadataLookup;
pub use metadata_writer::{merge_frontmatter, MetadataWriter, WriteError};
pub use musicbrainz_client::{ClientSettings, MBError, MusicBrainzClient};
pub use vault_scanner::{Rejection, ScanError, ScanReport, VaultScanner};
