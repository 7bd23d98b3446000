//! Sources of track metadata.
//!
//! Providers are consulted before the recommendation core runs; the core
//! itself never does I/O.

use thiserror::Error;

use crate::domain::track::TrackMetadata;

pub mod catalog;
pub mod musicbrainz;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProviderError {
    #[error("metadata provider unavailable: {0}")]
    Unavailable(String),

    #[error("track {0} not found")]
    NotFound(String),
}

pub trait MetadataProvider: Send + Sync {
    /// Resolves one track id to its metadata.
    fn lookup(&self, track_id: &str) -> Result<TrackMetadata, ProviderError>;

    /// Finds the best recording for a title, preferring exact matches on
    /// `artist_hint` when given.
    fn search(
        &self,
        title: &str,
        artist_hint: Option<&str>,
    ) -> Result<TrackMetadata, ProviderError>;

    /// Returns up to `limit` tracks worth recommending after `seed`.
    fn candidates_for(
        &self,
        seed: &TrackMetadata,
        limit: usize,
    ) -> Result<Vec<TrackMetadata>, ProviderError>;
}

/// How a caller names the seed track.
#[derive(Debug, Clone, PartialEq)]
pub enum SeedRef {
    Id(String),
    Title {
        title: String,
        artist: Option<String>,
    },
}

impl SeedRef {
    /// `None` when neither a track id nor a title is given.
    pub fn new(
        track_id: Option<String>,
        title: Option<String>,
        artist: Option<String>,
    ) -> Option<Self> {
        let present = |v: Option<String>| v.filter(|v| !v.trim().is_empty());
        match (present(track_id), present(title)) {
            (Some(id), _) => Some(SeedRef::Id(id)),
            (None, Some(title)) => Some(SeedRef::Title {
                title,
                artist: present(artist),
            }),
            (None, None) => None,
        }
    }

    pub fn resolve(&self, provider: &dyn MetadataProvider) -> Result<TrackMetadata, ProviderError> {
        match self {
            SeedRef::Id(id) => provider.lookup(id),
            SeedRef::Title { title, artist } => provider.search(title, artist.as_deref()),
        }
    }
}

impl std::fmt::Display for SeedRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeedRef::Id(id) => write!(f, "{id}"),
            SeedRef::Title {
                title,
                artist: Some(artist),
            } => write!(f, "\"{title}\" by {artist}"),
            SeedRef::Title { title, artist: None } => write!(f, "\"{title}\""),
        }
    }
}
