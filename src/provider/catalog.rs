use std::{collections::HashMap, path::Path};

use anyhow::Context;

use crate::{
    domain::track::TrackMetadata,
    provider::{MetadataProvider, ProviderError},
};

/// Fixed set of tracks read from a JSON file, for offline use.
pub struct StaticCatalog {
    tracks: Vec<TrackMetadata>,
    index: HashMap<String, usize>,
}

impl StaticCatalog {
    /// Loads a JSON array of track metadata.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog {}", path.to_string_lossy()))?;
        let tracks: Vec<TrackMetadata> =
            serde_json::from_str(&contents).with_context(|| "Failed to parse catalog JSON")?;
        Ok(Self::from_tracks(tracks))
    }

    /// Entries without a track id are skipped, the first of repeated ids wins.
    pub fn from_tracks(tracks: Vec<TrackMetadata>) -> Self {
        let mut kept = Vec::with_capacity(tracks.len());
        let mut index = HashMap::new();

        for track in tracks {
            let Some(id) = track.track_id.as_deref().map(str::trim).filter(|id| !id.is_empty())
            else {
                log::warn!("catalog entry without track_id skipped");
                continue;
            };
            if index.contains_key(id) {
                log::warn!("duplicate catalog entry {id} skipped");
                continue;
            }
            index.insert(id.to_string(), kept.len());
            kept.push(track);
        }

        Self {
            tracks: kept,
            index,
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

impl MetadataProvider for StaticCatalog {
    fn lookup(&self, track_id: &str) -> Result<TrackMetadata, ProviderError> {
        self.index
            .get(track_id.trim())
            .map(|&i| self.tracks[i].clone())
            .ok_or_else(|| ProviderError::NotFound(track_id.to_string()))
    }

    /// Title match ignoring case; among several, an exact artist match is
    /// preferred, then catalog order.
    fn search(
        &self,
        title: &str,
        artist_hint: Option<&str>,
    ) -> Result<TrackMetadata, ProviderError> {
        let same = |a: Option<&str>, b: &str| {
            a.is_some_and(|a| a.trim().to_lowercase() == b.trim().to_lowercase())
        };

        let mut matches = self.tracks.iter().filter(|t| same(t.title.as_deref(), title));
        let first = matches.clone().next();
        let by_artist = artist_hint
            .filter(|a| !a.trim().is_empty())
            .and_then(|hint| matches.find(|t| same(t.artist_name.as_deref(), hint)));

        by_artist
            .or(first)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(title.to_string()))
    }

    fn candidates_for(
        &self,
        seed: &TrackMetadata,
        limit: usize,
    ) -> Result<Vec<TrackMetadata>, ProviderError> {
        let seed_id = seed.track_id.as_deref().map(str::trim);
        Ok(self
            .tracks
            .iter()
            .filter(|t| t.track_id.as_deref().map(str::trim) != seed_id)
            .take(limit)
            .cloned()
            .collect())
    }
}
