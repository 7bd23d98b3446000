use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Raw metadata of a music track, as handed over by a metadata provider.
///
/// Every field may be missing: providers return partial data, and a record
/// without a `track_id` is unusable for recommendation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    #[serde(default)]
    pub track_id: Option<String>,
    #[serde(default)]
    pub artist_id: Option<String>,
    #[serde(default)]
    pub album_id: Option<String>,
    #[serde(default)]
    pub genre_tags: BTreeSet<String>,
    #[serde(default)]
    pub mood_tags: BTreeSet<String>,
    /// beats per minute
    #[serde(default)]
    pub tempo: Option<f64>,
    #[serde(default)]
    pub year: Option<i32>,

    // display only, not used for scoring
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist_name: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub cover_art_url: Option<String>,
}

impl TrackMetadata {
    pub fn with_id(track_id: &str) -> Self {
        Self {
            track_id: Some(track_id.to_string()),
            ..Default::default()
        }
    }
}

/// One entry of a recommendation, in final order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedTrack {
    pub track_id: String,
    pub score: f64,
    pub artist_id: Option<String>,
    pub album_id: Option<String>,
    pub title: Option<String>,
    pub artist_name: Option<String>,
    pub cover_art_url: Option<String>,
}

/// Ordered list of next-track suggestions for a single request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub tracks: Vec<RecommendedTrack>,
}

impl RecommendationResult {
    pub fn track_ids(&self) -> Vec<&str> {
        self.tracks.iter().map(|t| t.track_id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// Listener preferences folded into the seed before scoring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
}

impl Preferences {
    /// Adds the preferred mood and genre to the seed's tags.
    pub fn apply_to(&self, seed: &mut TrackMetadata) {
        let tag = |value: &Option<String>| {
            value
                .as_deref()
                .map(|v| v.trim().to_lowercase())
                .filter(|v| !v.is_empty())
        };
        if let Some(mood) = tag(&self.mood) {
            seed.mood_tags.insert(mood);
        }
        if let Some(genre) = tag(&self.genre) {
            seed.genre_tags.insert(genre);
        }
    }
}
