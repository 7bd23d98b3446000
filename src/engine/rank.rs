//! Diversity-constrained ranking of scored candidates.

use std::collections::HashMap;

use crate::{
    config::RankingConfig,
    domain::{
        features::{DiversityKey, ScoredCandidate},
        track::{RecommendationResult, RecommendedTrack},
    },
    engine::{error::RecommendError, score::by_rank},
};

/// Ranking limits after validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankLimits {
    pub limit: usize,
    pub max_per_artist: usize,
    pub max_per_album: usize,
}

impl TryFrom<&RankingConfig> for RankLimits {
    type Error = RecommendError;

    fn try_from(config: &RankingConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            limit: positive("limit", config.limit)?,
            max_per_artist: positive("max_per_artist", config.max_per_artist)?,
            max_per_album: positive("max_per_album", config.max_per_album)?,
        })
    }
}

fn positive(name: &str, value: i64) -> Result<usize, RecommendError> {
    if value <= 0 {
        return Err(RecommendError::InvalidRankingConfig(format!(
            "{name} must be positive, got {value}"
        )));
    }
    usize::try_from(value).map_err(|_| {
        RecommendError::InvalidRankingConfig(format!("{name} is too large: {value}"))
    })
}

/// Sorts by score and greedily picks candidates, skipping any that would
/// exceed the artist or album cap. One forward pass, skipped candidates are
/// never reconsidered, and a short result is not an error.
pub fn rank(
    mut scored: Vec<ScoredCandidate>,
    config: &RankingConfig,
) -> Result<RecommendationResult, RecommendError> {
    let limits = RankLimits::try_from(config)?;

    scored.sort_by(by_rank);

    let mut per_artist: HashMap<&DiversityKey, usize> = HashMap::new();
    let mut per_album: HashMap<&DiversityKey, usize> = HashMap::new();
    let mut accepted: Vec<&ScoredCandidate> = Vec::new();

    for candidate in &scored {
        if accepted.len() >= limits.limit {
            break;
        }

        let features = &candidate.features;
        let artist_count = per_artist.get(&features.artist).copied().unwrap_or(0);
        let album_count = per_album.get(&features.album).copied().unwrap_or(0);

        if artist_count >= limits.max_per_artist {
            log::debug!("skipping {}: artist cap reached", candidate.track_id);
            continue;
        }
        if album_count >= limits.max_per_album {
            log::debug!("skipping {}: album cap reached", candidate.track_id);
            continue;
        }

        *per_artist.entry(&features.artist).or_default() += 1;
        *per_album.entry(&features.album).or_default() += 1;
        accepted.push(candidate);
    }

    Ok(RecommendationResult {
        tracks: accepted.into_iter().map(recommended_track).collect(),
    })
}

fn recommended_track(candidate: &ScoredCandidate) -> RecommendedTrack {
    let features = &candidate.features;
    RecommendedTrack {
        track_id: candidate.track_id.clone(),
        score: candidate.score,
        artist_id: features.artist.known().map(str::to_string),
        album_id: features.album.known().map(str::to_string),
        title: features.display.title.clone(),
        artist_name: features.display.artist_name.clone(),
        cover_art_url: features.display.cover_art_url.clone(),
    }
}
