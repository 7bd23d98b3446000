//! Turns raw provider metadata into comparable feature records.

use std::collections::BTreeSet;

use crate::{
    config::TempoThresholds,
    domain::{
        features::{DisplayInfo, DiversityKey, FeatureRecord, TempoBucket},
        track::TrackMetadata,
    },
    engine::error::RecommendError,
};

/// Normalizes one track. Fails only when the track has no usable id.
pub fn normalize(
    raw: &TrackMetadata,
    thresholds: &TempoThresholds,
) -> Result<FeatureRecord, RecommendError> {
    let track_id = raw
        .track_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| RecommendError::MalformedMetadata("missing track_id".into()))?
        .to_string();

    Ok(FeatureRecord {
        artist: diversity_key(raw.artist_id.as_deref(), &track_id),
        album: diversity_key(raw.album_id.as_deref(), &track_id),
        genres: normalize_tags(&raw.genre_tags),
        moods: normalize_tags(&raw.mood_tags),
        tempo: tempo_bucket(raw.tempo, thresholds),
        year: raw.year,
        display: DisplayInfo {
            title: raw.title.clone(),
            artist_name: raw.artist_name.clone(),
            cover_art_url: raw.cover_art_url.clone(),
        },
        track_id,
    })
}

/// lower-case, trimmed, no empty entries
pub fn normalize_tags<'a, I>(tags: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a String>,
{
    tags.into_iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

pub fn tempo_bucket(tempo: Option<f64>, thresholds: &TempoThresholds) -> TempoBucket {
    match tempo {
        Some(bpm) if bpm.is_finite() && bpm > 0.0 => {
            if bpm < thresholds.slow_below {
                TempoBucket::Slow
            } else if bpm <= thresholds.fast_above {
                TempoBucket::Medium
            } else {
                TempoBucket::Fast
            }
        }
        _ => TempoBucket::Unknown,
    }
}

fn diversity_key(id: Option<&str>, track_id: &str) -> DiversityKey {
    match id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => DiversityKey::Known(id.to_string()),
        None => DiversityKey::Unknown {
            track_id: track_id.to_string(),
        },
    }
}
