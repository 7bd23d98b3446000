//! Recommendation core: normalize, score, rank.
//!
//! Every call is self-contained; nothing is kept between requests.

use std::collections::HashSet;

use rayon::prelude::*;

use crate::{
    config::{RecommendConfig, ScoringWeights, TempoThresholds},
    domain::{
        features::FeatureRecord,
        track::{RecommendationResult, TrackMetadata},
    },
    engine::{error::RecommendError, normalize::normalize, rank::RankLimits, score::Scorer},
};

pub mod error;
pub mod normalize;
pub mod rank;
pub mod score;

/// Recommends next tracks for `seed` out of `candidates`.
///
/// Candidates without a usable track id are dropped; the request only fails
/// when all of them are. The seed itself is never recommended.
pub fn recommend(
    seed: &TrackMetadata,
    candidates: &[TrackMetadata],
    config: &RecommendConfig,
) -> Result<RecommendationResult, RecommendError> {
    validate(config)?;

    let seed = normalize(seed, &config.tempo)
        .map_err(|e| RecommendError::SeedUnresolvable(e.to_string()))?;

    let normalized: Vec<FeatureRecord> = candidates
        .par_iter()
        .filter_map(|raw| match normalize(raw, &config.tempo) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("dropping candidate: {e}");
                None
            }
        })
        .collect();

    if normalized.is_empty() && !candidates.is_empty() {
        return Err(RecommendError::MalformedMetadata(format!(
            "all {} candidates lacked a usable track_id",
            candidates.len()
        )));
    }

    let pool = eligible(&seed, normalized, config.ranking.exclude_seed_title);
    log::debug!(
        "scoring {} of {} candidates for seed {}",
        pool.len(),
        candidates.len(),
        seed.track_id
    );

    let scorer = Scorer {
        weights: &config.weights,
        affinity: &config.affinity,
    };
    let scored: Vec<_> = pool
        .par_iter()
        .map(|candidate| scorer.score(&seed, candidate))
        .collect();

    rank::rank(scored, &config.ranking)
}

/// Rejects configurations no ranking can be produced with.
pub fn validate(config: &RecommendConfig) -> Result<(), RecommendError> {
    RankLimits::try_from(&config.ranking)?;
    validate_weights(&config.weights)?;
    validate_tempo(&config.tempo)
}

fn validate_weights(weights: &ScoringWeights) -> Result<(), RecommendError> {
    let named = [
        ("weight_genre", weights.weight_genre),
        ("weight_mood", weights.weight_mood),
        ("weight_tempo_bonus", weights.weight_tempo_bonus),
        ("weight_recency_bonus", weights.weight_recency_bonus),
        ("recency_horizon_years", weights.recency_horizon_years),
        ("weight_mood_genre_affinity", weights.weight_mood_genre_affinity),
    ];
    for (name, value) in named {
        if !value.is_finite() || value < 0.0 {
            return Err(RecommendError::InvalidRankingConfig(format!(
                "{name} must be a non-negative number, got {value}"
            )));
        }
    }
    Ok(())
}

fn validate_tempo(tempo: &TempoThresholds) -> Result<(), RecommendError> {
    let ok = tempo.slow_below.is_finite()
        && tempo.fast_above.is_finite()
        && tempo.slow_below > 0.0
        && tempo.slow_below <= tempo.fast_above;
    if !ok {
        return Err(RecommendError::InvalidRankingConfig(format!(
            "tempo thresholds must satisfy 0 < slow_below <= fast_above, got {} / {}",
            tempo.slow_below, tempo.fast_above
        )));
    }
    Ok(())
}

/// Drops the seed, repeated track ids and, if asked, seed title lookalikes.
fn eligible(
    seed: &FeatureRecord,
    candidates: Vec<FeatureRecord>,
    exclude_seed_title: bool,
) -> Vec<FeatureRecord> {
    let seed_title = title_key(seed).filter(|_| exclude_seed_title);
    let mut seen = HashSet::new();

    candidates
        .into_iter()
        .filter(|c| c.track_id != seed.track_id)
        .filter(|c| seed_title.is_none() || title_key(c) != seed_title)
        .filter(|c| seen.insert(c.track_id.clone()))
        .collect()
}

fn title_key(record: &FeatureRecord) -> Option<String> {
    record
        .display
        .title
        .as_deref()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
}
