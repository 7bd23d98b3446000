//! Weighted additive similarity between a seed and a candidate.

use std::{cmp::Ordering, collections::BTreeSet};

use crate::{
    config::{MoodGenreAffinity, ScoringWeights},
    domain::features::{FeatureRecord, ScoredCandidate},
};

/// Scoring parameters shared by every candidate of a request.
#[derive(Debug, Clone, Copy)]
pub struct Scorer<'a> {
    pub weights: &'a ScoringWeights,
    pub affinity: &'a MoodGenreAffinity,
}

impl Scorer<'_> {
    pub fn score(&self, seed: &FeatureRecord, candidate: &FeatureRecord) -> ScoredCandidate {
        let w = self.weights;

        let total = jaccard(&seed.genres, &candidate.genres) * w.weight_genre
            + jaccard(&seed.moods, &candidate.moods) * w.weight_mood
            + self.tempo_term(seed, candidate)
            + self.recency_term(seed, candidate)
            + self.affinity_term(seed, candidate);

        ScoredCandidate {
            track_id: candidate.track_id.clone(),
            score: total.max(0.0),
            features: candidate.clone(),
        }
    }

    fn tempo_term(&self, seed: &FeatureRecord, candidate: &FeatureRecord) -> f64 {
        match seed.tempo.distance(candidate.tempo) {
            Some(0) => self.weights.weight_tempo_bonus,
            Some(1) => self.weights.weight_tempo_bonus / 2.0,
            _ => 0.0,
        }
    }

    fn recency_term(&self, seed: &FeatureRecord, candidate: &FeatureRecord) -> f64 {
        let (Some(a), Some(b)) = (seed.year, candidate.year) else {
            return 0.0;
        };
        let delta = f64::from(a.abs_diff(b));
        let horizon = self.weights.recency_horizon_years;

        // zero horizon: only the very same year counts
        let factor = if horizon > 0.0 {
            (1.0 - delta / horizon).max(0.0)
        } else if delta == 0.0 {
            1.0
        } else {
            0.0
        };
        self.weights.weight_recency_bonus * factor
    }

    /// Fraction of the seed's moods (those listed in the affinity table)
    /// whose suited genres show up in the candidate's genres.
    fn affinity_term(&self, seed: &FeatureRecord, candidate: &FeatureRecord) -> f64 {
        if self.weights.weight_mood_genre_affinity == 0.0 || candidate.genres.is_empty() {
            return 0.0;
        }

        let (mapped, hits) = seed
            .moods
            .iter()
            .filter_map(|mood| self.affinity.genres_for(mood))
            .fold((0usize, 0usize), |(mapped, hits), genres| {
                let hit = !genres.is_disjoint(&candidate.genres);
                (mapped + 1, hits + usize::from(hit))
            });

        if mapped == 0 {
            return 0.0;
        }
        self.weights.weight_mood_genre_affinity * hits as f64 / mapped as f64
    }
}

/// |a ∩ b| / |a ∪ b|, zero when both sets are empty.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

/// Score descending, then track id ascending.
pub fn by_rank(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.track_id.cmp(&b.track_id))
}
