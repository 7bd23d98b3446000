use anyhow::Context;
use serde::Deserialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    path::Path,
};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub version: u32,
    pub http: HttpConfig,
    #[serde(flatten)]
    pub recommend: RecommendConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.to_string_lossy()))?;
        toml::from_str(&contents).with_context(|| "Failed to parse config TOML")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub bind_addr: String,
    pub port: u16,
}

/// Everything a single `recommend` call needs besides the tracks.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct RecommendConfig {
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub weights: ScoringWeights,
    #[serde(default)]
    pub tempo: TempoThresholds,
    #[serde(default)]
    pub affinity: MoodGenreAffinity,
}

/// Result window and diversity caps.
///
/// Non-positive values are rejected when ranking starts.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct RankingConfig {
    pub limit: i64,
    pub max_per_artist: i64,
    pub max_per_album: i64,
    /// skip candidates carrying the seed's title (same song, other recording)
    pub exclude_seed_title: bool,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            limit: 5,
            max_per_artist: 2,
            max_per_album: 2,
            exclude_seed_title: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct ScoringWeights {
    pub weight_genre: f64,
    pub weight_mood: f64,
    pub weight_tempo_bonus: f64,
    pub weight_recency_bonus: f64,
    pub recency_horizon_years: f64,
    pub weight_mood_genre_affinity: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            weight_genre: 3.0,
            weight_mood: 2.0,
            weight_tempo_bonus: 1.0,
            weight_recency_bonus: 1.0,
            recency_horizon_years: 20.0,
            weight_mood_genre_affinity: 1.0,
        }
    }
}

/// BPM limits of the tempo buckets: below `slow_below` is slow,
/// above `fast_above` is fast, medium in between (inclusive).
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct TempoThresholds {
    pub slow_below: f64,
    pub fast_above: f64,
}

impl Default for TempoThresholds {
    fn default() -> Self {
        Self {
            slow_below: 90.0,
            fast_above: 130.0,
        }
    }
}

/// Genres that suit a mood, used to nudge scoring towards candidates
/// whose genres fit the seed's mood.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(from = "BTreeMap<String, Vec<String>>")]
pub struct MoodGenreAffinity(BTreeMap<String, BTreeSet<String>>);

impl MoodGenreAffinity {
    pub fn genres_for(&self, mood: &str) -> Option<&BTreeSet<String>> {
        self.0.get(mood)
    }

    pub fn moods(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl From<BTreeMap<String, Vec<String>>> for MoodGenreAffinity {
    fn from(raw: BTreeMap<String, Vec<String>>) -> Self {
        let clean = |s: &str| s.trim().to_lowercase();
        Self(
            raw.into_iter()
                .map(|(mood, genres)| {
                    let genres = genres
                        .iter()
                        .map(|g| clean(g))
                        .filter(|g| !g.is_empty())
                        .collect();
                    (clean(&mood), genres)
                })
                .filter(|(mood, _)| !mood.is_empty())
                .collect(),
        )
    }
}

impl Default for MoodGenreAffinity {
    fn default() -> Self {
        let table: [(&str, &[&str]); 6] = [
            ("happy", &["pop", "dance", "electronic", "funk"]),
            ("sad", &["acoustic", "indie", "piano", "alternative"]),
            ("angry", &["rock", "metal", "punk", "trap"]),
            ("chill", &["lo-fi", "ambient", "jazz", "r&b"]),
            ("romantic", &["r&b", "soul", "ballad", "pop"]),
            ("energetic", &["edm", "hip-hop", "pop", "trap"]),
        ];
        Self::from(
            table
                .into_iter()
                .map(|(mood, genres)| {
                    (
                        mood.to_string(),
                        genres.iter().map(|g| g.to_string()).collect::<Vec<_>>(),
                    )
                })
                .collect::<BTreeMap<String, Vec<String>>>(),
        )
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub retries: u32,
    /// how many candidates to fetch per seed
    pub candidate_limit: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://musicbrainz.org/ws/2".to_string(),
            user_agent: "NextTrack/0.1 ( https://github.com/nexttrack/nexttrack )".to_string(),
            timeout_secs: 6,
            retries: 2,
            candidate_limit: 50,
        }
    }
}
