use log::info;
use rouille::{Request, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    config::{HttpConfig, RankingConfig, RecommendConfig},
    domain::track::{Preferences, RecommendationResult, RecommendedTrack, TrackMetadata},
    engine,
    http::error::ApiError,
    provider::{MetadataProvider, SeedRef},
};

/// Stateless JSON front of the recommendation core.
pub struct HttpServer {
    provider: Arc<dyn MetadataProvider>,
    recommend: RecommendConfig,
    candidate_limit: usize,
    pub config: HttpConfig,
}

impl HttpServer {
    pub fn new(
        provider: Arc<dyn MetadataProvider>,
        recommend: RecommendConfig,
        candidate_limit: usize,
        config: HttpConfig,
    ) -> Self {
        Self {
            provider,
            recommend,
            candidate_limit,
            config,
        }
    }

    pub fn run(self) {
        let addr = format!("{}:{}", self.config.bind_addr, self.config.port);
        rouille::start_server(addr, move |request| self.handle_request(request));
    }

    fn handle_request(&self, request: &Request) -> Response {
        Self::log_request(request);

        let response = rouille::router!(request,
            (GET) (/health) => {
                Response::text("ok")
            },
            (POST) (/recommend) => {
                Self::respond(self.handle_recommend(request))
            },
            (POST) (/recommend/track) => {
                Self::respond(self.handle_recommend_track(request))
            },
            _ => ApiError::NotFound("no such route".into()).into_response()
        );

        info!("Response: {} {}", request.method(), response.status_code);
        response
    }

    fn log_request(request: &Request) {
        info!("{} {}", request.method(), request.url());
    }

    fn respond(result: Result<RecommendResponse, ApiError>) -> Response {
        match result {
            Ok(body) => Response::json(&body),
            Err(e) => e.into_response(),
        }
    }

    /// Ranks caller-supplied candidates against a caller-supplied seed.
    fn handle_recommend(&self, request: &Request) -> Result<RecommendResponse, ApiError> {
        let body: RecommendRequest = rouille::input::json_input(request)?;
        let config = body.ranking.apply(&self.recommend);

        let result = engine::recommend(&body.seed, &body.candidates, &config)?;
        Ok(RecommendResponse::new(&body.seed, result))
    }

    /// Resolves the seed, by id or by title, and its candidate pool through
    /// the provider.
    ///
    /// A missing seed is an error, a failed candidate search only yields
    /// an empty pool.
    fn handle_recommend_track(&self, request: &Request) -> Result<RecommendResponse, ApiError> {
        let body: TrackRequest = rouille::input::json_input(request)?;
        let config = body.ranking.apply(&self.recommend);
        // fail on bad limits before calling the provider
        engine::validate(&config)?;

        let seed_ref = SeedRef::new(body.track_id, body.title, body.artist)
            .ok_or_else(|| ApiError::BadRequest("track_id or title is required".into()))?;
        let mut seed = seed_ref.resolve(&*self.provider)?;

        let candidates = match self.provider.candidates_for(&seed, self.candidate_limit) {
            Ok(candidates) => candidates,
            Err(e) => {
                log::warn!("candidate lookup for {seed_ref} failed: {e}");
                Vec::new()
            }
        };
        log::debug!("{} candidates for {seed_ref}", candidates.len());

        body.preferences.apply_to(&mut seed);
        let result = engine::recommend(&seed, &candidates, &config)?;
        Ok(RecommendResponse::new(&seed, result))
    }
}

/// Per-request overrides of the configured ranking window.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RankingOverrides {
    pub limit: Option<i64>,
    pub max_per_artist: Option<i64>,
    pub max_per_album: Option<i64>,
}

impl RankingOverrides {
    fn apply(&self, base: &RecommendConfig) -> RecommendConfig {
        let ranking = RankingConfig {
            limit: self.limit.unwrap_or(base.ranking.limit),
            max_per_artist: self.max_per_artist.unwrap_or(base.ranking.max_per_artist),
            max_per_album: self.max_per_album.unwrap_or(base.ranking.max_per_album),
            ..base.ranking
        };
        RecommendConfig {
            ranking,
            ..base.clone()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RecommendRequest {
    seed: TrackMetadata,
    #[serde(default)]
    candidates: Vec<TrackMetadata>,
    #[serde(default)]
    ranking: RankingOverrides,
}

#[derive(Debug, Serialize, Deserialize)]
struct TrackRequest {
    track_id: Option<String>,
    title: Option<String>,
    artist: Option<String>,
    #[serde(flatten)]
    preferences: Preferences,
    #[serde(flatten)]
    ranking: RankingOverrides,
}

#[derive(Debug, Serialize, Deserialize)]
struct RecommendResponse {
    seed_track_id: Option<String>,
    recommended_tracks: Vec<RecommendedTrack>,
}

impl RecommendResponse {
    fn new(seed: &TrackMetadata, result: RecommendationResult) -> Self {
        Self {
            seed_track_id: seed.track_id.as_deref().map(|id| id.trim().to_string()),
            recommended_tracks: result.tracks,
        }
    }
}

#[cfg(test)]
pub fn parse_json_response<T: serde::de::DeserializeOwned>(
    response: rouille::Response,
) -> anyhow::Result<T> {
    Ok(serde_json::from_reader(
        response.data.into_reader_and_size().0,
    )?)
}
