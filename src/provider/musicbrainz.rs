//! MusicBrainz web service client.
//!
//! Recordings are the tracks: the recording MBID is the track id, the
//! release group is the album. MusicBrainz has no tempo data, and its
//! folksonomy tags are split into moods and genres by vocabulary.

use std::{collections::BTreeSet, thread, time::Duration};

use serde::Deserialize;
use uuid::Uuid;

use crate::{
    config::ProviderConfig,
    domain::track::TrackMetadata,
    provider::{MetadataProvider, ProviderError},
};

const RETRY_PAUSE: Duration = Duration::from_millis(500);

/// Tags read as moods even if the affinity table does not list them.
const MOOD_TAGS: &[&str] = &[
    "aggressive",
    "angry",
    "calm",
    "chill",
    "dark",
    "dreamy",
    "energetic",
    "happy",
    "melancholic",
    "mellow",
    "relaxing",
    "romantic",
    "sad",
    "uplifting",
];

const RECORDING_INC: &str = "artist-credits+releases+release-groups+tags+genres";

/// Page size of title searches.
const TITLE_SEARCH_LIMIT: &str = "10";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    recordings: Vec<Recording>,
}

#[derive(Debug, Deserialize)]
struct Recording {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    length: Option<u64>,
    #[serde(rename = "first-release-date", default)]
    first_release_date: Option<String>,
    #[serde(rename = "artist-credit", default)]
    artist_credit: Vec<ArtistCredit>,
    #[serde(default)]
    releases: Vec<Release>,
    #[serde(default)]
    tags: Vec<Tag>,
    #[serde(default)]
    genres: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
struct ArtistCredit {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    artist: Option<Artist>,
}

#[derive(Debug, Deserialize)]
struct Artist {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Release {
    #[serde(default)]
    date: Option<String>,
    #[serde(rename = "release-group", default)]
    release_group: Option<ReleaseGroup>,
}

#[derive(Debug, Deserialize)]
struct ReleaseGroup {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Tag {
    name: String,
}

pub struct MusicBrainzProvider {
    agent: ureq::Agent,
    base_url: String,
    retries: u32,
    moods: BTreeSet<String>,
}

impl MusicBrainzProvider {
    /// `extra_moods` extends the built-in mood vocabulary, usually with the
    /// moods of the configured affinity table.
    pub fn new<'a>(config: &ProviderConfig, extra_moods: impl IntoIterator<Item = &'a str>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();

        let moods = MOOD_TAGS
            .iter()
            .map(|m| m.to_string())
            .chain(extra_moods.into_iter().map(|m| m.trim().to_lowercase()))
            .collect();

        Self {
            agent,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retries: config.retries,
            moods,
        }
    }

    fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        not_found: &str,
    ) -> Result<T, ProviderError> {
        let url = format!("{}/{}", self.base_url, path);
        let mut last_error = String::new();

        for attempt in 0..=self.retries {
            if attempt > 0 {
                thread::sleep(RETRY_PAUSE);
            }

            let mut request = self.agent.get(&url).query("fmt", "json");
            for (key, value) in query {
                request = request.query(key, value);
            }

            match request.call() {
                Ok(response) => {
                    return response.into_json::<T>().map_err(|e| {
                        ProviderError::Unavailable(format!("invalid MusicBrainz response: {e}"))
                    });
                }
                // client errors are final, no retry
                Err(ureq::Error::Status(code @ 400..=499, _)) => {
                    log::debug!("MusicBrainz rejected {url} with status {code}");
                    return Err(ProviderError::NotFound(not_found.to_string()));
                }
                Err(e) => {
                    log::warn!("MusicBrainz request {url} failed (attempt {}): {e}", attempt + 1);
                    last_error = e.to_string();
                }
            }
        }

        Err(ProviderError::Unavailable(last_error))
    }

    fn to_track(&self, recording: Recording) -> TrackMetadata {
        let credit = recording.artist_credit.first();

        let album_id = recording
            .releases
            .iter()
            .find_map(|r| r.release_group.as_ref())
            .map(|rg| rg.id.clone());

        let year = recording
            .first_release_date
            .as_deref()
            .and_then(parse_year)
            .or_else(|| {
                recording
                    .releases
                    .iter()
                    .filter_map(|r| r.date.as_deref().and_then(parse_year))
                    .min()
            });

        let (mood_tags, genre_tags) = recording
            .tags
            .iter()
            .chain(&recording.genres)
            .map(|t| t.name.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .partition::<BTreeSet<_>, _>(|t| self.moods.contains(t));

        TrackMetadata {
            track_id: Some(recording.id),
            artist_id: credit.and_then(|c| c.artist.as_ref()).map(|a| a.id.clone()),
            cover_art_url: album_id
                .as_ref()
                .map(|id| format!("https://coverartarchive.org/release-group/{id}/front")),
            album_id,
            genre_tags,
            mood_tags,
            tempo: None,
            year,
            title: recording.title,
            artist_name: credit.and_then(|c| c.name.clone()),
            duration_ms: recording.length,
        }
    }
}

impl MetadataProvider for MusicBrainzProvider {
    fn lookup(&self, track_id: &str) -> Result<TrackMetadata, ProviderError> {
        let track_id = track_id.trim();
        // only recording MBIDs go into the path
        let Ok(mbid) = Uuid::parse_str(track_id) else {
            return Err(ProviderError::NotFound(track_id.to_string()));
        };
        let recording: Recording = self.get(
            &format!("recording/{}", mbid.hyphenated()),
            &[("inc", RECORDING_INC)],
            track_id,
        )?;
        Ok(self.to_track(recording))
    }

    fn search(
        &self,
        title: &str,
        artist_hint: Option<&str>,
    ) -> Result<TrackMetadata, ProviderError> {
        let title = title.trim();
        let artist_hint = artist_hint.map(str::trim).filter(|a| !a.is_empty());
        if title.is_empty() {
            return Err(ProviderError::NotFound(title.to_string()));
        }

        let query = title_query(title, artist_hint);
        let response: SearchResponse = self.get(
            "recording",
            &[("query", query.as_str()), ("limit", TITLE_SEARCH_LIMIT)],
            title,
        )?;

        best_match(response.recordings, artist_hint)
            .map(|r| self.to_track(r))
            .ok_or_else(|| ProviderError::NotFound(title.to_string()))
    }

    fn candidates_for(
        &self,
        seed: &TrackMetadata,
        limit: usize,
    ) -> Result<Vec<TrackMetadata>, ProviderError> {
        let Some(query) = candidate_query(seed) else {
            log::info!("seed has no artist or genre to search by");
            return Ok(Vec::new());
        };
        // the search API caps page size at 100
        let limit = limit.clamp(1, 100).to_string();

        let response: SearchResponse = self.get(
            "recording",
            &[("query", query.as_str()), ("limit", limit.as_str())],
            "recording search",
        )?;

        Ok(response
            .recordings
            .into_iter()
            .map(|r| self.to_track(r))
            .collect())
    }
}

/// Lucene query for recordings related to the seed: same artist when known,
/// otherwise the seed's first genre, always excluding the seed itself.
fn candidate_query(seed: &TrackMetadata) -> Option<String> {
    let by_artist = match (seed.artist_id.as_deref(), seed.artist_name.as_deref()) {
        (Some(id), _) if !id.trim().is_empty() => Some(format!("arid:{}", escape_lucene(id.trim()))),
        (_, Some(name)) if !name.trim().is_empty() => {
            Some(format!("artist:\"{}\"", escape_lucene(name.trim())))
        }
        _ => None,
    };

    let mut query = by_artist.or_else(|| {
        seed.genre_tags
            .iter()
            .map(|g| g.trim())
            .find(|g| !g.is_empty())
            .map(|g| format!("tag:\"{}\"", escape_lucene(g)))
    })?;

    if let Some(id) = seed.track_id.as_deref().filter(|id| !id.trim().is_empty()) {
        query.push_str(&format!(" AND NOT rid:{}", escape_lucene(id.trim())));
    }
    Some(query)
}

fn title_query(title: &str, artist_hint: Option<&str>) -> String {
    let mut query = format!("recording:\"{}\"", escape_lucene(title));
    if let Some(artist) = artist_hint {
        query.push_str(&format!(" AND artist:\"{}\"", escape_lucene(artist)));
    }
    query
}

/// Picks the recording with the most releases, among exact artist matches
/// when there are any. The earliest result wins ties.
fn best_match(recordings: Vec<Recording>, artist_hint: Option<&str>) -> Option<Recording> {
    let credited = |r: &Recording, artist: &str| {
        r.artist_credit
            .first()
            .and_then(|c| c.name.as_deref())
            .is_some_and(|name| name.trim().to_lowercase() == artist.to_lowercase())
    };

    let (exact, rest): (Vec<_>, Vec<_>) = recordings
        .into_iter()
        .partition(|r| artist_hint.is_some_and(|artist| credited(r, artist)));
    let pool = if exact.is_empty() { rest } else { exact };

    pool.into_iter().rev().max_by_key(|r| r.releases.len())
}

fn escape_lucene(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// "2019-03-29", "2019-03" or "2019"
fn parse_year(date: &str) -> Option<i32> {
    date.get(..4)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rouille::{Response, Server};
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    const REC_ID: &str = "5f6a5a2e-6a2a-4d3b-9c1e-2b8f0c6d7e11";
    const MISSING_ID: &str = "00000000-0000-4000-8000-000000000000";
    const BROKEN_ID: &str = "11111111-1111-4111-8111-111111111111";
    const REJECTED_ID: &str = "22222222-2222-4222-8222-222222222222";

    const RECORDING_JSON: &str = r#"{
        "id": "5f6a5a2e-6a2a-4d3b-9c1e-2b8f0c6d7e11",
        "title": "Bad Guy",
        "length": 194088,
        "first-release-date": "2019-03-29",
        "artist-credit": [
            {"name": "Billie Eilish", "artist": {"id": "artist-123", "name": "Billie Eilish"}}
        ],
        "releases": [
            {"id": "rel-1", "date": "2019-03-29", "release-group": {"id": "rg-1"}},
            {"id": "rel-2", "date": "2018", "release-group": {"id": "rg-2"}}
        ],
        "tags": [{"name": "Electropop", "count": 3}, {"name": "Dark", "count": 1}],
        "genres": [{"name": "pop", "count": 5, "id": "g-1"}, {"name": "  ", "count": 1}]
    }"#;

    /// Title search hits: a popular cover, then the original by the hinted
    /// artist, then a lesser release of the original.
    const TITLE_SEARCH_JSON: &str = r#"{"recordings": [
        {"id": "cover", "title": "Bad Guy",
         "artist-credit": [{"name": "Billie Eilish Tribute Band"}],
         "releases": [{}, {}, {}, {}, {}]},
        {"id": "original", "title": "Bad Guy",
         "artist-credit": [{"name": "Billie Eilish", "artist": {"id": "artist-123"}}],
         "releases": [{}, {}]},
        {"id": "live", "title": "Bad Guy",
         "artist-credit": [{"name": "billie eilish"}],
         "releases": [{}]}
    ]}"#;

    fn provider(base_url: &str) -> MusicBrainzProvider {
        provider_with_retries(base_url, 0)
    }

    fn provider_with_retries(base_url: &str, retries: u32) -> MusicBrainzProvider {
        let config = ProviderConfig {
            base_url: base_url.to_string(),
            retries,
            timeout_secs: 2,
            ..Default::default()
        };
        MusicBrainzProvider::new(&config, ["brooding"])
    }

    fn recordings(json: &str) -> Vec<Recording> {
        serde_json::from_str::<SearchResponse>(json)
            .expect("search json")
            .recordings
    }

    #[test]
    fn converts_recording_to_track_metadata() -> anyhow::Result<()> {
        let recording: Recording = serde_json::from_str(RECORDING_JSON)?;

        let track = provider("http://unused").to_track(recording);

        assert_eq!(track.track_id.as_deref(), Some(REC_ID));
        assert_eq!(track.artist_id.as_deref(), Some("artist-123"));
        assert_eq!(track.artist_name.as_deref(), Some("Billie Eilish"));
        assert_eq!(track.album_id.as_deref(), Some("rg-1"));
        assert_eq!(track.year, Some(2019));
        assert_eq!(track.duration_ms, Some(194088));
        assert_eq!(track.tempo, None);
        assert_eq!(
            track.genre_tags.into_iter().collect::<Vec<_>>(),
            vec!["electropop", "pop"]
        );
        assert_eq!(track.mood_tags.into_iter().collect::<Vec<_>>(), vec!["dark"]);
        assert_eq!(
            track.cover_art_url.as_deref(),
            Some("https://coverartarchive.org/release-group/rg-1/front")
        );
        Ok(())
    }

    #[test]
    fn year_falls_back_to_earliest_release() -> anyhow::Result<()> {
        let recording: Recording = serde_json::from_str(
            r#"{"id": "r", "releases": [{"date": "2005-01-01"}, {"date": "2001"}, {"date": ""}]}"#,
        )?;

        let track = provider("http://unused").to_track(recording);

        assert_eq!(track.year, Some(2001));
        assert_eq!(track.album_id, None);
        assert_eq!(track.artist_id, None);
        Ok(())
    }

    #[test]
    fn extra_moods_extend_vocabulary() -> anyhow::Result<()> {
        let recording: Recording =
            serde_json::from_str(r#"{"id": "r", "tags": [{"name": "Brooding"}]}"#)?;

        let track = provider("http://unused").to_track(recording);

        assert!(track.mood_tags.contains("brooding"));
        assert!(track.genre_tags.is_empty());
        Ok(())
    }

    #[test]
    fn candidate_query_prefers_artist_id() {
        let seed = TrackMetadata {
            artist_id: Some("artist-123".into()),
            artist_name: Some("Billie Eilish".into()),
            ..TrackMetadata::with_id("rec-1")
        };
        assert_eq!(
            candidate_query(&seed).as_deref(),
            Some("arid:artist-123 AND NOT rid:rec-1")
        );
    }

    #[test]
    fn candidate_query_falls_back_to_name_then_genre() {
        let by_name = TrackMetadata {
            artist_name: Some("Guns \"N\" Roses".into()),
            ..TrackMetadata::with_id("r")
        };
        assert_eq!(
            candidate_query(&by_name).as_deref(),
            Some(r#"artist:"Guns \"N\" Roses" AND NOT rid:r"#)
        );

        let by_genre = TrackMetadata {
            genre_tags: ["jazz".to_string()].into(),
            ..TrackMetadata::with_id("r")
        };
        assert_eq!(
            candidate_query(&by_genre).as_deref(),
            Some(r#"tag:"jazz" AND NOT rid:r"#)
        );

        assert_eq!(candidate_query(&TrackMetadata::with_id("r")), None);
    }

    #[test]
    fn title_query_adds_artist_hint() {
        assert_eq!(title_query("Bad Guy", None), r#"recording:"Bad Guy""#);
        assert_eq!(
            title_query("Bad \"Guy\"", Some("Billie Eilish")),
            r#"recording:"Bad \"Guy\"" AND artist:"Billie Eilish""#
        );
    }

    #[test]
    fn best_match_prefers_exact_artist_then_most_releases() {
        let id = |r: Option<Recording>| r.map(|r| r.id);

        let hits = || recordings(TITLE_SEARCH_JSON);
        assert_eq!(id(best_match(hits(), Some("Billie Eilish"))), Some("original".into()));
        assert_eq!(id(best_match(hits(), None)), Some("cover".into()));
        // no exact artist match: all hits compete on releases
        assert_eq!(id(best_match(hits(), Some("Finneas"))), Some("cover".into()));
        assert_eq!(id(best_match(Vec::new(), Some("Billie Eilish"))), None);
    }

    #[test]
    fn best_match_keeps_first_of_equal_release_counts() {
        let hits = recordings(
            r#"{"recordings": [
                {"id": "first", "releases": [{}]},
                {"id": "second", "releases": [{}]}
            ]}"#,
        );
        assert_eq!(best_match(hits, None).map(|r| r.id).as_deref(), Some("first"));
    }

    #[test]
    fn parses_partial_dates() {
        assert_eq!(parse_year("2019-03-29"), Some(2019));
        assert_eq!(parse_year("1987"), Some(1987));
        assert_eq!(parse_year("87"), None);
        assert_eq!(parse_year("unknown"), None);
    }

    /// Serves a fake MusicBrainz on a local port for the duration of `f`,
    /// which also gets the number of requests served so far.
    fn with_fake_musicbrainz(f: impl FnOnce(&str, &AtomicUsize)) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        let server = Server::new("127.0.0.1:0", move |request| {
            counter.fetch_add(1, Ordering::SeqCst);
            let url = request.url();
            let path = url.strip_prefix("/ws/2/recording").unwrap_or_default();

            match path.trim_start_matches('/') {
                REC_ID => Response::from_data("application/json", RECORDING_JSON),
                BROKEN_ID => Response::text("oops").with_status_code(503),
                REJECTED_ID => Response::text("bad request").with_status_code(400),
                "" if url.starts_with("/ws/2/recording") => {
                    let query = request.get_param("query").unwrap_or_default();
                    let body = if query.contains("Nonexistent") {
                        r#"{"recordings": []}"#.to_string()
                    } else if query.contains("recording") {
                        TITLE_SEARCH_JSON.to_string()
                    } else {
                        format!(r#"{{"recordings": [{RECORDING_JSON}]}}"#)
                    };
                    Response::from_data("application/json", body)
                }
                _ => Response::empty_404(),
            }
        })
        .expect("bind fake server");

        let base_url = format!("http://{}/ws/2", server.server_addr());
        let (handle, stop) = server.stoppable();

        f(&base_url, &hits);

        let _ = stop.send(());
        let _ = handle.join();
    }

    #[test]
    fn lookup_and_search_against_fake_service() {
        with_fake_musicbrainz(|base_url, _| {
            let provider = provider(base_url);

            let seed = provider.lookup(REC_ID).expect("lookup");
            assert_eq!(seed.title.as_deref(), Some("Bad Guy"));

            let candidates = provider.candidates_for(&seed, 10).expect("search");
            assert_eq!(candidates.len(), 1);

            assert_eq!(
                provider.lookup(MISSING_ID),
                Err(ProviderError::NotFound(MISSING_ID.into()))
            );
            assert!(matches!(
                provider.lookup(BROKEN_ID),
                Err(ProviderError::Unavailable(_))
            ));
        });
    }

    #[test]
    fn lookup_accepts_mbid_in_any_case() {
        with_fake_musicbrainz(|base_url, _| {
            let upper = format!("  {}  ", REC_ID.to_uppercase());
            let track = provider(base_url).lookup(&upper).expect("lookup");
            assert_eq!(track.track_id.as_deref(), Some(REC_ID));
        });
    }

    #[test]
    fn lookup_rejects_non_mbid_ids_without_request() {
        with_fake_musicbrainz(|base_url, hits| {
            let provider = provider(base_url);

            for id in [
                "other/../5f6a5a2e-6a2a-4d3b-9c1e-2b8f0c6d7e11",
                "5f6a5a2e-6a2a-4d3b-9c1e-2b8f0c6d7e11?inc=tags",
                "Bad Guy",
                "",
            ] {
                assert_eq!(provider.lookup(id), Err(ProviderError::NotFound(id.into())));
            }
            assert_eq!(hits.load(Ordering::SeqCst), 0);
        });
    }

    #[test]
    fn client_errors_are_not_retried() {
        with_fake_musicbrainz(|base_url, hits| {
            let provider = provider_with_retries(base_url, 2);

            assert_eq!(
                provider.lookup(REJECTED_ID),
                Err(ProviderError::NotFound(REJECTED_ID.into()))
            );
            assert_eq!(hits.load(Ordering::SeqCst), 1);
        });
    }

    #[test]
    fn server_errors_are_retried() {
        with_fake_musicbrainz(|base_url, hits| {
            let provider = provider_with_retries(base_url, 1);

            assert!(matches!(
                provider.lookup(BROKEN_ID),
                Err(ProviderError::Unavailable(_))
            ));
            assert_eq!(hits.load(Ordering::SeqCst), 2);
        });
    }

    #[test]
    fn search_resolves_title_with_artist_hint() {
        with_fake_musicbrainz(|base_url, _| {
            let provider = provider(base_url);

            let seed = provider
                .search(" Bad Guy ", Some("Billie Eilish"))
                .expect("search");
            assert_eq!(seed.track_id.as_deref(), Some("original"));
            assert_eq!(seed.artist_id.as_deref(), Some("artist-123"));

            let popular = provider.search("Bad Guy", None).expect("search");
            assert_eq!(popular.track_id.as_deref(), Some("cover"));

            assert_eq!(
                provider.search("Nonexistent", None),
                Err(ProviderError::NotFound("Nonexistent".into()))
            );
        });
    }
}
