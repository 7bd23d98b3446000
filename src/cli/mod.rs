use anyhow::Context;
use clap::{Parser, Subcommand};
use std::{path::PathBuf, sync::Arc};

use crate::config::Config;
use crate::domain::track::{Preferences, RecommendationResult};
use crate::engine;
use crate::provider::{
    MetadataProvider, SeedRef, catalog::StaticCatalog, musicbrainz::MusicBrainzProvider,
};

#[derive(Parser)]
#[command(name = "nexttrack")]
#[command(version = "0.1")]
#[command(about = "Stateless next-track recommendations")]
pub struct Cli {
    /// Path to the config TOML file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run http server answering recommendation requests
    Serve {
        /// Serve tracks from a JSON catalog instead of MusicBrainz
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Print recommendations for a track
    Recommend {
        /// Track id (a MusicBrainz recording id unless --catalog is given)
        #[arg(required_unless_present = "title", conflicts_with = "title")]
        track_id: Option<String>,
        /// Find the seed by title instead of id
        #[arg(short, long)]
        title: Option<String>,
        /// Artist of the titled track, to pick the right recording
        #[arg(short, long, requires = "title")]
        artist: Option<String>,
        /// Preferred mood, added to the seed's moods
        #[arg(long)]
        mood: Option<String>,
        /// Preferred genre, added to the seed's genres
        #[arg(long)]
        genre: Option<String>,
        /// Resolve tracks from a JSON catalog instead of MusicBrainz
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Number of tracks to recommend
        #[arg(short, long)]
        limit: Option<i64>,
    },
}

/// Entrypoint for CLI
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = Config::load(&cli.config)?;

    match cli.command {
        Commands::Serve { catalog } => {
            let provider = open_provider(&cfg, catalog.as_deref())?;
            engine::validate(&cfg.recommend).context("Invalid recommendation config")?;

            let http_server = crate::http::server::HttpServer::new(
                provider,
                cfg.recommend,
                cfg.provider.candidate_limit,
                cfg.http,
            );

            println!(
                "HTTP server running at http://{}:{}",
                http_server.config.bind_addr, http_server.config.port
            );
            http_server.run();
            Ok(())
        }

        Commands::Recommend {
            track_id,
            title,
            artist,
            mood,
            genre,
            catalog,
            limit,
        } => {
            let seed_ref = SeedRef::new(track_id, title, artist)
                .context("Either a track id or --title is required")?;
            let provider = open_provider(&cfg, catalog.as_deref())?;
            let mut recommend = cfg.recommend.clone();
            if let Some(limit) = limit {
                recommend.ranking.limit = limit;
            }

            let mut seed = seed_ref
                .resolve(&*provider)
                .with_context(|| format!("Failed to resolve seed track {seed_ref}"))?;
            let candidates = provider
                .candidates_for(&seed, cfg.provider.candidate_limit)
                .unwrap_or_else(|e| {
                    log::warn!("no candidates for {seed_ref}: {e}");
                    Vec::new()
                });

            Preferences { mood, genre }.apply_to(&mut seed);
            let result = engine::recommend(&seed, &candidates, &recommend)?;
            print_result(&seed_ref.to_string(), &result);
            Ok(())
        }
    }
}

fn open_provider(
    cfg: &Config,
    catalog: Option<&std::path::Path>,
) -> anyhow::Result<Arc<dyn MetadataProvider>> {
    match catalog {
        Some(path) => {
            let catalog = StaticCatalog::load(path)?;
            log::info!(
                "Loaded {} tracks from {}",
                catalog.len(),
                path.to_string_lossy()
            );
            Ok(Arc::new(catalog))
        }
        None => Ok(Arc::new(MusicBrainzProvider::new(
            &cfg.provider,
            cfg.recommend.affinity.moods(),
        ))),
    }
}

fn print_result(track_id: &str, result: &RecommendationResult) {
    if result.is_empty() {
        println!("No recommendations for {track_id}");
        return;
    }

    println!("Recommendations for {track_id} ({}):", result.len());
    for (i, track) in result.tracks.iter().enumerate() {
        let title = track.title.as_deref().unwrap_or("<untitled>");
        let artist = track.artist_name.as_deref().unwrap_or("Unknown Artist");
        println!(
            "  {:>2}. {} - {}  [{}]  score {:.3}",
            i + 1,
            artist,
            title,
            track.track_id,
            track.score
        );
    }
}
