//! Theme Sentiment Service: binary entrypoint.
//! Boots the Axum HTTP server: config, lexicon, themes, feed sources,
//! the refresh scheduler and the metrics endpoint.

use std::sync::{Arc, Mutex};

use shuttle_axum::ShuttleAxum;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use theme_sentiment_analyzer::analyze::SentimentEngine;
use theme_sentiment_analyzer::config::AppConfig;
use theme_sentiment_analyzer::history::History;
use theme_sentiment_analyzer::ingest::{rss::RssSource, types::ArticleSource};
use theme_sentiment_analyzer::lexicon::{JsonFilePersistence, LexiconStore};
use theme_sentiment_analyzer::metrics::Metrics;
use theme_sentiment_analyzer::refresh::{spawn_scheduler, RefreshCoordinator};
use theme_sentiment_analyzer::themes::load_themes_from;
use theme_sentiment_analyzer::{create_router, AppState};

const DEFAULT_LOG_FILTER: &str =
    "theme_sentiment_analyzer=info,lexicon=info,pipeline=info,refresh=info,ingest=info,api=info,warn";

/// Compact tracing logs; a no-op if the platform already installed a subscriber.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = AppConfig::load()?;

    let store = LexiconStore::open(
        Box::new(JsonFilePersistence::new(&cfg.lexicon_path)),
        cfg.learning_rate,
    );
    let engine = Arc::new(Mutex::new(SentimentEngine::new(store)));

    let themes = load_themes_from(&cfg.themes_path).unwrap_or_else(|e| {
        warn!(error = %format!("{e:#}"), path = %cfg.themes_path.display(), "themes unavailable, starting with none");
        Vec::new()
    });

    let sources: Vec<Box<dyn ArticleSource>> = cfg
        .feeds
        .iter()
        .map(|url| Box::new(RssSource::from_url(url)) as Box<dyn ArticleSource>)
        .collect();

    info!(
        feeds = sources.len(),
        themes = themes.len(),
        interval_secs = cfg.refresh_interval_secs,
        "starting theme sentiment service"
    );

    let coordinator = Arc::new(
        RefreshCoordinator::new(
            engine,
            sources,
            themes,
            History::with_capacity(cfg.history_capacity),
            cfg.content_max_chars,
        )
        .with_themes_path(&cfg.themes_path),
    );
    spawn_scheduler(coordinator.clone(), cfg.refresh_interval_secs);

    let mut router = create_router(AppState::new(coordinator, cfg.feeds.clone()));
    match Metrics::init() {
        Ok(m) => router = router.merge(m.router()),
        Err(e) => warn!(error = %format!("{e:#}"), "metrics endpoint disabled"),
    }

    Ok(router.into())
}
