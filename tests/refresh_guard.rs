// tests/refresh_guard.rs
//
// Refresh cycle: at most one run in flight, history bounded, scheduler ticks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use theme_sentiment_analyzer::analyze::SentimentEngine;
use theme_sentiment_analyzer::history::History;
use theme_sentiment_analyzer::ingest::types::{Article, ArticleSource};
use theme_sentiment_analyzer::refresh::{spawn_scheduler, RefreshCoordinator, RefreshOutcome};
use theme_sentiment_analyzer::themes::Theme;

/// Source that sleeps before answering and counts its fetches.
struct SlowSource {
    delay: Duration,
    fetches: Arc<AtomicUsize>,
}

#[async_trait]
impl ArticleSource for SlowSource {
    async fn fetch_latest(&self) -> anyhow::Result<Vec<Article>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(vec![Article::new(
            "La croissance accélère",
            "Les marchés saluent un accord.",
            "https://x/slow",
            Some("2025-03-01T10:00:00Z"),
        )])
    }

    fn name(&self) -> &str {
        "slow"
    }
}

struct FailingSource;

#[async_trait]
impl ArticleSource for FailingSource {
    async fn fetch_latest(&self) -> anyhow::Result<Vec<Article>> {
        Err(anyhow::anyhow!("feed unreachable"))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

fn coordinator(sources: Vec<Box<dyn ArticleSource>>, history_cap: usize) -> RefreshCoordinator {
    RefreshCoordinator::new(
        Arc::new(Mutex::new(SentimentEngine::in_memory())),
        sources,
        vec![Theme::new("Economie", &["croissance"])],
        History::with_capacity(history_cap),
        500,
    )
}

#[tokio::test]
async fn overlapping_refresh_is_dropped_not_queued() {
    let fetches = Arc::new(AtomicUsize::new(0));
    let c = coordinator(
        vec![Box::new(SlowSource {
            delay: Duration::from_millis(100),
            fetches: fetches.clone(),
        })],
        10,
    );

    let (a, b) = tokio::join!(c.try_refresh(), c.try_refresh());
    let outcomes = [a, b];
    assert!(outcomes.contains(&RefreshOutcome::Completed { articles: 1 }));
    assert!(outcomes.contains(&RefreshOutcome::Skipped));
    assert_eq!(fetches.load(Ordering::SeqCst), 1, "skipped run must not fetch");
    assert!(!c.is_updating(), "flag cleared after the run");

    // Nothing was queued: a later call runs normally.
    assert_eq!(c.try_refresh().await, RefreshOutcome::Completed { articles: 1 });
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failing_source_yields_empty_batch_not_error() {
    let c = coordinator(vec![Box::new(FailingSource)], 10);
    assert_eq!(c.try_refresh().await, RefreshOutcome::Completed { articles: 0 });
    let st = c.state();
    assert!(st.last_update.is_some());
    assert_eq!(st.analysis.total_articles, 0);
    assert_eq!(st.analysis.themes["Economie"].count, 0);
}

#[tokio::test]
async fn history_keeps_only_the_most_recent_snapshots() {
    let fetches = Arc::new(AtomicUsize::new(0));
    let c = coordinator(
        vec![Box::new(SlowSource {
            delay: Duration::from_millis(1),
            fetches,
        })],
        2,
    );
    for _ in 0..5 {
        c.try_refresh().await;
    }
    // every refresh after the first archives the previous state
    assert_eq!(c.history().len(), 2);
    assert_eq!(c.history().capacity(), 2);
    let trend = &c.state().analysis.trends["Economie"];
    assert_eq!(trend.growth, 0.0);
    assert_eq!(trend.current_count, 1);
}

#[tokio::test]
async fn scheduler_runs_first_tick_immediately() {
    let fetches = Arc::new(AtomicUsize::new(0));
    let c = Arc::new(coordinator(
        vec![Box::new(SlowSource {
            delay: Duration::from_millis(1),
            fetches: fetches.clone(),
        })],
        10,
    ));
    let handle = spawn_scheduler(c.clone(), 3600);

    let mut waited = 0;
    while c.last_update().is_none() && waited < 200 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        waited += 1;
    }
    handle.abort();

    assert!(c.last_update().is_some(), "scheduler never refreshed");
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}
