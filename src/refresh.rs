//! # Refresh cycle
//! Periodic fetch → aggregate → publish, with at most one run in flight.
//!
//! A refresh requested while another is running is dropped and reported as
//! [`RefreshOutcome::Skipped`]; nothing is queued.

use anyhow::Result;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::analyze::SentimentEngine;
use crate::corrections::{self, CorrectionLog, CorrectionRecord};
use crate::history::History;
use crate::ingest::{self, types::ArticleSource};
use crate::pipeline::{self, AnalysisSnapshot, ScoredArticle};
use crate::themes::{self, Theme};

/// Last published result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedState {
    pub articles: Vec<ScoredArticle>,
    pub analysis: AnalysisSnapshot,
    pub last_update: Option<DateTime<Utc>>,
}

impl Default for CachedState {
    fn default() -> Self {
        Self {
            articles: Vec::new(),
            analysis: AnalysisSnapshot::empty(Utc::now(), None),
            last_update: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum RefreshOutcome {
    Completed { articles: usize },
    Skipped,
}

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
fn read<T>(l: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    l.read().unwrap_or_else(PoisonError::into_inner)
}
fn write<T>(l: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    l.write().unwrap_or_else(PoisonError::into_inner)
}

/// Clears the in-flight flag when the run ends (also on panic).
struct UpdatingGuard<'a>(&'a AtomicBool);

impl Drop for UpdatingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct RefreshCoordinator {
    engine: Arc<Mutex<SentimentEngine>>,
    sources: Vec<Box<dyn ArticleSource>>,
    themes: RwLock<Vec<Theme>>,
    themes_path: Option<PathBuf>,
    state: RwLock<CachedState>,
    history: History,
    corrections: Mutex<CorrectionLog>,
    updating: AtomicBool,
    content_max_chars: usize,
}

impl RefreshCoordinator {
    pub fn new(
        engine: Arc<Mutex<SentimentEngine>>,
        sources: Vec<Box<dyn ArticleSource>>,
        themes: Vec<Theme>,
        history: History,
        content_max_chars: usize,
    ) -> Self {
        Self {
            engine,
            sources,
            themes: RwLock::new(themes),
            themes_path: None,
            state: RwLock::new(CachedState::default()),
            history,
            corrections: Mutex::new(CorrectionLog::default()),
            updating: AtomicBool::new(false),
            content_max_chars,
        }
    }

    pub fn engine(&self) -> &Arc<Mutex<SentimentEngine>> {
        &self.engine
    }

    pub fn is_updating(&self) -> bool {
        self.updating.load(Ordering::Acquire)
    }

    pub fn state(&self) -> CachedState {
        read(&self.state).clone()
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        read(&self.state).last_update
    }

    pub fn themes(&self) -> Vec<Theme> {
        read(&self.themes).clone()
    }

    /// Persist theme edits to `path` from now on.
    pub fn with_themes_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.themes_path = Some(path.into());
        self
    }

    /// Add a theme, save the list, then refresh so the snapshot includes it.
    pub async fn add_theme(&self, theme: Theme) -> Result<Theme> {
        let (added, current) = {
            let mut list = write(&self.themes);
            let added = themes::add_theme(&mut list, theme, Utc::now().timestamp_millis())?;
            (added, list.clone())
        };
        info!(target: "refresh", theme = %added.name, total = current.len(), "theme added");
        self.save_themes(&current);
        self.try_refresh().await;
        Ok(added)
    }

    /// Remove the theme with `id`; refreshes only when something was removed.
    pub async fn remove_theme(&self, id: &str) -> bool {
        let (removed, current) = {
            let mut list = write(&self.themes);
            let removed = themes::remove_theme(&mut list, id);
            (removed, list.clone())
        };
        if removed {
            info!(target: "refresh", id, total = current.len(), "theme removed");
            self.save_themes(&current);
            self.try_refresh().await;
        }
        removed
    }

    fn save_themes(&self, list: &[Theme]) {
        let Some(path) = &self.themes_path else {
            return;
        };
        if let Err(e) = themes::save_themes_to(path, list) {
            warn!(target: "refresh", error = %format!("{e:#}"), path = %path.display(), "theme save failed; keeping in-memory themes");
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn corrections(&self) -> CorrectionLog {
        lock(&self.corrections).clone()
    }

    pub fn content_max_chars(&self) -> usize {
        self.content_max_chars
    }

    /// Run one refresh unless one is already in flight.
    pub async fn try_refresh(&self) -> RefreshOutcome {
        if self
            .updating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            counter!("refresh_skipped_total").increment(1);
            info!(target: "refresh", "refresh already in progress, skipped");
            return RefreshOutcome::Skipped;
        }
        let _guard = UpdatingGuard(&self.updating);

        if self.sources.is_empty() {
            let stats = lock(&self.engine).learning_stats();
            let now = Utc::now();
            *write(&self.state) = CachedState {
                articles: Vec::new(),
                analysis: AnalysisSnapshot::empty(now, Some(stats)),
                last_update: Some(now),
            };
            info!(target: "refresh", "no sources configured, state reset");
            return RefreshOutcome::Completed { articles: 0 };
        }

        let articles = ingest::run_once(&self.sources, self.content_max_chars).await;

        let themes = self.themes();
        let previous = {
            let st = read(&self.state);
            st.last_update.map(|ts| (st.analysis.clone(), ts))
        };
        if let Some((snapshot, ts)) = previous {
            self.history.push(snapshot, ts);
        }
        let previous = self.history.latest();

        let run = {
            let mut engine = lock(&self.engine);
            pipeline::aggregate(&mut engine, &articles, &themes, previous.as_ref())
        };

        let n = run.scored.len();
        *write(&self.state) = CachedState {
            articles: run.scored,
            analysis: run.snapshot,
            last_update: Some(Utc::now()),
        };
        info!(target: "refresh", articles = n, themes = themes.len(), "refresh complete");
        RefreshOutcome::Completed { articles: n }
    }

    /// Apply external corrections to the cached articles and re-aggregate
    /// them without re-scoring. Returns the number applied.
    pub fn apply_corrections(&self, records: Vec<CorrectionRecord>) -> usize {
        let themes = self.themes();
        let stats = lock(&self.engine).learning_stats();
        let previous = self.history.latest();

        let applied = {
            let mut st = write(&self.state);
            let applied = corrections::apply_corrections(&mut st.articles, &records);
            if applied > 0 {
                st.analysis = pipeline::aggregate_scored(
                    &st.articles,
                    &themes,
                    previous.as_ref(),
                    Some(stats),
                    Utc::now(),
                );
            }
            applied
        };

        lock(&self.corrections).record(records, Utc::now());
        applied
    }
}

/// Spawn a Tokio interval task calling `try_refresh`. The first tick fires
/// immediately.
pub fn spawn_scheduler(coord: Arc<RefreshCoordinator>, interval_secs: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        loop {
            ticker.tick().await;
            match coord.try_refresh().await {
                RefreshOutcome::Completed { articles } => {
                    info!(target: "refresh", articles, "scheduled refresh tick")
                }
                RefreshOutcome::Skipped => {
                    warn!(target: "refresh", "scheduled refresh overlapped a running one")
                }
            }
        }
    })
}
