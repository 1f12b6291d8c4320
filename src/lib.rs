// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod corrections;
pub mod export;
pub mod history;
pub mod lexicon;
pub mod metrics;
pub mod pipeline;
pub mod refresh;
pub mod themes;

// Scoring engine (normalizer, context analyzer, scoring, online learner)
pub mod analyze;

// Feed ingest (RSS source, normalization, dedup)
pub mod ingest;

// ---- Re-exports for stable public API ----
pub use crate::analyze::{AnalysisResult, Sentiment, SentimentEngine};
pub use crate::api::{create_router, AppState};
pub use crate::ingest::types::{Article, ArticleSource};
pub use crate::lexicon::{Lexicon, LexiconStore};
pub use crate::pipeline::{aggregate, AnalysisSnapshot};
pub use crate::refresh::{RefreshCoordinator, RefreshOutcome};
pub use crate::themes::Theme;
