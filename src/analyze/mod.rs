// src/analyze/mod.rs
//! Sentiment analysis entry: text normalizer, context analyzer, scoring engine
//! and online learner, wired together by [`SentimentEngine`].

pub mod context;
pub mod learner;
pub mod markers;
pub mod normalize;
pub mod scoring;

use chrono::Utc;
use metrics::counter;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::lexicon::{LearningStats, Lexicon, LexiconStore};

// Re-export convenient types.
pub use crate::analyze::learner::{CorrectionOutcome, LearnOutcome};
pub use crate::analyze::normalize::normalize;
pub use crate::analyze::scoring::{classify, AnalysisResult, Sentiment, TokenScore};

/// Short SHA-256 prefix identifying a text in logs without its content.
pub fn anon_id(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Scoring engine bound to the process lexicon (single writer).
///
/// `analyze` scores first, then feeds the result to the learner. Weight
/// changes are flushed immediately; usage-only changes are left dirty until
/// [`SentimentEngine::flush_if_dirty`].
#[derive(Debug)]
pub struct SentimentEngine {
    store: LexiconStore,
}

impl SentimentEngine {
    pub fn new(store: LexiconStore) -> Self {
        Self { store }
    }

    /// Engine over the default seed with in-memory persistence.
    pub fn in_memory() -> Self {
        Self::new(LexiconStore::in_memory())
    }

    pub fn lexicon(&self) -> &Lexicon {
        self.store.lexicon()
    }

    pub fn store(&self) -> &LexiconStore {
        &self.store
    }

    /// Score `text` and learn from it.
    pub fn analyze<'a>(&mut self, text: impl Into<Option<&'a str>>) -> AnalysisResult {
        let text = text.into();
        let result = scoring::analyze(self.store.lexicon(), text);

        counter!("articles_scored_total").increment(1);
        if result.irony_detected {
            counter!("irony_detected_total").increment(1);
        }

        if result.words.is_empty() {
            return result;
        }

        let outcome = learner::observe(self.store.lexicon_mut(), &result, Utc::now());
        if outcome.weights_changed {
            self.store.flush();
        } else if outcome.usage_changed {
            self.store.mark_dirty();
        }
        result
    }

    /// Score without learning (lexicon untouched).
    pub fn peek<'a>(&self, text: impl Into<Option<&'a str>>) -> AnalysisResult {
        scoring::analyze(self.store.lexicon(), text)
    }

    /// Apply an expected score for `text`; flushes when weights moved.
    pub fn learn_from_correction(&mut self, text: &str, expected: f64) -> CorrectionOutcome {
        let out = learner::learn_from_correction(self.store.lexicon_mut(), text, expected);
        debug!(
            target: "lexicon",
            text_id = %anon_id(text),
            actual = out.actual,
            expected = out.expected,
            applied = out.applied,
            "correction evaluated"
        );
        if out.applied {
            self.store.flush();
        }
        out
    }

    pub fn learning_stats(&self) -> LearningStats {
        self.store.lexicon().learning_stats()
    }

    pub fn reset(&mut self) {
        self.store.reset();
    }

    pub fn flush_if_dirty(&mut self) {
        self.store.flush_if_dirty();
    }
}
