//! Online learner: adjusts lexicon weights and usage statistics.
//!
//! Two paths:
//! - [`observe`] runs after every analysis and drifts weights slowly.
//! - [`learn_from_correction`] applies an explicit expected score at once.
//!
//! Neither path persists anything; the caller flushes on `weights_changed`.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::normalize::normalize;
use super::scoring::{self, AnalysisResult};
use crate::lexicon::Lexicon;

/// Usage count above which an unweighted token receives a learned weight.
const SEED_USAGE_MIN: u64 = 3;
/// Usage count above which a weighted token starts drifting.
const DRIFT_USAGE_MIN: u64 = 10;
const SEED_SCALE: f64 = 0.3;
const SEED_BOUND: f64 = 1.0;
const TARGET_SCORE_SHARE: f64 = 0.7;
const TARGET_BASE_SHARE: f64 = 0.3;
const CONSISTENCY_KEEP: f64 = 0.9;
/// Corrections below this absolute error leave the lexicon untouched.
pub const CORRECTION_TOLERANCE: f64 = 0.2;
const CORRECTION_GAIN: f64 = 2.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LearnOutcome {
    pub weights_changed: bool,
    pub usage_changed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionOutcome {
    pub actual: f64,
    pub expected: f64,
    pub error: f64,
    /// True if at least one weight was nudged.
    pub applied: bool,
}

/// Fold one analysis into the lexicon.
///
/// Only entries of `result.words` are observed. Tokens the scorer skipped
/// (weight below the scoring threshold) are never tracked, so filler words
/// cannot pick up a polarity from the articles they appear in.
pub fn observe(lexicon: &mut Lexicon, result: &AnalysisResult, now: DateTime<Utc>) -> LearnOutcome {
    let mut out = LearnOutcome::default();
    let overall = result.score;

    for entry in &result.words {
        let st = lexicon.usage_entry(&entry.token, now);
        st.usage_count += 1;
        st.last_used = now;
        out.usage_changed = true;

        if entry.context_only {
            continue;
        }
        if entry.base_weight == 0.0 {
            if st.usage_count > SEED_USAGE_MIN {
                let learned = (overall * SEED_SCALE).clamp(-SEED_BOUND, SEED_BOUND);
                out.weights_changed |= lexicon.set_weight(&entry.token, learned);
            }
            continue;
        }
        if st.usage_count <= DRIFT_USAGE_MIN {
            continue;
        }
        let diff = (entry.contribution - overall).abs();
        st.consistency = CONSISTENCY_KEEP * st.consistency + (1.0 - CONSISTENCY_KEEP) * (1.0 - diff);

        let base = entry.base_weight;
        let target = overall * TARGET_SCORE_SHARE + base * TARGET_BASE_SHARE;
        let next = base + (target - base) * lexicon.learning_rate();
        out.weights_changed |= lexicon.set_weight(&entry.token, next);
    }

    out
}

/// Re-score `text` (without the per-analysis learning) and, if the score is
/// more than 0.2 away from `expected`, nudge every weighted token present.
pub fn learn_from_correction(lexicon: &mut Lexicon, text: &str, expected: f64) -> CorrectionOutcome {
    let actual = scoring::analyze(lexicon, text).score;
    let error = expected - actual;
    let mut applied = false;

    if error.abs() > CORRECTION_TOLERANCE {
        let delta = error * lexicon.learning_rate() * CORRECTION_GAIN;
        for tok in normalize(text) {
            let w = lexicon.weight(&tok);
            if w != 0.0 {
                applied |= lexicon.set_weight(&tok, w + delta);
            }
        }
    }

    CorrectionOutcome {
        actual,
        expected,
        error,
        applied,
    }
}
