//! External score corrections.
//!
//! A correction channel (outside this crate) submits
//! `{articleId, correctedScore, confidence}` records. Applying one
//! overwrites the stored score of the article whose link matches and flags
//! it `iaCorrected`; the caller then re-aggregates without re-scoring.

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use crate::pipeline::ScoredArticle;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionRecord {
    /// Link of the target article.
    pub article_id: String,
    pub corrected_score: f64,
    #[serde(default)]
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionStats {
    pub total_corrections: u64,
}

/// Every batch received, newest last.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionLog {
    pub corrections: Vec<Vec<CorrectionRecord>>,
    pub last_correction: Option<DateTime<Utc>>,
    pub stats: CorrectionStats,
}

impl CorrectionLog {
    pub fn record(&mut self, batch: Vec<CorrectionRecord>, now: DateTime<Utc>) {
        self.stats.total_corrections += batch.len() as u64;
        self.corrections.push(batch);
        self.last_correction = Some(now);
    }
}

/// Apply records to `articles` in place. Unknown ids are ignored; a score
/// that is not finite is skipped. Returns the number applied.
pub fn apply_corrections(articles: &mut [ScoredArticle], records: &[CorrectionRecord]) -> usize {
    let index: HashMap<&str, usize> = records
        .iter()
        .enumerate()
        .map(|(i, r)| (r.article_id.as_str(), i))
        .collect();

    let mut applied = 0usize;
    for sa in articles.iter_mut() {
        let Some(&i) = index.get(sa.article.link.as_str()) else {
            continue;
        };
        let rec = &records[i];
        if !rec.corrected_score.is_finite() {
            continue;
        }
        sa.sentiment
            .apply_correction(rec.corrected_score, rec.confidence.clamp(0.0, 1.0));
        applied += 1;
    }

    counter!("corrections_applied_total").increment(applied as u64);
    info!(
        target: "pipeline",
        received = records.len(),
        applied,
        "corrections applied"
    );
    applied
}
