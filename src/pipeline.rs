//! # Theme Aggregation Pipeline
//! Scores a batch of articles and folds them into per-theme, per-date
//! statistics. Every run rebuilds the snapshot from scratch; the previous
//! snapshot is only read to compute trends.
//!
//! Results are paired with articles by value ([`ScoredArticle`]), the
//! caller's `Article` records are never mutated.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::info;

use crate::analyze::{classify, AnalysisResult, Sentiment, SentimentEngine};
use crate::ingest::types::Article;
use crate::lexicon::{round2, LearningStats};
use crate::themes::Theme;

const TREND_BAND: f64 = 5.0;

/// Date → theme → matched article count.
pub type Timeline = BTreeMap<String, BTreeMap<String, u64>>;

/// Scoring output attached to one article, plus correction bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleSentiment {
    #[serde(flatten)]
    pub analysis: AnalysisResult,
    #[serde(default)]
    pub ia_corrected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correction_confidence: Option<f64>,
}

impl ArticleSentiment {
    pub fn new(analysis: AnalysisResult) -> Self {
        Self {
            analysis,
            ia_corrected: false,
            original_score: None,
            correction_confidence: None,
        }
    }

    /// Overwrite the score with an externally corrected one. The label is
    /// re-derived from the new score and the stored emotional intensity.
    pub fn apply_correction(&mut self, corrected_score: f64, confidence: f64) {
        self.original_score.get_or_insert(self.analysis.score);
        self.analysis.score = corrected_score;
        self.analysis.sentiment = classify(corrected_score, self.analysis.emotional_intensity);
        self.ia_corrected = true;
        self.correction_confidence = Some(confidence);
    }

    pub fn score(&self) -> f64 {
        self.analysis.score
    }

    pub fn label(&self) -> Sentiment {
        self.analysis.sentiment
    }
}

/// An article keyed by its link, with its sentiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredArticle {
    #[serde(flatten)]
    pub article: Article,
    pub sentiment: ArticleSentiment,
}

impl ScoredArticle {
    pub fn link(&self) -> &str {
        &self.article.link
    }
}

/// Compact article reference stored under each theme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeArticle {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub published_at: Option<String>,
    pub score: f64,
    pub sentiment: Sentiment,
    pub confidence: f64,
    #[serde(default)]
    pub ia_corrected: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentDistribution {
    pub positive: u64,
    pub negative: u64,
    pub neutral: u64,
    pub average_score: f64,
    pub average_confidence: f64,
    pub positive_percent: u32,
    pub negative_percent: u32,
    pub neutral_percent: u32,
}

impl SentimentDistribution {
    fn tally(&mut self, label: Sentiment) {
        match label {
            Sentiment::Positive => self.positive += 1,
            Sentiment::Negative => self.negative += 1,
            Sentiment::Neutral => self.neutral += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeAnalysis {
    pub count: u64,
    pub articles: Vec<ThemeArticle>,
    pub keywords: Vec<String>,
    pub color: String,
    pub keyword_matches: BTreeMap<String, u64>,
    pub sentiment: SentimentDistribution,
}

impl ThemeAnalysis {
    fn empty(theme: &Theme) -> Self {
        Self {
            count: 0,
            articles: Vec::new(),
            keywords: theme.keywords.clone(),
            color: theme.color_or_default().to_string(),
            keyword_matches: BTreeMap::new(),
            sentiment: SentimentDistribution::default(),
        }
    }

    pub fn contains_link(&self, link: &str) -> bool {
        self.articles.iter().any(|a| a.link == link)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trend {
    pub growth: f64,
    pub trend: TrendDirection,
    pub current_count: u64,
    pub previous_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordEffectiveness {
    pub matches: u64,
    /// Percentage of all articles, 1 decimal.
    pub effectiveness: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetrics {
    pub keyword_effectiveness: BTreeMap<String, BTreeMap<String, KeywordEffectiveness>>,
    pub correlations: BTreeMap<String, BTreeMap<String, u64>>,
    pub seasonality: Timeline,
    #[serde(default)]
    pub learning_stats: Option<LearningStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSnapshot {
    pub themes: BTreeMap<String, ThemeAnalysis>,
    pub timeline: Timeline,
    pub total_articles: usize,
    pub trends: BTreeMap<String, Trend>,
    pub metrics: SnapshotMetrics,
    pub generated_at: DateTime<Utc>,
}

impl AnalysisSnapshot {
    pub fn empty(now: DateTime<Utc>, learning_stats: Option<LearningStats>) -> Self {
        Self {
            themes: BTreeMap::new(),
            timeline: BTreeMap::new(),
            total_articles: 0,
            trends: BTreeMap::new(),
            metrics: SnapshotMetrics {
                learning_stats,
                ..SnapshotMetrics::default()
            },
            generated_at: now,
        }
    }
}

/// Output of one run: the snapshot and the scored articles it was built from.
#[derive(Debug, Clone)]
pub struct AggregationRun {
    pub snapshot: AnalysisSnapshot,
    pub scored: Vec<ScoredArticle>,
}

#[inline]
fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

const NAIVE_DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// RFC 3339, RFC 2822, then offset-less ISO datetimes and bare dates (UTC).
pub fn parse_published(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let s = raw?.trim();
    if let Ok(d) = DateTime::parse_from_rfc3339(s).or_else(|_| DateTime::parse_from_rfc2822(s)) {
        return Some(d.with_timezone(&Utc));
    }
    // No offset given: read as UTC.
    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}

/// UTC `YYYY-MM-DD` of the publish date, `now` when missing or malformed.
pub fn date_bucket(raw: Option<&str>, now: DateTime<Utc>) -> String {
    parse_published(raw)
        .unwrap_or(now)
        .format("%Y-%m-%d")
        .to_string()
}

/// Score every article (learning as a side effect).
pub fn score_articles(engine: &mut SentimentEngine, articles: &[Article]) -> Vec<ScoredArticle> {
    articles
        .iter()
        .map(|a| {
            let text = a.full_text();
            ScoredArticle {
                article: a.clone(),
                sentiment: ArticleSentiment::new(engine.analyze(text.as_str())),
            }
        })
        .collect()
}

pub fn aggregate(
    engine: &mut SentimentEngine,
    articles: &[Article],
    themes: &[Theme],
    previous: Option<&AnalysisSnapshot>,
) -> AggregationRun {
    aggregate_at(engine, articles, themes, previous, Utc::now())
}

/// Score then aggregate, with an explicit clock for date fallbacks.
pub fn aggregate_at(
    engine: &mut SentimentEngine,
    articles: &[Article],
    themes: &[Theme],
    previous: Option<&AnalysisSnapshot>,
    now: DateTime<Utc>,
) -> AggregationRun {
    let t0 = Instant::now();
    let scored = score_articles(engine, articles);
    engine.flush_if_dirty();

    let snapshot = aggregate_scored(&scored, themes, previous, Some(engine.learning_stats()), now);

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("aggregation_ms").record(ms);
    counter!("aggregation_runs_total").increment(1);
    info!(
        target: "pipeline",
        articles = snapshot.total_articles,
        themes = snapshot.themes.len(),
        ms = ms,
        "aggregation finished"
    );

    AggregationRun { snapshot, scored }
}

/// Aggregate already-scored articles (no re-scoring, no learning).
pub fn aggregate_scored(
    scored: &[ScoredArticle],
    themes: &[Theme],
    previous: Option<&AnalysisSnapshot>,
    learning_stats: Option<LearningStats>,
    now: DateTime<Utc>,
) -> AnalysisSnapshot {
    let mut out: BTreeMap<String, ThemeAnalysis> = themes
        .iter()
        .map(|t| (t.name.clone(), ThemeAnalysis::empty(t)))
        .collect();
    let mut timeline: Timeline = BTreeMap::new();

    let lowered: Vec<String> = scored
        .iter()
        .map(|s| s.article.full_text().to_lowercase())
        .collect();

    for (sa, lower) in scored.iter().zip(&lowered) {
        let bucket = timeline
            .entry(date_bucket(sa.article.published_at.as_deref(), now))
            .or_insert_with(|| themes.iter().map(|t| (t.name.clone(), 0)).collect());

        for theme in themes {
            let hits = theme.matched_keywords(lower);
            if hits.is_empty() {
                continue;
            }
            let Some(ta) = out.get_mut(&theme.name) else {
                continue;
            };
            ta.count += 1;
            *bucket.entry(theme.name.clone()).or_insert(0) += 1;
            ta.sentiment.tally(sa.sentiment.label());
            for kw in hits {
                *ta.keyword_matches.entry(kw.to_string()).or_insert(0) += 1;
            }
            ta.articles.push(ThemeArticle {
                title: sa.article.title.clone(),
                link: sa.article.link.clone(),
                published_at: sa.article.published_at.clone(),
                score: sa.sentiment.score(),
                sentiment: sa.sentiment.label(),
                confidence: sa.sentiment.analysis.confidence,
                ia_corrected: sa.sentiment.ia_corrected,
            });
        }
    }

    for ta in out.values_mut() {
        finalize_sentiment(ta);
    }

    let mut snapshot = AnalysisSnapshot {
        themes: out,
        timeline,
        total_articles: scored.len(),
        trends: BTreeMap::new(),
        metrics: SnapshotMetrics::default(),
        generated_at: now,
    };
    snapshot.metrics = SnapshotMetrics {
        keyword_effectiveness: keyword_effectiveness(&lowered, themes),
        correlations: correlations(&lowered, themes),
        seasonality: seasonality(&snapshot.timeline),
        learning_stats,
    };
    if let Some(prev) = previous {
        snapshot.trends = calculate_trends(&snapshot, prev);
    }
    snapshot
}

fn finalize_sentiment(ta: &mut ThemeAnalysis) {
    let n = ta.articles.len();
    if n == 0 {
        return;
    }
    let nf = n as f64;
    let s = &mut ta.sentiment;
    s.average_score = round2(ta.articles.iter().map(|a| a.score).sum::<f64>() / nf);
    s.average_confidence = round2(ta.articles.iter().map(|a| a.confidence).sum::<f64>() / nf);
    s.positive_percent = (s.positive as f64 / nf * 100.0).round() as u32;
    s.negative_percent = (s.negative as f64 / nf * 100.0).round() as u32;
    s.neutral_percent = (s.neutral as f64 / nf * 100.0).round() as u32;
}

/// Per theme, per keyword: matching articles and their share of the batch.
pub fn keyword_effectiveness(
    lowered: &[String],
    themes: &[Theme],
) -> BTreeMap<String, BTreeMap<String, KeywordEffectiveness>> {
    let total = lowered.len();
    themes
        .iter()
        .map(|t| {
            let per_kw = t
                .keywords
                .iter()
                .map(|kw| {
                    let needle = kw.to_lowercase();
                    let matches = lowered.iter().filter(|l| l.contains(&needle)).count() as u64;
                    let effectiveness = if total == 0 {
                        0.0
                    } else {
                        round1(matches as f64 / total as f64 * 100.0)
                    };
                    (kw.clone(), KeywordEffectiveness { matches, effectiveness })
                })
                .collect();
            (t.name.clone(), per_kw)
        })
        .collect()
}

/// Symmetric co-occurrence counts; self-pairs are never present.
pub fn correlations(lowered: &[String], themes: &[Theme]) -> BTreeMap<String, BTreeMap<String, u64>> {
    let mut out: BTreeMap<String, BTreeMap<String, u64>> = themes
        .iter()
        .map(|a| {
            let row = themes
                .iter()
                .filter(|b| b.name != a.name)
                .map(|b| (b.name.clone(), 0))
                .collect();
            (a.name.clone(), row)
        })
        .collect();

    for lower in lowered {
        let hit: Vec<&str> = themes
            .iter()
            .filter(|t| t.matches(lower))
            .map(|t| t.name.as_str())
            .collect();
        for a in &hit {
            for b in &hit {
                if a == b {
                    continue;
                }
                if let Some(row) = out.get_mut(*a) {
                    *row.entry(b.to_string()).or_insert(0) += 1;
                }
            }
        }
    }
    out
}

/// Roll the daily timeline up into `YYYY-MM` months.
pub fn seasonality(timeline: &Timeline) -> Timeline {
    let mut out: Timeline = BTreeMap::new();
    for (date, per_theme) in timeline {
        let month = date.get(..7).unwrap_or(date).to_string();
        let slot = out.entry(month).or_default();
        for (theme, n) in per_theme {
            *slot.entry(theme.clone()).or_insert(0) += n;
        }
    }
    out
}

/// `(current - previous) / previous × 100`; 100 when previous is 0 and
/// current is not; themes absent from `previous` count as 0.
pub fn calculate_trends(
    current: &AnalysisSnapshot,
    previous: &AnalysisSnapshot,
) -> BTreeMap<String, Trend> {
    current
        .themes
        .iter()
        .map(|(name, ta)| {
            let cur = ta.count;
            let prev = previous.themes.get(name).map_or(0, |p| p.count);
            (name.clone(), trend_between(cur, prev))
        })
        .collect()
}

pub fn trend_between(current: u64, previous: u64) -> Trend {
    let growth = if previous > 0 {
        (current as f64 - previous as f64) / previous as f64 * 100.0
    } else if current > 0 {
        100.0
    } else {
        0.0
    };
    let trend = if growth > TREND_BAND {
        TrendDirection::Up
    } else if growth < -TREND_BAND {
        TrendDirection::Down
    } else {
        TrendDirection::Stable
    };
    Trend {
        growth: round1(growth),
        trend,
        current_count: current,
        previous_count: previous,
    }
}
