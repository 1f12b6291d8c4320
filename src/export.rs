//! JSON and CSV export of the cached state.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::corrections::CorrectionLog;
use crate::lexicon::{LearningStats, LexiconDocument};
use crate::pipeline::{parse_published, AnalysisSnapshot, ScoredArticle};
use crate::refresh::CachedState;
use crate::themes::Theme;

const BOM: &str = "\u{FEFF}";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    pub exported_at: DateTime<Utc>,
    pub total_articles: usize,
    pub total_themes: usize,
    pub last_update: Option<DateTime<Utc>>,
    pub learning_stats: LearningStats,
    pub ia_corrections: CorrectionLog,
}

#[derive(Debug, Serialize)]
pub struct ExportConfiguration<'a> {
    pub feeds: &'a [String],
    pub themes: &'a [Theme],
}

#[derive(Debug, Serialize)]
pub struct ExportData<'a> {
    pub articles: &'a [ScoredArticle],
    pub analysis: &'a AnalysisSnapshot,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonExport<'a> {
    pub metadata: ExportMetadata,
    pub configuration: ExportConfiguration<'a>,
    pub data: ExportData<'a>,
    pub sentiment_lexicon: LexiconDocument,
}

/// Everything an export needs, borrowed from the running service.
pub struct ExportInput<'a> {
    pub state: &'a CachedState,
    pub feeds: &'a [String],
    pub themes: &'a [Theme],
    pub learning_stats: LearningStats,
    pub corrections: CorrectionLog,
    pub lexicon: LexiconDocument,
}

pub fn json_export(input: ExportInput<'_>, now: DateTime<Utc>) -> Result<String> {
    let doc = JsonExport {
        metadata: ExportMetadata {
            exported_at: now,
            total_articles: input.state.articles.len(),
            total_themes: input.state.analysis.themes.len(),
            last_update: input.state.last_update,
            learning_stats: input.learning_stats,
            ia_corrections: input.corrections,
        },
        configuration: ExportConfiguration {
            feeds: input.feeds,
            themes: input.themes,
        },
        data: ExportData {
            articles: &input.state.articles,
            analysis: &input.state.analysis,
        },
        sentiment_lexicon: input.lexicon,
    };
    serde_json::to_string_pretty(&doc).context("serializing JSON export")
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    #[serde(rename = "Title")]
    title: &'a str,
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Link")]
    link: &'a str,
    #[serde(rename = "Themes")]
    themes: String,
    #[serde(rename = "Score")]
    score: f64,
    #[serde(rename = "Confidence")]
    confidence: f64,
    #[serde(rename = "Corrected")]
    corrected: &'static str,
}

/// Themes (in snapshot order) whose article list holds `link`.
fn matching_themes(snapshot: &AnalysisSnapshot, link: &str) -> String {
    snapshot
        .themes
        .iter()
        .filter(|(_, ta)| ta.contains_link(link))
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// One row per cached article, UTF-8 with a BOM so spreadsheets pick the
/// right encoding.
pub fn csv_export(state: &CachedState) -> Result<String> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(BOM.as_bytes().to_vec());

    for sa in &state.articles {
        let date = match parse_published(sa.article.published_at.as_deref()) {
            Some(d) => d.format("%Y-%m-%d").to_string(),
            None => sa.article.published_at.clone().unwrap_or_default(),
        };
        wtr.serialize(CsvRow {
            title: &sa.article.title,
            date,
            link: sa.link(),
            themes: matching_themes(&state.analysis, sa.link()),
            score: sa.sentiment.score(),
            confidence: sa.sentiment.analysis.confidence,
            corrected: if sa.sentiment.ia_corrected { "yes" } else { "no" },
        })
        .context("writing CSV row")?;
    }

    // No rows means serde never emitted the header line.
    if state.articles.is_empty() {
        wtr.write_record([
            "Title",
            "Date",
            "Link",
            "Themes",
            "Score",
            "Confidence",
            "Corrected",
        ])
        .context("writing CSV header")?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| anyhow::anyhow!("flushing CSV export: {}", e.error()))?;
    String::from_utf8(bytes).context("CSV export is not UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::SentimentEngine;
    use crate::ingest::types::Article;
    use crate::pipeline;

    fn state() -> CachedState {
        let mut eng = SentimentEngine::in_memory();
        let themes = vec![Theme::new("Economie", &["croissance"]), Theme::new("Paix", &["accord"])];
        let articles = vec![
            Article::new(
                "Accord sur la croissance, \"enfin\"",
                "",
                "https://x/1",
                Some("2025-03-01T10:00:00Z"),
            ),
            Article::new("Sans theme", "", "https://x/2", None),
        ];
        let run = pipeline::aggregate(&mut eng, &articles, &themes, None);
        CachedState {
            articles: run.scored,
            analysis: run.snapshot,
            last_update: Some(Utc::now()),
        }
    }

    #[test]
    fn csv_has_bom_header_and_quoted_rows() {
        let out = csv_export(&state()).unwrap();
        assert!(out.starts_with(BOM));
        let mut lines = out.trim_start_matches(BOM).lines();
        assert_eq!(
            lines.next(),
            Some("Title,Date,Link,Themes,Score,Confidence,Corrected")
        );
        let first = lines.next().unwrap();
        assert!(first.starts_with("\"Accord sur la croissance, \"\"enfin\"\"\",2025-03-01,https://x/1,"));
        assert!(first.contains("\"Economie, Paix\""));
        assert!(first.ends_with(",no"));
        let second = lines.next().unwrap();
        assert!(second.starts_with("Sans theme,,https://x/2,,"));
        assert!(lines.next().is_none());
    }

    #[test]
    fn csv_of_empty_state_is_header_only() {
        let out = csv_export(&CachedState::default()).unwrap();
        assert_eq!(
            out.trim_start_matches(BOM).trim_end(),
            "Title,Date,Link,Themes,Score,Confidence,Corrected"
        );
    }

    #[test]
    fn json_export_has_all_sections() {
        let st = state();
        let eng = SentimentEngine::in_memory();
        let feeds = vec!["https://ex.org/rss".to_string()];
        let themes = vec![Theme::new("Economie", &["croissance"])];
        let out = json_export(
            ExportInput {
                state: &st,
                feeds: &feeds,
                themes: &themes,
                learning_stats: eng.learning_stats(),
                corrections: CorrectionLog::default(),
                lexicon: eng.lexicon().to_document(),
            },
            Utc::now(),
        )
        .unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["metadata"]["totalArticles"], 2);
        assert_eq!(v["metadata"]["totalThemes"], 2);
        assert_eq!(v["configuration"]["feeds"][0], "https://ex.org/rss");
        assert_eq!(v["data"]["articles"].as_array().map(Vec::len), Some(2));
        assert!(v["sentimentLexicon"]["words"].is_object());
    }
}
