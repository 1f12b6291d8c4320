// src/ingest/mod.rs
pub mod rss;
pub mod types;

use crate::ingest::types::{Article, ArticleSource};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use std::collections::HashSet;

pub const UNTITLED: &str = "Untitled";
pub const DEFAULT_CONTENT_MAX_CHARS: usize = 500;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "ingest_articles_total",
            "Articles kept after normalization + dedup."
        );
        describe_counter!(
            "ingest_dedup_total",
            "Articles dropped because their link was already seen."
        );
        describe_counter!(
            "ingest_source_errors_total",
            "Source fetch/parse errors."
        );
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
        describe_gauge!(
            "ingest_pipeline_last_run_ts",
            "Unix ts when ingest last ran."
        );
    });
}

/// Decode entities, strip tags, collapse whitespace, cap at `max_chars`.
pub fn normalize_text(s: &str, max_chars: usize) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Collapse whitespace
    out = out.split_whitespace().collect::<Vec<_>>().join(" ");

    // 4) Length cap
    if out.chars().count() > max_chars {
        out = out.chars().take(max_chars).collect();
    }

    out
}

/// Normalize a raw batch: clean text, fill title/link placeholders,
/// drop repeated links (first occurrence wins). Returns (kept, dedup_count).
pub fn prepare_articles(raw: Vec<Article>, max_chars: usize) -> (Vec<Article>, usize) {
    let mut seen: HashSet<String> = HashSet::new();
    let mut keep = Vec::with_capacity(raw.len());
    let mut dedup_out = 0usize;

    for (index, mut a) in raw.into_iter().enumerate() {
        a.title = normalize_text(&a.title, usize::MAX);
        if a.title.is_empty() {
            a.title = UNTITLED.to_string();
        }
        a.content = normalize_text(&a.content, max_chars);
        a.link = a.link.trim().to_string();
        if a.link.is_empty() {
            a.link = format!("#{index}");
        }

        if !seen.insert(a.link.clone()) {
            dedup_out += 1;
            continue;
        }
        keep.push(a);
    }

    (keep, dedup_out)
}

/// Fetch every source once; a failing source is logged and skipped.
pub async fn run_once(sources: &[Box<dyn ArticleSource>], max_chars: usize) -> Vec<Article> {
    ensure_metrics_described();

    let mut raw = Vec::new();
    for s in sources {
        match s.fetch_latest().await {
            Ok(mut v) => {
                tracing::info!(target: "ingest", source = s.name(), items = v.len(), "source fetched");
                raw.append(&mut v);
            }
            Err(e) => {
                tracing::warn!(target: "ingest", error = %format!("{e:#}"), source = s.name(), "source error");
                counter!("ingest_source_errors_total").increment(1);
            }
        }
    }

    let (kept, dedup_cnt) = prepare_articles(raw, max_chars);

    // Telemetry
    let now = chrono::Utc::now().timestamp().max(0) as u64;
    counter!("ingest_articles_total").increment(kept.len() as u64);
    counter!("ingest_dedup_total").increment(dedup_cnt as u64);
    gauge!("ingest_pipeline_last_run_ts").set(now as f64);

    kept
}
