use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static DESCRIBED: OnceCell<()> = OnceCell::new();

/// Register descriptions for every metric the service emits (idempotent).
pub fn describe_all() {
    DESCRIBED.get_or_init(|| {
        describe_counter!("articles_scored_total", "Texts passed through the scoring engine");
        describe_counter!("irony_detected_total", "Scored texts with at least one ironic token");
        describe_counter!("lexicon_flush_total", "Successful lexicon writes");
        describe_counter!("lexicon_flush_errors_total", "Failed lexicon writes");
        describe_counter!("aggregation_runs_total", "Theme aggregation runs");
        describe_histogram!("aggregation_ms", Unit::Milliseconds, "Scoring + aggregation time per run");
        describe_counter!("refresh_skipped_total", "Refresh requests dropped while one was in flight");
        describe_counter!("corrections_applied_total", "External score corrections applied");
        crate::ingest::ensure_metrics_described();
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Fails if one is already set.
    pub fn init() -> Result<Self> {
        // Use default buckets to avoid API differences across crate versions.
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        describe_all();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
