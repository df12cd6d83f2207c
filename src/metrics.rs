use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("judge_calls_total", "LLM judge calls issued, per judge.");
        describe_counter!(
            "judge_failures_total",
            "Judge calls that failed, timed out or returned malformed JSON."
        );
        describe_counter!(
            "synthesis_fallback_total",
            "Synthesis calls replaced by the highest-scoring judgment."
        );
        describe_counter!(
            "candidates_processed_total",
            "Candidates that produced a fused result."
        );
        describe_counter!(
            "candidates_failed_total",
            "Candidates replaced by the zero record."
        );
        describe_gauge!("last_overall_score", "Overall score of the last candidate.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder. Fails if a recorder is already installed.
    pub fn init() -> Result<Self> {
        // Use default buckets to avoid API differences across crate versions.
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_described();
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
