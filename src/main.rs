//! Proctoring risk service — binary entrypoint.
//! Boots the Axum HTTP server: ad-hoc analysis, processed-batch queries, metrics.

use std::sync::Arc;

use proctor_risk_fusion::api::{self, AppState};
use proctor_risk_fusion::config::AppConfig;
use proctor_risk_fusion::metrics::Metrics;
use proctor_risk_fusion::pipeline::CandidateAnalyzer;
use shuttle_axum::ShuttleAxum;
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact logs; `RUST_LOG` overrides the default filter.
/// `try_init` because the deployment runtime may already own a subscriber.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("proctor_risk_fusion=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load()?;
    let analyzer = Arc::new(CandidateAnalyzer::from_config(&cfg));
    let state = AppState::from_results_file(analyzer, cfg.batch.output_path.clone());

    let mut router = api::router(state);
    match Metrics::init() {
        Ok(m) => router = router.merge(m.router()),
        Err(e) => warn!(error = ?e, "metrics disabled"),
    }

    Ok(router.into())
}
