//! Batch driver: roster + activity logs + ML scores → processed_candidates.json.
//!
//! Usage: `batch [--repair] [--no-delay]`
//!   --repair    fix malformed `candidate*.json` files in the data dir first
//!   --no-delay  skip the inter-candidate pause (e.g. with AI_TEST_MODE=mock)

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use proctor_risk_fusion::config::AppConfig;
use proctor_risk_fusion::pipeline::{run_batch, BatchItem, CandidateAnalyzer};
use proctor_risk_fusion::{repair, store};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).compact().init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let do_repair = args.iter().any(|a| a == "--repair");
    let no_delay = args.iter().any(|a| a == "--no-delay");

    let cfg = AppConfig::load()?;
    let batch = &cfg.batch;

    if do_repair {
        let (fixed, failed) = repair::repair_dir(&batch.data_dir)?;
        info!(fixed, failed, "repaired activity logs");
    }

    let roster = store::load_roster(&batch.candidates_path)?;
    let ml_scores = store::load_ml_scores(&batch.ml_scores_path).unwrap_or_else(|e| {
        warn!(error = ?e, "ML scores unavailable, fusing without them");
        HashMap::new()
    });

    let items: Vec<BatchItem> = roster
        .into_iter()
        .map(|info| BatchItem {
            log: store::load_activity_log(&batch.data_dir, &info.id),
            ml_score: ml_scores.get(&info.id.to_string()).copied(),
            info,
        })
        .collect();
    info!(candidates = items.len(), "starting batch");

    let delay = if no_delay {
        Duration::ZERO
    } else {
        Duration::from_secs(batch.delay_secs)
    };
    let analyzer = Arc::new(CandidateAnalyzer::from_config(&cfg));
    let results = run_batch(analyzer, items, delay).await;

    if let Some(b) = store::backup_previous_results(&batch.output_path, chrono::Utc::now())? {
        info!(backup = %b.display(), "kept previous results");
    }
    store::save_results(&batch.output_path, &results)?;
    info!(path = %batch.output_path.display(), count = results.len(), "results saved");
    Ok(())
}
