//! Candidate orchestration: rule-based score + LLM consensus + external ML score →
//! fused `CandidateResult`.
//!
//! Failure policy: a candidate that cannot be analyzed (invalid scores, or a
//! panicking task in `analyze_isolated`) becomes the zero/"No Risk" record; it
//! is logged and counted, never propagated, so the rest of the batch proceeds.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{ensure, Result};
use metrics::{counter, gauge};
use tracing::{error, info};

use crate::activity::ActivityEvent;
use crate::config::AppConfig;
use crate::consensus::ConsensusSynthesizer;
use crate::fusion::{fuse, ComponentScores};
use crate::llm::{build_judge, DisabledJudge, DynJudge};
use crate::metrics as telemetry;
use crate::record::{CandidateInfo, CandidateResult, MlScore};
use crate::rules::RuleScorer;
use crate::weights::ActivityWeightTable;

pub struct CandidateAnalyzer {
    rules: RuleScorer,
    consensus: ConsensusSynthesizer,
}

impl CandidateAnalyzer {
    pub fn new(rules: RuleScorer, consensus: ConsensusSynthesizer) -> Self {
        Self { rules, consensus }
    }

    /// Wire scorer and judges from config. Disabled judges are left out of the
    /// fan-out; an unknown synthesis judge means synthesis always falls back.
    pub fn from_config(cfg: &AppConfig) -> Self {
        let table = ActivityWeightTable::load_or_seed(cfg.scoring.weights_path.as_deref());
        let rules = RuleScorer::new(table, cfg.scoring.rule_params());

        let judges: Vec<DynJudge> = cfg
            .llm
            .judges
            .iter()
            .filter(|j| j.enabled)
            .map(build_judge)
            .collect();
        let synthesizer: DynJudge = match cfg.llm.synthesis_judge_config() {
            Some(j) => build_judge(j),
            None => Arc::new(DisabledJudge::new(&cfg.llm.synthesis_judge)),
        };

        let consensus = ConsensusSynthesizer::new(judges, synthesizer)
            .with_synthesis_model(cfg.llm.synthesis_model.clone())
            .with_timeout(Duration::from_secs(cfg.llm.timeout_secs));

        info!(
            judges = ?consensus.judge_names(),
            weights = rules.table().len(),
            "candidate analyzer ready"
        );
        Self::new(rules, consensus)
    }

    pub fn rules(&self) -> &RuleScorer {
        &self.rules
    }

    /// Run all stages; errors only on scores that violate the output invariants.
    pub async fn try_analyze(
        &self,
        info: &CandidateInfo,
        log: &[ActivityEvent],
        ml_score: Option<f64>,
    ) -> Result<CandidateResult> {
        let algorithm = self.rules.score(log);
        let llm = self.consensus.analyze(log).await;
        let ml = MlScore::from_option(ml_score);

        ensure!(
            algorithm.score.is_finite() && (0.0..100.0).contains(&algorithm.score),
            "rule-based score out of range: {}",
            algorithm.score
        );
        ensure!(llm.score <= 100, "LLM score out of range: {}", llm.score);

        let scores = ComponentScores::new(algorithm.score, llm.fusion_score(), ml.as_option());
        let fused = fuse(&scores);
        ensure!(
            (0.0..=100.0).contains(&fused.overall_score),
            "overall score out of range: {}",
            fused.overall_score
        );

        Ok(CandidateResult::assemble(info, fused, llm, algorithm, ml))
    }

    /// Like `try_analyze`, substituting the zero record on error.
    pub async fn analyze(
        &self,
        info: &CandidateInfo,
        log: &[ActivityEvent],
        ml_score: Option<f64>,
    ) -> CandidateResult {
        telemetry::ensure_described();
        match self.try_analyze(info, log, ml_score).await {
            Ok(r) => {
                counter!("candidates_processed_total").increment(1);
                gauge!("last_overall_score").set(r.overall_score);
                info!(
                    candidate = %info.id,
                    overall = r.overall_score,
                    status = %r.status,
                    "candidate analyzed"
                );
                r
            }
            Err(e) => {
                counter!("candidates_failed_total").increment(1);
                error!(candidate = %info.id, error = ?e, "analysis failed, using zero record");
                CandidateResult::failed(info, MlScore::from_option(ml_score))
            }
        }
    }
}

/// Run one candidate on its own task so even a panic only costs that candidate.
pub async fn analyze_isolated(
    analyzer: Arc<CandidateAnalyzer>,
    info: CandidateInfo,
    log: Vec<ActivityEvent>,
    ml_score: Option<f64>,
) -> CandidateResult {
    let fallback = info.clone();
    let task = tokio::spawn(async move { analyzer.analyze(&info, &log, ml_score).await });
    match task.await {
        Ok(r) => r,
        Err(e) => {
            counter!("candidates_failed_total").increment(1);
            error!(candidate = %fallback.id, error = %e, "analysis task aborted, using zero record");
            CandidateResult::failed(&fallback, MlScore::from_option(ml_score))
        }
    }
}

/// One unit of batch work.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub info: CandidateInfo,
    pub log: Vec<ActivityEvent>,
    pub ml_score: Option<f64>,
}

/// Process candidates in order, pausing `delay` between them. Every input yields
/// exactly one output record, in input order.
pub async fn run_batch(
    analyzer: Arc<CandidateAnalyzer>,
    items: Vec<BatchItem>,
    delay: Duration,
) -> Vec<CandidateResult> {
    let total = items.len();
    let mut out = Vec::with_capacity(total);
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let name = item.info.name.clone();
        let r = analyze_isolated(Arc::clone(&analyzer), item.info, item.log, item.ml_score).await;
        info!(candidate = %r.id, %name, n = i + 1, total, "processed candidate");
        out.push(r);
    }
    out
}
