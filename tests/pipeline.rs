// tests/pipeline.rs
//
// End-to-end candidate processing with in-process judges:
// fused record shape, ML weighting, failure isolation and batch ordering.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use proctor_risk_fusion::activity::ActivityEvent;
use proctor_risk_fusion::consensus::ConsensusSynthesizer;
use proctor_risk_fusion::fusion::RiskTier;
use proctor_risk_fusion::llm::{DisabledJudge, DynJudge, LlmJudge, MockJudge};
use proctor_risk_fusion::pipeline::{analyze_isolated, run_batch, BatchItem, CandidateAnalyzer};
use proctor_risk_fusion::record::{CandidateInfo, LlmSource, FACTORS_UNAVAILABLE, LLM_UNAVAILABLE};
use proctor_risk_fusion::rules::RuleScorer;

/// Panics inside the call itself.
struct Panicking;

#[async_trait]
impl LlmJudge for Panicking {
    async fn complete(&self, _: &str, _: &str, _: Option<&str>) -> Result<String> {
        panic!("backend exploded");
    }

    fn name(&self) -> &str {
        "panicking"
    }
}

/// Panics before any call is made (while labelling metrics), which no
/// per-call guard can catch.
struct Unnamed;

#[async_trait]
impl LlmJudge for Unnamed {
    async fn complete(&self, _: &str, _: &str, _: Option<&str>) -> Result<String> {
        Ok(r#"{"score": 10, "analysis": "never used"}"#.to_string())
    }

    fn name(&self) -> &str {
        panic!("name lookup exploded");
    }
}

fn analyzer_with(judges: Vec<DynJudge>, synth: DynJudge) -> Arc<CandidateAnalyzer> {
    Arc::new(CandidateAnalyzer::new(
        RuleScorer::default(),
        ConsensusSynthesizer::new(judges, synth),
    ))
}

fn mock_analyzer() -> Arc<CandidateAnalyzer> {
    analyzer_with(
        vec![
            Arc::new(MockJudge::new("a", r#"{"score": 60, "analysis": "a"}"#)),
            Arc::new(MockJudge::new("b", r#"{"score": 70, "analysis": "b"}"#)),
        ],
        Arc::new(MockJudge::new("s", r#"{"score": 64, "analysis": "merged"}"#)),
    )
}

fn paste_log() -> Vec<ActivityEvent> {
    vec![ActivityEvent::new("Paste", "00:10:00", 1)]
}

#[tokio::test]
async fn fused_record_without_ml() {
    let info = CandidateInfo::new(1u64, "Ana");
    let r = mock_analyzer().analyze(&info, &paste_log(), None).await;

    assert_eq!(r.algorithm_based_proctoring.score, 12.5);
    assert_eq!(r.ai_based_proctoring.score, 64);
    assert_eq!(r.ai_based_proctoring.source, Some(LlmSource::Synthesis));
    // 0.4*12.5 + 0.6*64
    assert!((r.overall_score - 43.4).abs() < 1e-9);
    assert_eq!(r.status, RiskTier::LowRisk);
    assert_eq!(r.color, "#FBC02D");
    assert_eq!(r.overall_analysis, "merged");
    assert_eq!(r.ml_based_proctoring.score, 0.0);
    assert_eq!(r.exam_name, "Unknown Exam");
}

#[tokio::test]
async fn fused_record_with_ml() {
    let info = CandidateInfo::new(2u64, "Bo");
    let r = mock_analyzer().analyze(&info, &paste_log(), Some(80.0)).await;
    // 0.3*12.5 + 0.45*64 + 0.25*80
    assert!((r.overall_score - 52.55).abs() < 1e-9);
    assert_eq!(r.ml_based_proctoring.score, 80.0);
}

#[tokio::test]
async fn all_judges_down_still_produces_a_record() {
    let a = analyzer_with(
        vec![Arc::new(DisabledJudge::new("google"))],
        Arc::new(DisabledJudge::new("google")),
    );
    let info = CandidateInfo::new(3u64, "Cy");
    let r = a.analyze(&info, &paste_log(), None).await;
    assert_eq!(r.ai_based_proctoring.score, 0);
    assert_eq!(r.ai_based_proctoring.analysis, LLM_UNAVAILABLE);
    // only the rule-based share remains
    assert!((r.overall_score - 5.0).abs() < 1e-9);
    assert_eq!(r.status, RiskTier::NoRisk);
}

#[tokio::test]
async fn panicking_judge_only_loses_its_own_judgment() {
    let a = analyzer_with(
        vec![
            Arc::new(Panicking) as DynJudge,
            Arc::new(MockJudge::new("ok", r#"{"score": 90, "analysis": "tabs"}"#)) as DynJudge,
        ],
        Arc::new(Panicking),
    );
    let info = CandidateInfo::new(6u64, "Eve");
    let r = analyze_isolated(a, info, paste_log(), None).await;

    // synthesis panicked too → average of the surviving judgment
    assert_eq!(r.ai_based_proctoring.score, 90);
    assert_eq!(r.ai_based_proctoring.analysis, "tabs");
    assert_eq!(r.ai_based_proctoring.source, Some(LlmSource::JudgeFallback));
    // 0.4*12.5 + 0.6*90
    assert!((r.overall_score - 59.0).abs() < 1e-9);
    assert_eq!(r.status, RiskTier::LowRisk);
}

#[tokio::test]
async fn task_panic_yields_zero_record_with_ml_kept() {
    let a = analyzer_with(
        vec![Arc::new(Unnamed)],
        Arc::new(MockJudge::new("s", r#"{"score": 1, "analysis": "x"}"#)),
    );
    let info = CandidateInfo::new("c-9", "Dee");
    let r = analyze_isolated(a, info, paste_log(), Some(55.0)).await;

    assert_eq!(r.overall_score, 0.0);
    assert_eq!(r.status, RiskTier::NoRisk);
    assert_eq!(r.color, "#388E3C");
    assert_eq!(r.algorithm_based_proctoring.factor1, FACTORS_UNAVAILABLE);
    assert_eq!(r.ml_based_proctoring.score, 55.0);
    assert_eq!(r.id.to_string(), "c-9");
}

#[tokio::test(start_paused = true)]
async fn batch_keeps_input_order_and_one_record_each() {
    let items: Vec<BatchItem> = (1..=4u64)
        .map(|i| BatchItem {
            info: CandidateInfo::new(i, format!("cand {i}")),
            log: if i % 2 == 0 { paste_log() } else { Vec::new() },
            ml_score: (i == 3).then_some(30.0),
        })
        .collect();

    let started = tokio::time::Instant::now();
    let out = run_batch(mock_analyzer(), items, Duration::from_secs(60)).await;

    assert_eq!(out.len(), 4);
    let ids: Vec<String> = out.iter().map(|r| r.id.to_string()).collect();
    assert_eq!(ids, ["1", "2", "3", "4"]);
    assert_eq!(out[0].algorithm_based_proctoring.factor1, "NA");
    assert_eq!(out[1].algorithm_based_proctoring.score, 12.5);
    assert_eq!(out[2].ml_based_proctoring.score, 30.0);
    // three pauses between four candidates
    assert!(started.elapsed() >= Duration::from_secs(180));
    assert!(started.elapsed() < Duration::from_secs(240));
}

#[tokio::test]
async fn batch_survives_a_failing_candidate() {
    let bad = analyzer_with(vec![Arc::new(Unnamed)], Arc::new(DisabledJudge::new("s")));
    let items = vec![
        BatchItem {
            info: CandidateInfo::new(1u64, "x"),
            log: paste_log(),
            ml_score: None,
        },
        BatchItem {
            info: CandidateInfo::new(2u64, "y"),
            log: Vec::new(),
            ml_score: None,
        },
    ];
    let out = run_batch(bad, items, Duration::ZERO).await;
    assert_eq!(out.len(), 2);
    assert!(out.iter().all(|r| r.overall_score == 0.0));
}
