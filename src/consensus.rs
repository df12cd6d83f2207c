//! Multi-judge consensus.
//!
//! Protocol:
//! 1. build one shared prompt pair from the log,
//! 2. fan out to every judge concurrently and wait for all of them,
//! 3. keep responses that parse as `{"score": number, "analysis": string}`,
//! 4. ask the synthesis judge to reconcile the survivors into one verdict,
//! 5. fall back to the average score + the highest-scoring judge's analysis when
//!    synthesis fails.
//!
//! Nothing in here returns an error: failed, timed-out or panicking calls become
//! absent judgments.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::future::join_all;
use futures::FutureExt;
use metrics::counter;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::activity::ActivityEvent;
use crate::llm::{strip_code_fence, DynJudge};
use crate::metrics as telemetry;
use crate::prompt::{
    format_activity_log, judge_user_prompt, synthesis_user_prompt, JUDGE_SYSTEM_PROMPT,
    SYNTHESIS_SYSTEM_PROMPT,
};
use crate::record::{LlmSource, LlmVerdict};

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);
const SYNTHESIS_NO_ANALYSIS: &str = "Unable to generate final analysis";

/// One judge's opinion.
#[derive(Debug, Clone, PartialEq)]
pub struct Judgment {
    /// In [0,100].
    pub score: f64,
    pub analysis: String,
}

/// Parse a judge response. Requires a JSON object with a finite numeric `score`
/// and a string `analysis`; the score is clamped into [0,100].
pub fn parse_judgment(text: &str) -> Option<Judgment> {
    let v: Value = serde_json::from_str(strip_code_fence(text)).ok()?;
    let obj = v.as_object()?;
    let score = obj.get("score")?.as_f64().filter(|s| s.is_finite())?;
    let analysis = obj.get("analysis")?.as_str()?.to_string();
    Some(Judgment {
        score: score.clamp(0.0, 100.0),
        analysis,
    })
}

/// Mean score rounded half-to-even.
pub fn average_score(judgments: &[Judgment]) -> Option<u32> {
    if judgments.is_empty() {
        return None;
    }
    let mean = judgments.iter().map(|j| j.score).sum::<f64>() / judgments.len() as f64;
    Some(to_score(mean))
}

fn to_score(x: f64) -> u32 {
    x.round_ties_even().clamp(0.0, 100.0) as u32
}

pub struct ConsensusSynthesizer {
    judges: Vec<DynJudge>,
    synthesizer: DynJudge,
    synthesis_model: Option<String>,
    call_timeout: Duration,
}

impl ConsensusSynthesizer {
    pub fn new(judges: Vec<DynJudge>, synthesizer: DynJudge) -> Self {
        Self {
            judges,
            synthesizer,
            synthesis_model: None,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_synthesis_model(mut self, model: Option<String>) -> Self {
        self.synthesis_model = model;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn judge_names(&self) -> Vec<String> {
        self.judges.iter().map(|j| j.name().to_string()).collect()
    }

    /// Full protocol for one activity log.
    pub async fn analyze(&self, log: &[ActivityEvent]) -> LlmVerdict {
        let formatted = format_activity_log(log);
        let user_prompt = judge_user_prompt(&formatted);
        debug!(
            events = log.len(),
            prompt_len = user_prompt.len(),
            judges = self.judges.len(),
            "dispatching judges"
        );

        let judgments = self.collect_judgments(&user_prompt).await;
        self.synthesize(&judgments).await
    }

    /// Fan out to every judge, wait for all, keep valid judgments in judge order.
    pub async fn collect_judgments(&self, user_prompt: &str) -> Vec<Judgment> {
        telemetry::ensure_described();

        let calls = self.judges.iter().map(|judge| async move {
            counter!("judge_calls_total", "judge" => judge.name().to_string()).increment(1);
            let outcome = tokio::time::timeout(
                self.call_timeout,
                AssertUnwindSafe(judge.complete(JUDGE_SYSTEM_PROMPT, user_prompt, None))
                    .catch_unwind(),
            )
            .await;

            let parsed = match outcome {
                Ok(Ok(Ok(text))) => {
                    let j = parse_judgment(&text);
                    if j.is_none() {
                        warn!(judge = judge.name(), len = text.len(), "malformed judge response");
                    }
                    j
                }
                Ok(Ok(Err(e))) => {
                    warn!(judge = judge.name(), error = ?e, "judge call failed");
                    None
                }
                Ok(Err(_)) => {
                    warn!(judge = judge.name(), "judge call panicked");
                    None
                }
                Err(_) => {
                    warn!(
                        judge = judge.name(),
                        timeout_ms = self.call_timeout.as_millis() as u64,
                        "judge call timed out"
                    );
                    None
                }
            };
            if parsed.is_none() {
                counter!("judge_failures_total", "judge" => judge.name().to_string())
                    .increment(1);
            }
            parsed
        });

        join_all(calls).await.into_iter().flatten().collect()
    }

    /// Reconcile judgments into one verdict. Never fails.
    pub async fn synthesize(&self, judgments: &[Judgment]) -> LlmVerdict {
        let Some(avg_score) = average_score(judgments) else {
            warn!("no valid judgments, LLM score unavailable");
            return LlmVerdict::unavailable();
        };

        let user_prompt = synthesis_user_prompt(judgments);
        let synth = self.synthesizer.name();
        counter!("judge_calls_total", "judge" => synth.to_string()).increment(1);
        let outcome = tokio::time::timeout(
            self.call_timeout,
            AssertUnwindSafe(self.synthesizer.complete(
                SYNTHESIS_SYSTEM_PROMPT,
                &user_prompt,
                self.synthesis_model.as_deref(),
            ))
            .catch_unwind(),
        )
        .await;

        let synthesized = match outcome {
            Ok(Ok(Ok(text))) => parse_synthesis(&text, avg_score),
            Ok(Ok(Err(e))) => {
                warn!(judge = synth, error = ?e, "synthesis call failed");
                None
            }
            Ok(Err(_)) => {
                warn!(judge = synth, "synthesis call panicked");
                None
            }
            Err(_) => {
                warn!(judge = synth, "synthesis call timed out");
                None
            }
        };
        if synthesized.is_none() {
            counter!("judge_failures_total", "judge" => synth.to_string()).increment(1);
        }

        match synthesized {
            Some(v) => {
                info!(score = v.score, judgments = judgments.len(), "consensus synthesized");
                v
            }
            None => {
                counter!("synthesis_fallback_total").increment(1);
                fallback_verdict(judgments, avg_score)
            }
        }
    }
}

/// Synthesis output: a JSON object; missing/non-numeric score → `avg_score`.
fn parse_synthesis(text: &str, avg_score: u32) -> Option<LlmVerdict> {
    let v: Value = match serde_json::from_str(strip_code_fence(text)) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "synthesis response is not JSON");
            return None;
        }
    };
    let obj = v.as_object()?;
    let score = obj
        .get("score")
        .and_then(Value::as_f64)
        .filter(|s| s.is_finite())
        .map(to_score)
        .unwrap_or(avg_score);
    let analysis = obj
        .get("analysis")
        .and_then(Value::as_str)
        .unwrap_or(SYNTHESIS_NO_ANALYSIS)
        .to_string();
    Some(LlmVerdict {
        score,
        analysis,
        source: Some(LlmSource::Synthesis),
    })
}

/// Highest-scoring judgment's analysis (first one on ties) with the average score.
fn fallback_verdict(judgments: &[Judgment], avg_score: u32) -> LlmVerdict {
    let mut top: Option<&Judgment> = None;
    for j in judgments {
        if top.map_or(true, |t| j.score > t.score) {
            top = Some(j);
        }
    }
    LlmVerdict {
        score: avg_score,
        analysis: top.map(|j| j.analysis.clone()).unwrap_or_default(),
        source: Some(LlmSource::JudgeFallback),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn j(score: f64, analysis: &str) -> Judgment {
        Judgment {
            score,
            analysis: analysis.to_string(),
        }
    }

    #[test]
    fn parse_requires_both_fields() {
        assert_eq!(
            parse_judgment(r#"{"score": 40, "analysis": "ok"}"#),
            Some(j(40.0, "ok"))
        );
        assert_eq!(parse_judgment(r#"{"score": 40}"#), None);
        assert_eq!(parse_judgment(r#"{"analysis": "ok"}"#), None);
        assert_eq!(parse_judgment(r#"{"score": "40", "analysis": "ok"}"#), None);
        assert_eq!(parse_judgment(r#"[40, "ok"]"#), None);
        assert_eq!(parse_judgment("I think 40"), None);
    }

    #[test]
    fn parse_clamps_and_strips_fences() {
        let p = parse_judgment("```json\n{\"score\": 140, \"analysis\": \"x\"}\n```").unwrap();
        assert_eq!(p.score, 100.0);
    }

    #[test]
    fn average_rounds_half_to_even() {
        assert_eq!(average_score(&[]), None);
        assert_eq!(average_score(&[j(70.0, ""), j(75.0, "")]), Some(72));
        assert_eq!(average_score(&[j(70.0, ""), j(77.0, "")]), Some(74));
        assert_eq!(average_score(&[j(10.0, ""), j(20.0, ""), j(31.0, "")]), Some(20));
    }

    #[test]
    fn synthesis_parsing_defaults() {
        let v = parse_synthesis(r#"{"analysis": "merged"}"#, 61).unwrap();
        assert_eq!(v.score, 61);
        assert_eq!(v.analysis, "merged");
        let v = parse_synthesis(r#"{"score": 88.4}"#, 61).unwrap();
        assert_eq!(v.score, 88);
        assert_eq!(v.analysis, SYNTHESIS_NO_ANALYSIS);
        assert!(parse_synthesis("nope", 61).is_none());
        assert!(parse_synthesis("42", 61).is_none());
    }

    #[test]
    fn fallback_picks_first_highest() {
        let js = [j(30.0, "low"), j(80.0, "first high"), j(80.0, "second high")];
        let v = fallback_verdict(&js, 63);
        assert_eq!(v.score, 63);
        assert_eq!(v.analysis, "first high");
        assert_eq!(v.source, Some(LlmSource::JudgeFallback));
    }
}
