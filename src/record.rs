//! Output shapes: per-pipeline payloads and the terminal `CandidateResult` that
//! gets persisted and served to the dashboard.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

use crate::fusion::{Fused, RiskTier};

/// Placeholder for a missing rule-based factor.
pub const NO_FACTOR: &str = "NA";
/// Factor text used on the whole-candidate failure path.
pub const FACTORS_UNAVAILABLE: &str = "No factors available";
/// Analysis text used when nothing better is known.
pub const NO_ANALYSIS: &str = "No analysis available";
/// Analysis returned when no judge produced a valid judgment.
pub const LLM_UNAVAILABLE: &str = "Error: Unable to analyze proctoring log with any LLM.";

pub const DEFAULT_CANDIDATE_NAME: &str = "Unknown Candidate";
pub const DEFAULT_EXAM_NAME: &str = "Unknown Exam";
pub const DEFAULT_EXAM_DATE: &str = "2025-03-09";

/// Candidate identifier; rosters use both numbers and strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CandidateId {
    Number(u64),
    Text(String),
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateId::Number(n) => write!(f, "{n}"),
            CandidateId::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for CandidateId {
    fn from(n: u64) -> Self {
        CandidateId::Number(n)
    }
}

impl From<&str> for CandidateId {
    fn from(s: &str) -> Self {
        CandidateId::Text(s.to_string())
    }
}

fn default_name() -> String {
    DEFAULT_CANDIDATE_NAME.to_string()
}
fn default_exam_name() -> String {
    DEFAULT_EXAM_NAME.to_string()
}
fn default_exam_date() -> String {
    DEFAULT_EXAM_DATE.to_string()
}

/// Roster entry (identity + exam metadata).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateInfo {
    pub id: CandidateId,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_exam_name")]
    pub exam_name: String,
    #[serde(default = "default_exam_date")]
    pub exam_date: String,
}

impl CandidateInfo {
    pub fn new(id: impl Into<CandidateId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            exam_name: default_exam_name(),
            exam_date: default_exam_date(),
        }
    }
}

/// Rule-based payload: score plus the three top contributing activities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmScore {
    pub score: f64,
    pub factor1: String,
    pub factor2: String,
    pub factor3: String,
}

impl AlgorithmScore {
    pub fn empty() -> Self {
        Self {
            score: 0.0,
            factor1: NO_FACTOR.to_string(),
            factor2: NO_FACTOR.to_string(),
            factor3: NO_FACTOR.to_string(),
        }
    }

    pub(crate) fn unavailable() -> Self {
        Self {
            score: 0.0,
            factor1: FACTORS_UNAVAILABLE.to_string(),
            factor2: FACTORS_UNAVAILABLE.to_string(),
            factor3: FACTORS_UNAVAILABLE.to_string(),
        }
    }

    pub fn factors(&self) -> [&str; 3] {
        [&self.factor1, &self.factor2, &self.factor3]
    }
}

/// Where the LLM consensus score came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmSource {
    /// The synthesis call reconciled the judgments.
    Synthesis,
    /// Synthesis failed; average score with the highest-scoring judge's analysis.
    JudgeFallback,
    /// No judge produced a valid judgment.
    Unavailable,
}

/// LLM consensus payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmVerdict {
    /// Written as an integer; read back from any number (or numeric string),
    /// rounded half-to-even into [0,100].
    #[serde(default, deserialize_with = "lenient_score")]
    pub score: u32,
    pub analysis: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<LlmSource>,
}

fn lenient_score<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    let raw = match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(raw
        .filter(|x| x.is_finite())
        .map(|x| x.round_ties_even().clamp(0.0, 100.0) as u32)
        .unwrap_or(0))
}

impl LlmVerdict {
    pub fn unavailable() -> Self {
        Self {
            score: 0,
            analysis: LLM_UNAVAILABLE.to_string(),
            source: Some(LlmSource::Unavailable),
        }
    }

    /// Consensus score for fusion; `None` when no judge answered.
    pub fn fusion_score(&self) -> Option<f64> {
        match self.source {
            Some(LlmSource::Unavailable) => None,
            _ => Some(f64::from(self.score)),
        }
    }
}

/// External ML payload. `0` means "no score".
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MlScore {
    pub score: f64,
}

impl MlScore {
    pub fn from_option(score: Option<f64>) -> Self {
        Self {
            score: score.filter(|s| s.is_finite()).unwrap_or(0.0),
        }
    }

    pub fn as_option(&self) -> Option<f64> {
        (self.score.is_finite() && self.score > 0.0).then_some(self.score)
    }
}

/// Terminal per-candidate record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub id: CandidateId,
    pub name: String,
    pub status: RiskTier,
    pub color: String,
    pub overall_score: f64,
    pub overall_analysis: String,
    pub exam_name: String,
    pub exam_date: String,
    pub ai_based_proctoring: LlmVerdict,
    pub algorithm_based_proctoring: AlgorithmScore,
    pub ml_based_proctoring: MlScore,
}

impl CandidateResult {
    pub fn assemble(
        info: &CandidateInfo,
        fused: Fused,
        llm: LlmVerdict,
        algorithm: AlgorithmScore,
        ml: MlScore,
    ) -> Self {
        Self {
            id: info.id.clone(),
            name: info.name.clone(),
            status: fused.status,
            color: fused.color.to_string(),
            overall_score: fused.overall_score,
            overall_analysis: llm.analysis.clone(),
            exam_name: info.exam_name.clone(),
            exam_date: info.exam_date.clone(),
            ai_based_proctoring: llm,
            algorithm_based_proctoring: algorithm,
            ml_based_proctoring: ml,
        }
    }

    /// Zero/"No Risk" record substituted when a candidate cannot be analyzed.
    /// The externally supplied ML score is still reported.
    pub fn failed(info: &CandidateInfo, ml: MlScore) -> Self {
        let llm = LlmVerdict {
            score: 0,
            analysis: NO_ANALYSIS.to_string(),
            source: None,
        };
        Self::assemble(info, Fused::zero(), llm, AlgorithmScore::unavailable(), ml)
    }
}
