//! Score fusion: conditional weighted average of the three component scores and
//! the single risk-tier table used everywhere a status or color is derived.
//!
//! Pure logic, no I/O.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Weights when a usable ML score is present.
pub const W3_ALGORITHM: f64 = 0.30;
pub const W3_LLM: f64 = 0.45;
pub const W3_ML: f64 = 0.25;

/// Weights when the ML score is absent or exactly zero.
pub const W2_ALGORITHM: f64 = 0.40;
pub const W2_LLM: f64 = 0.60;

/// Lower bounds (inclusive) of the tiers above `NoRisk`.
pub const HIGH_RISK_MIN: f64 = 80.0;
pub const MEDIUM_RISK_MIN: f64 = 70.0;
pub const LOW_RISK_MIN: f64 = 35.0;

/// Four ordered risk tiers. Ordering follows severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskTier {
    #[serde(rename = "No Risk")]
    NoRisk,
    #[serde(rename = "Low Risk")]
    LowRisk,
    #[serde(rename = "Medium Risk")]
    MediumRisk,
    #[serde(rename = "High Risk")]
    HighRisk,
}

impl RiskTier {
    pub const ALL: [RiskTier; 4] = [
        RiskTier::NoRisk,
        RiskTier::LowRisk,
        RiskTier::MediumRisk,
        RiskTier::HighRisk,
    ];

    /// Classify a score. Non-finite input is treated as 0.
    pub fn from_score(score: f64) -> Self {
        let s = if score.is_finite() { score } else { 0.0 };
        if s >= HIGH_RISK_MIN {
            RiskTier::HighRisk
        } else if s >= MEDIUM_RISK_MIN {
            RiskTier::MediumRisk
        } else if s >= LOW_RISK_MIN {
            RiskTier::LowRisk
        } else {
            RiskTier::NoRisk
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RiskTier::NoRisk => "No Risk",
            RiskTier::LowRisk => "Low Risk",
            RiskTier::MediumRisk => "Medium Risk",
            RiskTier::HighRisk => "High Risk",
        }
    }

    /// Display color (hex) for dashboards.
    pub fn color(self) -> &'static str {
        match self {
            RiskTier::HighRisk => "#D32F2F",
            RiskTier::MediumRisk => "#F57C00",
            RiskTier::LowRisk => "#FBC02D",
            RiskTier::NoRisk => "#388E3C",
        }
    }

    /// Case-insensitive parse of a tier label ("high risk", "High Risk", "high").
    pub fn parse(s: &str) -> Option<Self> {
        let norm = s.trim().to_ascii_lowercase();
        let norm = norm.strip_suffix(" risk").unwrap_or(&norm);
        match norm {
            "no" => Some(RiskTier::NoRisk),
            "low" => Some(RiskTier::LowRisk),
            "medium" => Some(RiskTier::MediumRisk),
            "high" => Some(RiskTier::HighRisk),
            _ => None,
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Display color for any score, using the same table as `RiskTier::from_score`.
pub fn score_color(score: f64) -> &'static str {
    RiskTier::from_score(score).color()
}

/// The three per-pipeline scores. Field names carry provenance; `None` means the
/// pipeline produced nothing usable for this candidate.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ComponentScores {
    /// Rule-based scorer, always defined.
    pub algorithm: f64,
    /// LLM consensus; `None` when every judge failed.
    pub llm: Option<f64>,
    /// External ML model; `None` (or `Some(0.0)`) when unavailable.
    pub ml: Option<f64>,
}

impl ComponentScores {
    pub fn new(algorithm: f64, llm: Option<f64>, ml: Option<f64>) -> Self {
        Self { algorithm, llm, ml }
    }

    /// ML counts only when strictly positive.
    pub fn ml_present(&self) -> bool {
        self.ml.is_some_and(|m| m.is_finite() && m > 0.0)
    }
}

/// Final verdict for one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Fused {
    pub overall_score: f64,
    pub status: RiskTier,
    pub color: &'static str,
}

impl Fused {
    pub fn zero() -> Self {
        Self::from_score(0.0)
    }

    pub fn from_score(score: f64) -> Self {
        let status = RiskTier::from_score(score);
        Self {
            overall_score: score,
            status,
            color: status.color(),
        }
    }
}

/// Combine the component scores.
///
/// With a positive ML score: `0.30·algorithm + 0.45·llm + 0.25·ml`; otherwise the
/// ML weight is redistributed: `0.40·algorithm + 0.60·llm`. A missing LLM score
/// counts as 0. Inputs are clamped to [0,100], the result is rounded to 2 decimals.
pub fn fuse(scores: &ComponentScores) -> Fused {
    let algorithm = clamp_score(scores.algorithm);
    let llm = clamp_score(scores.llm.unwrap_or(0.0));

    let raw = if scores.ml_present() {
        let ml = clamp_score(scores.ml.unwrap_or(0.0));
        W3_ALGORITHM * algorithm + W3_LLM * llm + W3_ML * ml
    } else {
        W2_ALGORITHM * algorithm + W2_LLM * llm
    };

    Fused::from_score(round2(raw).clamp(0.0, 100.0))
}

pub(crate) fn clamp_score(x: f64) -> f64 {
    if x.is_finite() {
        x.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

#[inline]
pub(crate) fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
