//! Deterministic rule-based scorer.
//!
//! Each event contributes `weight(description) × count × time_multiplier`, where the
//! multiplier is raised for events inside the opening window of the session. The
//! summed `raw_total` is squashed through `100·x / (x + scale)` so the score never
//! reaches 100 however much activity piles up.

use std::collections::HashMap;

use crate::activity::ActivityEvent;
use crate::record::{AlgorithmScore, NO_FACTOR};
use crate::weights::ActivityWeightTable;

pub const DEFAULT_SCALE: f64 = 70.0;
pub const DEFAULT_EARLY_WINDOW_SECS: u32 = 300;
pub const DEFAULT_EARLY_MULTIPLIER: f64 = 1.5;

/// Highest reportable score once rounded to one decimal.
const MAX_REPORTED_SCORE: f64 = 99.9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleParams {
    /// Half-saturation point of the hyperbolic transform.
    pub scale: f64,
    /// Events strictly before this offset get `early_multiplier`.
    pub early_window_secs: u32,
    pub early_multiplier: f64,
}

impl Default for RuleParams {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
            early_window_secs: DEFAULT_EARLY_WINDOW_SECS,
            early_multiplier: DEFAULT_EARLY_MULTIPLIER,
        }
    }
}

impl RuleParams {
    /// Replace unusable values with defaults.
    pub fn sanitized(mut self) -> Self {
        if !(self.scale.is_finite() && self.scale > 0.0) {
            self.scale = DEFAULT_SCALE;
        }
        if !(self.early_multiplier.is_finite() && self.early_multiplier > 0.0) {
            self.early_multiplier = DEFAULT_EARLY_MULTIPLIER;
        }
        self
    }
}

/// One event's share of the raw total.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedContribution {
    pub description: String,
    pub contribution: f64,
}

/// Full scorer output; `score` is the persisted payload, the rest is diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleReport {
    pub score: AlgorithmScore,
    pub raw_total: f64,
    /// Mean gap between (forward-filled, sorted) event times, in minutes.
    /// `None` for fewer than two events. Informational only.
    pub avg_interval_minutes: Option<f64>,
    pub contributions: Vec<WeightedContribution>,
    /// Per-description totals for non-zero weights, highest first.
    pub breakdown: Vec<(String, f64)>,
}

#[derive(Debug, Clone, Default)]
pub struct RuleScorer {
    table: ActivityWeightTable,
    params: RuleParams,
}

impl RuleScorer {
    pub fn new(table: ActivityWeightTable, params: RuleParams) -> Self {
        Self {
            table,
            params: params.sanitized(),
        }
    }

    pub fn params(&self) -> RuleParams {
        self.params
    }

    pub fn table(&self) -> &ActivityWeightTable {
        &self.table
    }

    /// Score a log; see `analyze` for diagnostics.
    pub fn score(&self, events: &[ActivityEvent]) -> AlgorithmScore {
        self.analyze(events).score
    }

    pub fn analyze(&self, events: &[ActivityEvent]) -> RuleReport {
        if events.is_empty() {
            return RuleReport {
                score: AlgorithmScore::empty(),
                raw_total: 0.0,
                avg_interval_minutes: None,
                contributions: Vec::new(),
                breakdown: Vec::new(),
            };
        }

        let times = forward_filled_seconds(events);

        let mut raw_total = 0.0;
        let mut contributions = Vec::with_capacity(events.len());
        // Insertion-ordered so ties keep first-seen order after the stable sort.
        let mut breakdown: Vec<(String, f64)> = Vec::new();
        let mut slot: HashMap<String, usize> = HashMap::new();

        for (ev, &t) in events.iter().zip(times.iter()) {
            let description = ev.description.trim();
            let weight = self.table.weight_for(description);
            let contribution = weight * f64::from(ev.count) * self.time_multiplier(t);
            raw_total += contribution;

            if weight > 0.0 {
                match slot.get(description) {
                    Some(&i) => breakdown[i].1 += contribution,
                    None => {
                        slot.insert(description.to_string(), breakdown.len());
                        breakdown.push((description.to_string(), contribution));
                    }
                }
            }
            contributions.push(WeightedContribution {
                description: description.to_string(),
                contribution,
            });
        }

        breakdown.sort_by(|a, b| b.1.total_cmp(&a.1));

        let mut factors = breakdown
            .iter()
            .take(3)
            .map(|(d, v)| format!("{d}:{}", format_contribution(*v)));
        let factor1 = factors.next().unwrap_or_else(|| NO_FACTOR.to_string());
        let factor2 = factors.next().unwrap_or_else(|| NO_FACTOR.to_string());
        let factor3 = factors.next().unwrap_or_else(|| NO_FACTOR.to_string());

        RuleReport {
            score: AlgorithmScore {
                score: self.bounded_score(raw_total),
                factor1,
                factor2,
                factor3,
            },
            raw_total,
            avg_interval_minutes: average_gap_minutes(&times),
            contributions,
            breakdown,
        }
    }

    fn time_multiplier(&self, seconds: u32) -> f64 {
        if seconds < self.params.early_window_secs {
            self.params.early_multiplier
        } else {
            1.0
        }
    }

    /// `100·raw/(raw+scale)`, one decimal, strictly below 100.
    fn bounded_score(&self, raw_total: f64) -> f64 {
        if raw_total <= 0.0 {
            return 0.0;
        }
        let s = 100.0 * raw_total / (raw_total + self.params.scale);
        ((s * 10.0).round() / 10.0).min(MAX_REPORTED_SCORE)
    }
}

/// Event times in seconds; unknown ones take the last known time (0 before any).
pub fn forward_filled_seconds(events: &[ActivityEvent]) -> Vec<u32> {
    let mut last_valid = 0;
    events
        .iter()
        .map(|ev| match ev.seconds() {
            Some(t) => {
                last_valid = t;
                t
            }
            None => last_valid,
        })
        .collect()
}

fn average_gap_minutes(times: &[u32]) -> Option<f64> {
    if times.len() < 2 {
        return None;
    }
    let mut sorted = times.to_vec();
    sorted.sort_unstable();
    let total: u64 = sorted.windows(2).map(|w| u64::from(w[1] - w[0])).sum();
    Some(total as f64 / (sorted.len() - 1) as f64 / 60.0)
}

fn format_contribution(v: f64) -> String {
    if (v * 10.0).fract() == 0.0 {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}
