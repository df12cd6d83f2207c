//! Log statistics and prompt rendering for the LLM judges.
//!
//! Everything here is pure: no network, no I/O.

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::activity::ActivityEvent;
use crate::consensus::Judgment;

/// Rubric shared by every judge.
pub const JUDGE_SYSTEM_PROMPT: &str = r#"
You are an expert online exam proctor analyzing activity logs to determine if a student is cheating.

The logs contain timestamps and activities detected during an online exam. Your task is to analyze this data and determine the probability of cheating on a scale from 0-100.

Activity Classification and Significance:

HIGH SUSPICION Activities:
- Browser window swapped
- Cell phone detected
- Copy/Cut/Paste actions
- Tab change detected
- Window change detected
- Laptop detected (secondary device)
- No face detected

NORMAL Behavioral Activities (Low Suspicion):
- Candidate looking right (MOST COMMON, NORMAL)
- Candidate looking down (normal for typing/writing)
- Candidate looking up (occasional thinking)
- Window focus changed (if isolated incidents)

Important Human Behavioral Context:
1. Looking Patterns:
   - Right-looking is NORMAL: most people are right-handed, it is the natural writing/typing position, note-taking, normal cognitive processing.
   - Down-looking is NORMAL for typing, writing notes and reading questions.
   - Up-looking is NORMAL for thinking/recall, mental calculations and problem-solving.

2. Time-Based Context:
   First 5 minutes (300 seconds): higher activity is normal due to setup and adjustment, initial nervousness and system familiarization.
   Last 5 minutes (300 seconds): increased activity is expected for the submission process, final review and time pressure.

Suspicious Patterns to Focus On:
1. Multiple HIGH SUSPICION activities outside first/last 5 minutes
2. Clusters of window/browser changes
3. Copy/Paste actions combined with window changes
4. Cell phone or second device detection
5. Extended periods of no face detection

Normal Patterns to Ignore:
1. Regular right/down looking patterns
2. Isolated window focus changes
3. Brief up-looking for thinking
4. Activity spikes in first/last 5 minutes
5. Scattered, non-clustered looking patterns

Your response must be a valid JSON with:
- "score": Integer from 0-100 (0=definitely not cheating, 100=definitely cheating)
- "analysis": Brief explanation of your reasoning (5-10 sentences)

Scoring Guidelines:
- Start from a baseline of 0
- Add points for HIGH SUSPICION activities (especially in clusters), combined suspicious patterns and systematic switching behavior.
- Ignore or minimize normal looking patterns, first/last 5-minute activities, isolated window focus changes and natural eye movements.

Focus on identifying patterns that clearly deviate from normal test-taking behavior while accounting for natural human behaviors and time-based contexts.
"#;

/// System prompt for the meta-analysis call.
pub const SYNTHESIS_SYSTEM_PROMPT: &str = r#"
You are a meta-analyzer of AI proctoring assessments. Your task is to synthesize multiple AI analyses
into a single coherent and accurate assessment. Focus on identifying the most reliable signals of
potential cheating across all models while eliminating false positives.

Return only a valid JSON with an "analysis" field (1-2 sentences) and a "score" field (integer 0-100).
"#;

/// An event with its parsed offset (`None` when the timestamp is unusable).
#[derive(Debug, Clone, PartialEq)]
pub struct TimedEvent {
    pub timestamp: String,
    pub seconds: Option<u32>,
    pub description: String,
    pub count: u32,
}

/// Derived view of a log used to build the judge prompt.
#[derive(Debug, Clone)]
pub struct FormattedLog<'a> {
    pub raw_log: &'a [ActivityEvent],
    pub events: Vec<TimedEvent>,
    /// Gaps between consecutive events (log order) where both times are known.
    /// Negative when the log is out of order.
    pub intervals: Vec<i64>,
    /// Summed `count` per description, in first-seen order.
    pub activity_counts: Vec<(String, u64)>,
}

impl FormattedLog<'_> {
    pub fn total_events(&self) -> u64 {
        self.activity_counts.iter().map(|(_, c)| c).sum()
    }

    /// Mean of `intervals`, `0.0` when there are none.
    pub fn average_interval(&self) -> f64 {
        if self.intervals.is_empty() {
            0.0
        } else {
            self.intervals.iter().sum::<i64>() as f64 / self.intervals.len() as f64
        }
    }
}

pub fn format_activity_log(log: &[ActivityEvent]) -> FormattedLog<'_> {
    let events: Vec<TimedEvent> = log
        .iter()
        .map(|e| TimedEvent {
            timestamp: e.timestamp.clone(),
            seconds: e.seconds(),
            description: e.description.clone(),
            count: e.count,
        })
        .collect();

    let intervals = events
        .windows(2)
        .filter_map(|w| match (w[0].seconds, w[1].seconds) {
            (Some(a), Some(b)) => Some(i64::from(b) - i64::from(a)),
            _ => None,
        })
        .collect();

    let mut activity_counts: Vec<(String, u64)> = Vec::new();
    let mut slot: HashMap<&str, usize> = HashMap::new();
    for e in log {
        match slot.get(e.description.as_str()) {
            Some(&i) => activity_counts[i].1 += u64::from(e.count),
            None => {
                slot.insert(e.description.as_str(), activity_counts.len());
                activity_counts.push((e.description.clone(), u64::from(e.count)));
            }
        }
    }

    FormattedLog {
        raw_log: log,
        events,
        intervals,
        activity_counts,
    }
}

/// User prompt for the judges: raw log (pretty JSON) plus derived statistics.
pub fn judge_user_prompt(formatted: &FormattedLog<'_>) -> String {
    let raw_log =
        serde_json::to_string_pretty(formatted.raw_log).unwrap_or_else(|_| "[]".to_string());

    let counts = formatted
        .activity_counts
        .iter()
        .map(|(d, c)| format!("{d:?}: {c}"))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"
Please analyze this proctoring activity log to detect potential cheating:

{raw_log}

Statistics:
- Total events: {total}
- Activity counts: {{{counts}}}
- Time intervals between events (seconds): {intervals:?}
- Average interval: {avg:.1} seconds

Based on the log content and these statistics, determine the likelihood of cheating.
Consider the number, timing, and patterns of window changes and focus changes, paying particular attention to activity *outside* the first 300 seconds (5 minutes) and the last 300 seconds of the exam.
Remember that "looking right" is generally normal behavior and should only be considered suspicious if combined with other indicators.
Return your analysis in the required JSON format with 'score' and 'analysis' fields.
"#,
        total = formatted.total_events(),
        intervals = formatted.intervals,
        avg = formatted.average_interval(),
    )
}

/// User prompt for the synthesis call. Judgments are labelled by position.
pub fn synthesis_user_prompt(judgments: &[Judgment]) -> String {
    let mut analyses = String::new();
    for (i, j) in judgments.iter().enumerate() {
        if i > 0 {
            analyses.push('\n');
        }
        let _ = write!(
            analyses,
            "Model {}: Score = {}, Analysis = \"{}\"",
            i + 1,
            format_score(j.score),
            j.analysis
        );
    }
    let distribution = judgments
        .iter()
        .map(|j| format_score(j.score))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"
Review these analyses of an exam proctoring activity log from multiple AI models:

{analyses}

Your task is to synthesize these analyses into a single definitive assessment.
Consider:
1. Common patterns identified across multiple models
2. Any unique insights from individual models
3. The overall consensus on suspicious activity
4. The distribution of scores ([{distribution}])
5. The temporal patterns in the raw log

Return ONLY a JSON object with:
1. "analysis": A brief (2-3 sentences) final analysis that captures the most important insights
2. "score": A refined final score from 0-100
"#
    )
}

fn format_score(s: f64) -> String {
    if s.fract() == 0.0 {
        format!("{s:.0}")
    } else {
        format!("{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log() -> Vec<ActivityEvent> {
        vec![
            ActivityEvent::new("Tab change detected", "00:01:00", 2),
            ActivityEvent::new("Candidate looking right", "NaN:NaN:NaN", 1),
            ActivityEvent::new("Tab change detected", "00:02:30", 1),
            ActivityEvent::new("Copy", "00:02:00", 1),
        ]
    }

    #[test]
    fn statistics_skip_unknown_times_for_intervals_only() {
        let l = log();
        let f = format_activity_log(&l);
        assert_eq!(f.events[1].seconds, None);
        // (0→1) and (1→2) involve the unknown time; only (2→3) survives
        assert_eq!(f.intervals, vec![-30]);
        assert_eq!(
            f.activity_counts,
            vec![
                ("Tab change detected".to_string(), 3),
                ("Candidate looking right".to_string(), 1),
                ("Copy".to_string(), 1),
            ]
        );
        assert_eq!(f.total_events(), 5);
        assert_eq!(f.average_interval(), -30.0);
    }

    #[test]
    fn empty_log_statistics() {
        let f = format_activity_log(&[]);
        assert!(f.intervals.is_empty());
        assert_eq!(f.total_events(), 0);
        assert_eq!(f.average_interval(), 0.0);
        let p = judge_user_prompt(&f);
        assert!(p.contains("- Total events: 0"));
        assert!(p.contains("- Average interval: 0.0 seconds"));
    }

    #[test]
    fn judge_prompt_embeds_log_and_stats() {
        let l = log();
        let p = judge_user_prompt(&format_activity_log(&l));
        assert!(p.contains("\"activityDescription\": \"Copy\""));
        assert!(p.contains("\"timeStampInVideo\": \"NaN:NaN:NaN\""));
        assert!(p.contains("- Activity counts: {\"Tab change detected\": 3, "));
        assert!(p.contains("- Time intervals between events (seconds): [-30]"));
    }

    #[test]
    fn synthesis_prompt_labels_models_by_position() {
        let js = vec![
            Judgment {
                score: 40.0,
                analysis: "mild".into(),
            },
            Judgment {
                score: 72.5,
                analysis: "clustered tab switches".into(),
            },
        ];
        let p = synthesis_user_prompt(&js);
        assert!(p.contains("Model 1: Score = 40, Analysis = \"mild\""));
        assert!(p.contains("Model 2: Score = 72.5, Analysis = \"clustered tab switches\""));
        assert!(p.contains("The distribution of scores ([40, 72.5])"));
    }

    #[test]
    fn rubric_mentions_leniency_windows() {
        assert!(JUDGE_SYSTEM_PROMPT.contains("First 5 minutes (300 seconds)"));
        assert!(JUDGE_SYSTEM_PROMPT.contains("Last 5 minutes (300 seconds)"));
        assert!(SYNTHESIS_SYSTEM_PROMPT.contains("\"score\""));
    }
}
