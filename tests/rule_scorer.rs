// tests/rule_scorer.rs
//
// Behavioral checks for the rule-based scorer through its public API.

use proctor_risk_fusion::activity::ActivityEvent;
use proctor_risk_fusion::rules::{RuleParams, RuleScorer};
use proctor_risk_fusion::weights::ActivityWeightTable;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn scorer() -> RuleScorer {
    RuleScorer::new(ActivityWeightTable::default_seed(), RuleParams::default())
}

fn ev(desc: &str, ts: &str, count: u32) -> ActivityEvent {
    ActivityEvent::new(desc, ts, count)
}

#[test]
fn empty_log_scores_zero_with_placeholder_factors() {
    let s = scorer().score(&[]);
    assert_eq!(s.score, 0.0);
    assert_eq!(s.factors(), ["NA", "NA", "NA"]);
}

#[test]
fn single_paste_after_opening_window() {
    let s = scorer().score(&[ev("Paste", "00:10:00", 1)]);
    // 100 * 10 / (10 + 70)
    assert_eq!(s.score, 12.5);
    assert_eq!(s.factor1, "Paste:10.0");
    assert_eq!(s.factor2, "NA");
}

#[test]
fn opening_window_is_exclusive_at_300_seconds() {
    let early = scorer().score(&[ev("Paste", "00:04:59", 1)]);
    assert_eq!(early.score, 17.6); // 15 / 85
    assert_eq!(early.factor1, "Paste:15.0");

    let edge = scorer().score(&[ev("Paste", "00:05:00", 1)]);
    assert_eq!(edge.score, 12.5);
}

#[test]
fn unknown_time_takes_previous_known_time() {
    let after_late = scorer().score(&[
        ev("Copy", "00:10:00", 1),
        ev("Paste", "NaN:NaN:NaN", 1),
    ]);
    // 7 + 10 = 17, no multiplier for either
    assert_eq!(after_late.score, 19.5);

    let leading_unknown = scorer().score(&[ev("Paste", "NaN:NaN:NaN", 1)]);
    // no earlier time → 0s → inside the opening window
    assert_eq!(leading_unknown.score, 17.6);
}

#[test]
fn unweighted_descriptions_contribute_nothing() {
    let s = scorer().score(&[ev("Candidate sneezed", "00:20:00", 5)]);
    assert_eq!(s.score, 0.0);
    assert_eq!(s.factor1, "NA");
}

#[test]
fn factors_rank_by_total_and_ties_keep_first_seen_order() {
    let s = scorer().score(&[
        ev("Candidate looking right", "00:30:00", 1),
        ev("Paste", "00:10:00", 1),
        ev("Cell phone detected", "00:20:00", 1),
        ev("Tab change detected", "00:25:00", 2),
    ]);
    assert_eq!(s.factor1, "Tab change detected:16.0");
    assert_eq!(s.factor2, "Paste:10.0");
    assert_eq!(s.factor3, "Cell phone detected:10.0");
}

#[test]
fn repeated_descriptions_aggregate() {
    let report = scorer().analyze(&[
        ev("Copy", "00:01:00", 1),
        ev("Copy", "00:20:00", 2),
    ]);
    // 7*1.5 + 7*2
    assert!((report.raw_total - 24.5).abs() < 1e-9);
    assert_eq!(report.breakdown.len(), 1);
    assert_eq!(report.score.factor1, "Copy:24.5");
    assert_eq!(report.contributions.len(), 2);
}

#[test]
fn doubling_counts_doubles_the_raw_total() {
    let sc = scorer();
    let once = sc.analyze(&[ev("Copy", "00:10:00", 1), ev("Candidate sneezed", "00:11:00", 3)]);
    let twice = sc.analyze(&[ev("Copy", "00:10:00", 2), ev("Candidate sneezed", "00:11:00", 6)]);
    assert_eq!(once.raw_total, 7.0);
    assert_eq!(twice.raw_total, 14.0);
    assert!(twice.score.score > once.score.score);
}

#[test]
fn saturates_below_one_hundred() {
    let s = scorer().score(&[ev("Paste", "00:10:00", u32::MAX)]);
    assert!(s.score < 100.0);
    assert_eq!(s.score, 99.9);
}

#[test]
fn custom_scale_changes_steepness() {
    let soft = RuleScorer::new(
        ActivityWeightTable::default_seed(),
        RuleParams {
            scale: 10.0,
            ..RuleParams::default()
        },
    );
    assert_eq!(soft.score(&[ev("Paste", "00:10:00", 1)]).score, 50.0);
}

const DESCRIPTIONS: &[&str] = &[
    "Paste",
    "Copy",
    "Tab change detected",
    "Candidate looking right",
    "No face detected",
    "Window focus changed",
    "Something unlisted",
];

fn random_log(rng: &mut StdRng) -> Vec<ActivityEvent> {
    let n = rng.random_range(0..20);
    (0..n)
        .map(|_| {
            let desc = DESCRIPTIONS[rng.random_range(0..DESCRIPTIONS.len())];
            let ts = if rng.random_range(0..10) == 0 {
                "NaN:NaN:NaN".to_string()
            } else {
                let t: u32 = rng.random_range(0..7200);
                format!("{:02}:{:02}:{:02}", t / 3600, (t / 60) % 60, t % 60)
            };
            ev(desc, &ts, rng.random_range(1..50))
        })
        .collect()
}

#[test]
fn random_logs_stay_in_range_and_grow_with_counts() {
    let sc = scorer();
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..500 {
        let log = random_log(&mut rng);
        let report = sc.analyze(&log);
        let base = &report.score;
        assert!((0.0..100.0).contains(&base.score), "score {}", base.score);

        let doubled: Vec<_> = log
            .iter()
            .map(|e| ev(&e.description, &e.timestamp, e.count * 2))
            .collect();
        let doubled_report = sc.analyze(&doubled);
        if report.breakdown.is_empty() {
            assert_eq!(doubled_report.raw_total, 0.0);
        } else {
            assert!(
                doubled_report.raw_total > report.raw_total,
                "doubling counts must raise the raw total ({} vs {})",
                doubled_report.raw_total,
                report.raw_total
            );
        }
        assert!(doubled_report.score.score >= base.score);

        let mut extended = log.clone();
        extended.push(ev("Paste", "01:00:00", 1));
        assert!(sc.score(&extended).score >= base.score);
    }
}
