// tests/fusion.rs
//
// Fusion weights, rounding and the score → tier/color table.

use proctor_risk_fusion::fusion::{fuse, score_color, ComponentScores, RiskTier};

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn reference_cases() {
    let two = fuse(&ComponentScores::new(60.0, Some(80.0), None));
    assert!(approx(two.overall_score, 72.0));
    assert_eq!(two.status, RiskTier::MediumRisk);
    assert_eq!(two.color, "#F57C00");

    let three = fuse(&ComponentScores::new(60.0, Some(80.0), Some(40.0)));
    assert!(approx(three.overall_score, 64.0));
    assert_eq!(three.status, RiskTier::LowRisk);
}

#[test]
fn missing_llm_counts_as_zero() {
    let f = fuse(&ComponentScores::new(60.0, None, None));
    assert!(approx(f.overall_score, 24.0));
    assert_eq!(f.status, RiskTier::NoRisk);
    assert_eq!(f.color, "#388E3C");
}

#[test]
fn zero_ml_is_treated_as_absent() {
    let with_zero = fuse(&ComponentScores::new(33.3, Some(41.0), Some(0.0)));
    let without = fuse(&ComponentScores::new(33.3, Some(41.0), None));
    assert_eq!(with_zero, without);
}

#[test]
fn result_has_two_decimals() {
    let f = fuse(&ComponentScores::new(12.3, Some(47.0), Some(33.3)));
    // 3.69 + 21.15 + 8.325 = 33.165
    let cents = f.overall_score * 100.0;
    assert!(approx(cents, cents.round()));
    assert!((f.overall_score - 33.17).abs() < 0.011);
}

#[test]
fn all_maximal_is_high_risk() {
    let f = fuse(&ComponentScores::new(99.9, Some(100.0), Some(100.0)));
    assert!(f.overall_score <= 100.0);
    assert_eq!(f.status, RiskTier::HighRisk);
    assert_eq!(f.color, "#D32F2F");
}

#[test]
fn tier_boundaries() {
    let cases = [
        (0.0, RiskTier::NoRisk),
        (34.99, RiskTier::NoRisk),
        (35.0, RiskTier::LowRisk),
        (69.99, RiskTier::LowRisk),
        (70.0, RiskTier::MediumRisk),
        (79.99, RiskTier::MediumRisk),
        (80.0, RiskTier::HighRisk),
        (100.0, RiskTier::HighRisk),
    ];
    for (score, tier) in cases {
        assert_eq!(RiskTier::from_score(score), tier, "score {score}");
        assert_eq!(score_color(score), tier.color());
    }
}

#[test]
fn tiers_are_monotonic_over_the_whole_range() {
    let mut prev = RiskTier::NoRisk;
    for cents in 0..=10_000 {
        let t = RiskTier::from_score(f64::from(cents) / 100.0);
        assert!(t >= prev, "tier dropped at {cents}");
        prev = t;
    }
    assert_eq!(prev, RiskTier::HighRisk);
}

#[test]
fn every_tier_has_a_distinct_label_and_color() {
    let labels: Vec<_> = RiskTier::ALL.iter().map(|t| t.label()).collect();
    assert_eq!(labels, ["No Risk", "Low Risk", "Medium Risk", "High Risk"]);
    for t in RiskTier::ALL {
        assert_eq!(RiskTier::parse(t.label()), Some(t));
        assert_eq!(serde_json::to_value(t).unwrap(), t.label());
    }
    let mut colors: Vec<_> = RiskTier::ALL.iter().map(|t| t.color()).collect();
    colors.dedup();
    assert_eq!(colors.len(), 4);
}
