//! Comprehensive property-based tests for pre-commit hook
//!
//! This test suite covers the core computations of gainstat using
//! property-based testing with proptest. Designed to run under 30 seconds as a
//! pre-commit quality gate.
//!
//! Core features tested:
//! 1. Relative scores and range violations
//! 2. Normalized change bounds and ties
//! 3. Cohen's d sign and scale behavior
//! 4. Cohort partitioning
//! 5. Derived-record CSV round trip
//! 6. Adaptive test dispatch

use gainstat::cohort::{partition, split, PartitionRule};
use gainstat::csv_input::parse_derived_records;
use gainstat::csv_output::DerivedCsvOutput;
use gainstat::effect_size::cohens_d;
use gainstat::gain::{compute_gain, normalize_scores, normalized_change};
use gainstat::hypothesis::{compare, Comparison, HypothesisConfig, Sample};
use gainstat::record::{DerivedRecord, TestPhase};
use gainstat::scoring::{relative_score, MappingRow, ScoreScale, TaskMapping};
use gainstat::GainError;
use proptest::prelude::*;

fn mapping(max_points: u32) -> TaskMapping {
    TaskMapping::from_rows([
        MappingRow {
            phase: TestPhase::Pretest,
            exercise_id: 1,
            max_points,
        },
        MappingRow {
            phase: TestPhase::Posttest,
            exercise_id: 1,
            max_points,
        },
    ])
    .unwrap()
}

fn spread(values: &[f64]) -> f64 {
    let lo = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let hi = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    hi - lo
}

fn arb_record() -> impl Strategy<Value = DerivedRecord> {
    (
        (0u32..500, 1u32..20, "[a-zA-Z0-9 ,\"-]{0,16}"),
        prop::array::uniform9(-1e6f64..1e6),
    )
        .prop_map(|((user_id, exercise_id, skill), v)| DerivedRecord {
            user_id,
            exercise_id,
            exercise_skill: skill,
            pretest_correct: v[0],
            posttest_correct: v[1],
            pretest_rel: v[2],
            posttest_rel: v[3],
            improvement_abs: v[4],
            normalized_change: v[5],
            normalized_pretest_rel: v[6],
            normalized_posttest_rel: v[7],
            improvement_abs_normalized: v[8],
        })
}

// Relative scores stay on the scale for valid raw counts
proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_relative_score_within_scale(max in 1u32..200, frac in 0.0f64..=1.0, percent in any::<bool>()) {
        let scale = if percent { ScoreScale::Percent } else { ScoreScale::Unit };
        let raw = (f64::from(max) * frac).floor();
        let rel = relative_score(raw, 1, TestPhase::Pretest, &mapping(max), scale).unwrap();
        prop_assert!((0.0..=scale.max()).contains(&rel));
    }

    #[test]
    fn prop_relative_score_rejects_excess(max in 1u32..200, excess in 1u32..50) {
        let raw = f64::from(max + excess);
        let err = relative_score(raw, 1, TestPhase::Posttest, &mapping(max), ScoreScale::Unit).unwrap_err();
        let is_range_violation = matches!(err, GainError::RangeViolation { .. });
        prop_assert!(is_range_violation);
    }

    #[test]
    fn prop_relative_score_rejects_negative(max in 1u32..200, raw in -100.0f64..-0.001) {
        let result = relative_score(raw, 1, TestPhase::Pretest, &mapping(max), ScoreScale::Unit);
        prop_assert!(result.is_err());
    }
}

// Normalized change lives in [-1, 1] and ties are exactly 0
proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn prop_normalized_change_bounded(pre in 0.0f64..=1.0, post in 0.0f64..=1.0) {
        let nc = normalized_change(pre, post, 1.0);
        prop_assert!((-1.0..=1.0).contains(&nc), "nc = {}", nc);
        prop_assert_eq!(nc > 0.0, post > pre);
        prop_assert_eq!(nc < 0.0, post < pre);
    }

    #[test]
    fn prop_normalized_change_tie_is_zero(score in 0.0f64..=100.0) {
        prop_assert_eq!(normalized_change(score, score, 100.0), 0.0);
    }

    #[test]
    fn prop_normalized_change_scale_free(pre in 0.0f64..=1.0, post in 0.0f64..=1.0) {
        prop_assume!((post - pre).abs() > 1e-6 && pre > 1e-6 && pre < 1.0 - 1e-6);
        // The same scores on the percent scale give the same change
        let unit = normalized_change(pre, post, 1.0);
        let percent = normalized_change(pre * 100.0, post * 100.0, 100.0);
        prop_assert!((unit - percent).abs() < 1e-9);
    }

    #[test]
    fn prop_improvement_is_difference(pre in 0.0f64..=1.0, post in 0.0f64..=1.0) {
        let gain = compute_gain(pre, post, 1.0);
        prop_assert_eq!(gain.improvement_abs, post - pre);
    }
}

// Cohen's d flips sign on swap and ignores a common rescaling
proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_cohens_d_sign_flips(
        a in prop::collection::vec(-50.0f64..50.0, 2..30),
        b in prop::collection::vec(-50.0f64..50.0, 2..30),
    ) {
        prop_assume!(spread(&a) > 1e-3 || spread(&b) > 1e-3);
        let ab = cohens_d(&a, &b).unwrap();
        let ba = cohens_d(&b, &a).unwrap();
        prop_assert!((ab + ba).abs() < 1e-9);
    }

    #[test]
    fn prop_cohens_d_scale_invariant(
        a in prop::collection::vec(-50.0f64..50.0, 2..30),
        b in prop::collection::vec(-50.0f64..50.0, 2..30),
        k in 0.01f64..100.0,
    ) {
        prop_assume!(spread(&a) > 1e-3 || spread(&b) > 1e-3);
        let d = cohens_d(&a, &b).unwrap();
        let sa: Vec<f64> = a.iter().map(|x| x * k).collect();
        let sb: Vec<f64> = b.iter().map(|x| x * k).collect();
        let scaled = cohens_d(&sa, &sb).unwrap();
        prop_assert!((d - scaled).abs() < 1e-6 * d.abs().max(1.0));
    }
}

// Partitioning never loses or duplicates a record
proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_partition_is_exact(records in prop::collection::vec(arb_record(), 0..60), modulus in 2u32..7) {
        let keep = |r: &DerivedRecord| r.user_id % modulus == 0;
        let a = partition("a", &records, keep);
        let b = partition("b", &records, |r| !keep(r));

        prop_assert_eq!(a.len() + b.len(), records.len());
        prop_assert!(a.records.iter().all(|r| keep(r)));
        prop_assert!(b.records.iter().all(|r| !keep(r)));
    }

    #[test]
    fn prop_split_rules_are_exact(records in prop::collection::vec(arb_record(), 0..60)) {
        for rule in [PartitionRule::UserParity, PartitionRule::UserExerciseParity] {
            let (a, b) = split(&records, rule, "a", "b");
            prop_assert_eq!(a.len() + b.len(), records.len());
            prop_assert!(a.records.iter().all(|r| rule.in_cohort_a(r)));
            prop_assert!(b.records.iter().all(|r| !rule.in_cohort_a(r)));
        }
    }
}

// Derived tables reload exactly
proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_derived_csv_round_trip(records in prop::collection::vec(arb_record(), 1..20)) {
        let csv = records.iter().cloned().collect::<DerivedCsvOutput>().to_csv();
        let reloaded = parse_derived_records(&csv).unwrap();
        prop_assert_eq!(reloaded, records);
    }
}

// z-scores are centered with unit population spread
proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_zscores_standardized(sample in prop::collection::vec(0.0f64..=1.0, 2..80)) {
        prop_assume!(spread(&sample) > 1e-3);
        let z = normalize_scores(&sample).unwrap();
        let n = z.len() as f64;
        let mean = z.iter().sum::<f64>() / n;
        let var = z.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        prop_assert!(mean.abs() < 1e-9);
        prop_assert!((var - 1.0).abs() < 1e-9);
    }
}

// Dispatch always yields a probability and never depends on call order
proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_compare_p_value_is_probability(
        a in prop::collection::vec(0.0f64..1.0, 3..40),
        b in prop::collection::vec(0.0f64..1.0, 3..40),
    ) {
        prop_assume!(spread(&a) > 1e-3 && spread(&b) > 1e-3);
        let comparison = Comparison::default();
        let config = HypothesisConfig::default();

        let first = compare(Sample::new("a", &a), Sample::new("b", &b), &comparison, &config).unwrap();
        let again = compare(Sample::new("a", &a), Sample::new("b", &b), &comparison, &config).unwrap();

        prop_assert!((0.0..=1.0).contains(&first.p_value));
        prop_assert_eq!(first, again);
    }
}
