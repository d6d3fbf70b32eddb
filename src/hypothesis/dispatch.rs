// Adaptive test selection
//
// 1. Shapiro-Wilk on each sample independently
// 2. Both p >= alpha (and graphical normality confirmed): parametric test,
//    otherwise the rank-based counterpart
// 3. Paired samples: paired t / Wilcoxon signed-rank (Pratt)
//    Independent samples: two-sample t / Mann-Whitney U
//
// No state survives a call; comparisons are independent of invocation order.

use super::config::{Comparison, HypothesisConfig};
use super::nonparametric::{mann_whitney_u, wilcoxon_pratt};
use super::normality::{shapiro_wilk, ShapiroWilk};
use super::parametric::{independent_t_test, paired_t_test};
use crate::effect_size::cohens_d;
use crate::error::{GainError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Statistical test chosen by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestKind {
    PairedT,
    UnpairedT,
    Wilcoxon,
    MannWhitney,
}

impl TestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestKind::PairedT => "paired-t",
            TestKind::UnpairedT => "unpaired-t",
            TestKind::Wilcoxon => "wilcoxon",
            TestKind::MannWhitney => "mann-whitney",
        }
    }

    pub fn is_parametric(&self) -> bool {
        matches!(self, TestKind::PairedT | TestKind::UnpairedT)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "paired-t" => Some(TestKind::PairedT),
            "unpaired-t" => Some(TestKind::UnpairedT),
            "wilcoxon" => Some(TestKind::Wilcoxon),
            "mann-whitney" => Some(TestKind::MannWhitney),
            _ => None,
        }
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A labeled sample handed to the dispatcher
#[derive(Debug, Clone, Copy)]
pub struct Sample<'a> {
    pub label: &'a str,
    pub values: &'a [f64],
}

impl<'a> Sample<'a> {
    pub fn new(label: &'a str, values: &'a [f64]) -> Self {
        Self { label, values }
    }
}

/// Outcome of one adaptive comparison
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HypothesisOutcome {
    pub statistic: f64,
    /// p-value in [0, 1]
    pub p_value: f64,
    pub test: TestKind,
    pub normality_a: ShapiroWilk,
    pub normality_b: ShapiroWilk,
}

/// Outcome plus Cohen's d for the same two samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestResult {
    pub statistic: f64,
    pub p_value: f64,
    pub test: TestKind,
    pub effect_size: f64,
    pub normality_a: ShapiroWilk,
    pub normality_b: ShapiroWilk,
}

impl TestResult {
    /// Whether the difference is significant at `alpha`
    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }
}

/// Pick and run the test for two samples
///
/// # Example
/// ```
/// use gainstat::hypothesis::{adaptive_test, Comparison, HypothesisConfig, Sample, TestKind};
///
/// let a = [0.61, 0.55, 0.70, 0.64, 0.59, 0.66, 0.58, 0.62];
/// let b = [0.41, 0.47, 0.39, 0.50, 0.44, 0.43, 0.46, 0.40];
/// let outcome = adaptive_test(
///     Sample::new("Recommended", &a),
///     Sample::new("Control", &b),
///     &Comparison::default(),
///     &HypothesisConfig::default(),
/// )
/// .unwrap();
/// assert_eq!(outcome.test, TestKind::UnpairedT);
/// assert!(outcome.p_value < 0.05);
/// ```
pub fn adaptive_test(
    a: Sample<'_>,
    b: Sample<'_>,
    comparison: &Comparison,
    config: &HypothesisConfig,
) -> Result<HypothesisOutcome> {
    for sample in [&a, &b] {
        if sample.values.is_empty() {
            return Err(GainError::EmptySample {
                label: sample.label.to_string(),
            });
        }
    }
    if comparison.paired && a.values.len() != b.values.len() {
        return Err(GainError::PairedLengthMismatch {
            len_a: a.values.len(),
            len_b: b.values.len(),
        });
    }

    let normality_a = shapiro_wilk(a.values, a.label)?;
    let normality_b = shapiro_wilk(b.values, b.label)?;

    let alpha = config.significance_level;
    let looks_normal = comparison.graphical_normality
        && normality_a.p_value >= alpha
        && normality_b.p_value >= alpha;

    let (test, statistic, p_value) = match (looks_normal, comparison.paired) {
        (true, true) => {
            let r = paired_t_test(a.values, b.values, comparison.alternative)?;
            (TestKind::PairedT, r.statistic, r.p_value)
        }
        (true, false) => {
            let r = independent_t_test(
                a.values,
                b.values,
                comparison.alternative,
                config.equal_variance,
            )?;
            (TestKind::UnpairedT, r.statistic, r.p_value)
        }
        (false, true) => {
            let r = wilcoxon_pratt(a.values, b.values, comparison.alternative)?;
            (TestKind::Wilcoxon, r.statistic, r.p_value)
        }
        (false, false) => {
            let r = mann_whitney_u(a.values, b.values, comparison.alternative)?;
            (TestKind::MannWhitney, r.statistic, r.p_value)
        }
    };

    tracing::info!(
        test = %test,
        a = a.label,
        b = b.label,
        normality_p_a = normality_a.p_value,
        normality_p_b = normality_b.p_value,
        graphical_normality = comparison.graphical_normality,
        alternative = %comparison.alternative,
        "selected {} ({} normality assumptions)",
        test,
        if looks_normal { "met" } else { "failed" }
    );

    Ok(HypothesisOutcome {
        statistic,
        p_value,
        test,
        normality_a,
        normality_b,
    })
}

/// Adaptive test followed by Cohen's d (pooled) on the same samples
pub fn compare(
    a: Sample<'_>,
    b: Sample<'_>,
    comparison: &Comparison,
    config: &HypothesisConfig,
) -> Result<TestResult> {
    let outcome = adaptive_test(a, b, comparison, config)?;
    let effect_size = cohens_d(a.values, b.values)?;

    Ok(TestResult {
        statistic: outcome.statistic,
        p_value: outcome.p_value,
        test: outcome.test,
        effect_size,
        normality_a: outcome.normality_a,
        normality_b: outcome.normality_b,
    })
}
