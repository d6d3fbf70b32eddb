// Parametric tests: paired t-test and two-sample t-test (Student or Welch)
//
// p-values come from statrs' Student's t distribution and honor the
// configured alternative.

use super::config::Alternative;
use crate::error::{GainError, Result};
use statrs::distribution::{ContinuousCDF, StudentsT};
use statrs::statistics::Statistics;

/// t statistic with its degrees of freedom and p-value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TTest {
    pub statistic: f64,
    pub df: f64,
    pub p_value: f64,
}

/// p-value of a statistic under a continuous null distribution
pub(crate) fn tail_probability<D>(dist: &D, statistic: f64, alternative: Alternative) -> f64
where
    D: ContinuousCDF<f64, f64>,
{
    let p = match alternative {
        Alternative::Greater => dist.sf(statistic),
        Alternative::Less => dist.cdf(statistic),
        Alternative::TwoSided => 2.0 * dist.sf(statistic.abs()),
    };
    p.clamp(0.0, 1.0)
}

fn t_test(statistic: f64, df: f64, alternative: Alternative) -> Result<TTest> {
    let dist = StudentsT::new(0.0, 1.0, df).map_err(|e| GainError::Distribution(e.to_string()))?;
    Ok(TTest {
        statistic,
        df,
        p_value: tail_probability(&dist, statistic, alternative),
    })
}

fn require_two(values: &[f64], label: &str) -> Result<()> {
    if values.is_empty() {
        return Err(GainError::EmptySample {
            label: label.to_string(),
        });
    }
    if values.len() < 2 {
        return Err(GainError::InsufficientSampleSize {
            label: label.to_string(),
            required: 2,
            actual: values.len(),
        });
    }
    Ok(())
}

/// Paired t-test on `a - b`
pub fn paired_t_test(a: &[f64], b: &[f64], alternative: Alternative) -> Result<TTest> {
    if a.len() != b.len() {
        return Err(GainError::PairedLengthMismatch {
            len_a: a.len(),
            len_b: b.len(),
        });
    }
    let diffs: Vec<f64> = a.iter().zip(b).map(|(x, y)| x - y).collect();
    require_two(&diffs, "differences")?;

    let n = diffs.len() as f64;
    let sd = diffs.iter().std_dev();
    if !(sd.is_finite() && sd > 0.0) {
        return Err(GainError::DegenerateSample {
            label: "differences".to_string(),
            reason: "paired differences are constant".to_string(),
        });
    }

    t_test(diffs.iter().mean() / (sd / n.sqrt()), n - 1.0, alternative)
}

/// Two-sample t-test for independent samples
///
/// `equal_variance = true` pools the variances (Student), otherwise Welch's
/// test with Welch-Satterthwaite degrees of freedom.
pub fn independent_t_test(
    a: &[f64],
    b: &[f64],
    alternative: Alternative,
    equal_variance: bool,
) -> Result<TTest> {
    require_two(a, "a")?;
    require_two(b, "b")?;

    let n_a = a.len() as f64;
    let n_b = b.len() as f64;
    let var_a = a.variance();
    let var_b = b.variance();

    let (se, df) = if equal_variance {
        let df = n_a + n_b - 2.0;
        let pooled = ((n_a - 1.0) * var_a + (n_b - 1.0) * var_b) / df;
        ((pooled * (1.0 / n_a + 1.0 / n_b)).sqrt(), df)
    } else {
        let v_a = var_a / n_a;
        let v_b = var_b / n_b;
        let df = (v_a + v_b).powi(2) / (v_a * v_a / (n_a - 1.0) + v_b * v_b / (n_b - 1.0));
        ((v_a + v_b).sqrt(), df)
    };

    if !(se.is_finite() && se > 0.0) {
        return Err(GainError::DegenerateSample {
            label: "a+b".to_string(),
            reason: "both samples are constant, standard error is 0".to_string(),
        });
    }

    t_test((a.mean() - b.mean()) / se, df, alternative)
}
