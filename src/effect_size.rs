//! Cohen's d effect size between two independent samples
//!
//! Canonical form (pooled standard deviation, sample variances):
//!
//! ```text
//! d = (mean(a) - mean(b)) / sqrt(((n_a-1)·var(a) + (n_b-1)·var(b)) / (n_a + n_b - 2))
//! ```
//!
//! Earlier analysis scripts divided by `sqrt((var(a) + var(b)) / 2)` instead.
//! That form is kept as [`EffectSizeVariant::UnweightedAverage`] only to
//! reproduce legacy numbers. Both agree when `n_a == n_b`.

use crate::error::{GainError, Result};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Which denominator to standardize the mean difference with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectSizeVariant {
    /// Degrees-of-freedom weighted pooled variance (canonical)
    #[default]
    Pooled,
    /// Plain average of the two sample variances (deprecated)
    UnweightedAverage,
}

fn require_two(values: &[f64], label: &str) -> Result<()> {
    if values.len() < 2 {
        return Err(GainError::InsufficientSampleSize {
            label: label.to_string(),
            required: 2,
            actual: values.len(),
        });
    }
    Ok(())
}

/// Cohen's d with the pooled standard deviation
///
/// Positive when `a` has the larger mean. Swapping the samples flips the sign.
pub fn cohens_d(sample_a: &[f64], sample_b: &[f64]) -> Result<f64> {
    cohens_d_with(sample_a, sample_b, EffectSizeVariant::Pooled)
}

/// Cohen's d with an explicit denominator variant
pub fn cohens_d_with(sample_a: &[f64], sample_b: &[f64], variant: EffectSizeVariant) -> Result<f64> {
    require_two(sample_a, "a")?;
    require_two(sample_b, "b")?;

    let n_a = sample_a.len() as f64;
    let n_b = sample_b.len() as f64;
    let var_a = sample_a.variance();
    let var_b = sample_b.variance();

    let spread = match variant {
        EffectSizeVariant::Pooled => {
            (((n_a - 1.0) * var_a + (n_b - 1.0) * var_b) / (n_a + n_b - 2.0)).sqrt()
        }
        EffectSizeVariant::UnweightedAverage => ((var_a + var_b) / 2.0).sqrt(),
    };

    if !(spread.is_finite() && spread > 0.0) {
        return Err(GainError::DegenerateSample {
            label: "a+b".to_string(),
            reason: "both samples are constant, pooled standard deviation is 0".to_string(),
        });
    }

    Ok((sample_a.mean() - sample_b.mean()) / spread)
}
