//! Learning-gain metrics: absolute improvement, normalized change, z-scores
//!
//! Normalized change follows Marx & Cummings (2007), which generalizes Hake's
//! (1998) normalized gain to decreasing scores:
//!
//! - post > pre: `(post - pre) / (max - pre)`
//! - post < pre: `(post - pre) / pre`
//! - post == pre: `0`
//!
//! Ties, including perfect pre and post scores, stay in the dataset with a
//! change of 0. Marx & Cummings recommend dropping them instead.

use crate::error::{GainError, Result};
use statrs::statistics::Statistics;

/// Improvement of one record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gain {
    /// `posttest_rel - pretest_rel`, within `[-scale_max, scale_max]`
    pub improvement_abs: f64,
    /// Normalized change, within `[-1, 1]`
    pub normalized_change: f64,
}

/// Compute absolute improvement and normalized change for one record
///
/// Both inputs must already be relative scores in `[0, scale_max]`.
pub fn compute_gain(pretest_rel: f64, posttest_rel: f64, scale_max: f64) -> Gain {
    Gain {
        improvement_abs: posttest_rel - pretest_rel,
        normalized_change: normalized_change(pretest_rel, posttest_rel, scale_max),
    }
}

/// Marx & Cummings normalized change
///
/// The decreasing branch divides by `pretest_rel`, which is positive there
/// because `posttest_rel >= 0`. The increasing branch divides by
/// `scale_max - pretest_rel`, which is positive there because
/// `pretest_rel < posttest_rel <= scale_max`.
pub fn normalized_change(pretest_rel: f64, posttest_rel: f64, scale_max: f64) -> f64 {
    if posttest_rel > pretest_rel {
        (posttest_rel - pretest_rel) / (scale_max - pretest_rel)
    } else if posttest_rel < pretest_rel {
        (posttest_rel - pretest_rel) / pretest_rel
    } else {
        0.0
    }
}

/// Z-score transform: `(x - mean) / population_std`
///
/// A constant sample has no spread to standardize against and fails with
/// [`GainError::DegenerateSample`] instead of producing NaN.
pub fn normalize_scores(sample: &[f64]) -> Result<Vec<f64>> {
    normalize_labeled(sample, "scores")
}

pub(crate) fn normalize_labeled(sample: &[f64], label: &str) -> Result<Vec<f64>> {
    if sample.is_empty() {
        return Err(GainError::EmptySample {
            label: label.to_string(),
        });
    }

    let m = sample.mean();
    let std = sample.population_std_dev();
    if !(std.is_finite() && std > 0.0) {
        return Err(GainError::DegenerateSample {
            label: label.to_string(),
            reason: format!("population standard deviation is {} (all values {})", std, m),
        });
    }

    Ok(sample.iter().map(|x| (x - m) / std).collect())
}
