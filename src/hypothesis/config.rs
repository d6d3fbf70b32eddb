// Configuration for adaptive hypothesis testing
//
// The significance level gates two decisions: whether both samples look
// normal (Shapiro-Wilk p >= alpha) and whether a difference is significant.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of the alternative hypothesis, always stated for sample A vs B
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Alternative {
    /// A tends to be larger than B
    #[default]
    Greater,
    /// A tends to be smaller than B
    Less,
    TwoSided,
}

impl fmt::Display for Alternative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alternative::Greater => write!(f, "greater"),
            Alternative::Less => write!(f, "less"),
            Alternative::TwoSided => write!(f, "two-sided"),
        }
    }
}

/// Study-wide settings for hypothesis testing
///
/// # Example
/// ```
/// use gainstat::hypothesis::HypothesisConfig;
///
/// let config = HypothesisConfig::default();
/// assert_eq!(config.significance_level, 0.05);
/// assert!(config.equal_variance);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypothesisConfig {
    /// Alpha for both the normality gate and the final significance call
    ///
    /// - 0.05 (default): 95% confidence
    /// - 0.10: looser, used for the exploratory pre-study
    pub significance_level: f64,

    /// Student's pooled t-test for independent samples when true, Welch's
    /// unequal-variance t-test when false
    ///
    /// Default: true (the behavior the published results were computed with)
    pub equal_variance: bool,
}

impl Default for HypothesisConfig {
    fn default() -> Self {
        Self {
            significance_level: 0.05,
            equal_variance: true,
        }
    }
}

impl HypothesisConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(self.significance_level > 0.0 && self.significance_level < 1.0) {
            return Err(format!(
                "significance_level must be in (0, 1), got {}",
                self.significance_level
            ));
        }
        Ok(())
    }
}

/// Shape of a single comparison between two samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    /// Related samples (same users measured twice) vs independent samples
    pub paired: bool,

    pub alternative: Alternative,

    /// Whether the histograms were judged normal by inspection
    ///
    /// When false the non-parametric branch is taken even if Shapiro-Wilk
    /// accepts normality.
    pub graphical_normality: bool,
}

impl Default for Comparison {
    fn default() -> Self {
        Self {
            paired: false,
            alternative: Alternative::Greater,
            graphical_normality: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HypothesisConfig::default();
        assert_eq!(config.significance_level, 0.05);
        assert!(config.equal_variance);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_significance_level() {
        for alpha in [0.0, 1.0, 1.5, -0.1, f64::NAN] {
            let config = HypothesisConfig {
                significance_level: alpha,
                ..HypothesisConfig::default()
            };
            assert!(config.validate().is_err(), "alpha {} should be rejected", alpha);
        }
    }

    #[test]
    fn test_alternative_display() {
        assert_eq!(Alternative::Greater.to_string(), "greater");
        assert_eq!(Alternative::Less.to_string(), "less");
        assert_eq!(Alternative::TwoSided.to_string(), "two-sided");
    }

    #[test]
    fn test_default_comparison() {
        let c = Comparison::default();
        assert!(!c.paired);
        assert!(c.graphical_normality);
        assert_eq!(c.alternative, Alternative::Greater);
    }
}
