//! Per-study configuration
//!
//! A study is described by a TOML file:
//!
//! ```toml
//! name = "main_study"
//! scale = "unit"
//! significance_level = 0.05
//! skills = ["vlan", "static-routing", "ipv4-addressing"]
//!
//! [exclusion]
//! name = "main-study-outliers"
//! version = 1
//! users = [7]
//!
//! [partition]
//! rule = "user-parity"
//! cohort_a = "Recommendation System"
//! cohort_b = "No recommendations"
//!
//! [[analysis]]
//! type = "improvement_abs"
//! metric = "improvement_abs"
//! alternative = "greater"
//! ```
//!
//! The two studies the tool was built for ship as presets (`pre_study`,
//! `main_study`).

use crate::cohort::{ExclusionPolicy, PartitionRule};
use crate::error::{GainError, Result};
use crate::hypothesis::{Alternative, Comparison, HypothesisConfig};
use crate::metrics::{Granularity, Metric};
use crate::scoring::ScoreScale;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

const PRE_STUDY_TOML: &str = include_str!("../studies/pre_study.toml");
const MAIN_STUDY_TOML: &str = include_str!("../studies/main_study.toml");

/// Names accepted by [`StudyConfig::preset`]
pub const PRESETS: [&str; 2] = ["pre_study", "main_study"];

fn default_significance_level() -> f64 {
    0.05
}

fn default_true() -> bool {
    true
}

/// How records are split into the two compared cohorts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartitionConfig {
    pub rule: PartitionRule,
    /// Label of the records the rule selects
    pub cohort_a: String,
    /// Label of the remaining records
    pub cohort_b: String,
}

/// One `[[analysis]]` entry: a single cohort comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisSpec {
    /// Row label in the results table
    #[serde(rename = "type")]
    pub name: String,
    pub metric: Metric,
    #[serde(default)]
    pub granularity: Granularity,
    #[serde(default)]
    pub paired: bool,
    #[serde(default)]
    pub alternative: Alternative,
    #[serde(default = "default_true")]
    pub graphical_normality: bool,
}

impl AnalysisSpec {
    /// Shape of the comparison handed to the dispatcher
    pub fn comparison(&self) -> Comparison {
        Comparison {
            paired: self.paired,
            alternative: self.alternative,
            graphical_normality: self.graphical_normality,
        }
    }
}

/// Static configuration of one study
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StudyConfig {
    pub name: String,

    #[serde(default)]
    pub scale: ScoreScale,

    #[serde(default = "default_significance_level")]
    pub significance_level: f64,

    #[serde(default = "default_true")]
    pub equal_variance: bool,

    /// Skill tag per exercise; index 0 is exercise 1
    pub skills: Vec<String>,

    #[serde(default = "ExclusionPolicy::none")]
    pub exclusion: ExclusionPolicy,

    pub partition: PartitionConfig,

    /// Emit a pretest/posttest bar chart per user
    #[serde(default)]
    pub pre_post_bars: bool,

    #[serde(default)]
    pub analysis: Vec<AnalysisSpec>,
}

impl StudyConfig {
    /// Load and validate a study from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a study from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: StudyConfig =
            toml::from_str(content).map_err(|e| GainError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Built-in study by name
    ///
    /// # Example
    /// ```
    /// use gainstat::study::StudyConfig;
    ///
    /// let study = StudyConfig::preset("main_study").unwrap();
    /// assert_eq!(study.skills.len(), 5);
    /// assert!(StudyConfig::preset("post_study").is_err());
    /// ```
    pub fn preset(name: &str) -> Result<Self> {
        match name {
            "pre_study" => Self::from_toml_str(PRE_STUDY_TOML),
            "main_study" => Self::from_toml_str(MAIN_STUDY_TOML),
            other => Err(GainError::UnknownStudy(other.to_string())),
        }
    }

    /// Check settings that serde cannot express
    pub fn validate(&self) -> Result<()> {
        self.hypothesis_config().validate().map_err(GainError::Config)?;

        if self.skills.is_empty() {
            return Err(GainError::Config(format!(
                "study '{}' lists no skills",
                self.name
            )));
        }
        if let Some(i) = self.skills.iter().position(|s| s.trim().is_empty()) {
            return Err(GainError::Config(format!(
                "skill tag for exercise {} is empty",
                i + 1
            )));
        }

        let p = &self.partition;
        if p.cohort_a.trim().is_empty() || p.cohort_b.trim().is_empty() {
            return Err(GainError::Config("cohort labels must not be empty".to_string()));
        }
        if p.cohort_a == p.cohort_b {
            return Err(GainError::Config(format!(
                "both cohorts are labeled '{}'",
                p.cohort_a
            )));
        }

        let mut seen = BTreeSet::new();
        for spec in &self.analysis {
            if !seen.insert(spec.name.as_str()) {
                return Err(GainError::Config(format!(
                    "analysis '{}' is listed twice",
                    spec.name
                )));
            }
            if spec.metric.is_per_user() && spec.granularity != Granularity::User {
                return Err(GainError::Config(format!(
                    "analysis '{}': {} is per user, granularity must be 'user'",
                    spec.name, spec.metric
                )));
            }
        }

        Ok(())
    }

    /// Skill tag of an exercise (exercise ids start at 1)
    pub fn skill_for(&self, exercise_id: u32) -> Result<&str> {
        exercise_id
            .checked_sub(1)
            .and_then(|i| self.skills.get(i as usize))
            .map(String::as_str)
            .ok_or(GainError::MissingSkill(exercise_id))
    }

    pub fn hypothesis_config(&self) -> HypothesisConfig {
        HypothesisConfig {
            significance_level: self.significance_level,
            equal_variance: self.equal_variance,
        }
    }

    /// Same study with a different alpha, validated
    pub fn with_significance_level(mut self, alpha: f64) -> Result<Self> {
        self.significance_level = alpha;
        self.validate()?;
        Ok(self)
    }
}
