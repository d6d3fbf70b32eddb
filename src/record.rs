//! Study records: raw (user, exercise, pre, post) tuples and their derived metrics

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which test a score belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestPhase {
    Pretest,
    Posttest,
}

impl TestPhase {
    /// Map the `Test` column of the exercises table (1 = pretest, 2 = posttest)
    pub fn from_test_number(n: u32) -> Option<Self> {
        match n {
            1 => Some(TestPhase::Pretest),
            2 => Some(TestPhase::Posttest),
            _ => None,
        }
    }

    pub fn test_number(self) -> u32 {
        match self {
            TestPhase::Pretest => 1,
            TestPhase::Posttest => 2,
        }
    }
}

impl fmt::Display for TestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestPhase::Pretest => write!(f, "pretest"),
            TestPhase::Posttest => write!(f, "posttest"),
        }
    }
}

/// One user's raw scores on one exercise, before and after the intervention
#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseRecord {
    pub user_id: u32,
    pub exercise_id: u32,
    pub exercise_skill: String,
    pub pretest_correct: f64,
    pub posttest_correct: f64,
}

/// An [`ExerciseRecord`] with every computed learning-gain column
///
/// Column order matches the exported CSV:
/// `User, Exercise, ExerciseSkill, PretestCorrect, PosttestCorrect,
/// PretestCorrectRel, PosttestCorrectRel, ImprovementAbs, NormalizedChange,
/// NormalizedPretestCorrectRel, NormalizedPosttestCorrectRel,
/// ImprovementAbsNormalizedScores`.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedRecord {
    pub user_id: u32,
    pub exercise_id: u32,
    pub exercise_skill: String,
    pub pretest_correct: f64,
    pub posttest_correct: f64,
    pub pretest_rel: f64,
    pub posttest_rel: f64,
    pub improvement_abs: f64,
    pub normalized_change: f64,
    pub normalized_pretest_rel: f64,
    pub normalized_posttest_rel: f64,
    pub improvement_abs_normalized: f64,
}

impl DerivedRecord {
    /// Sort key used everywhere records are listed
    pub fn key(&self) -> (u32, u32) {
        (self.user_id, self.exercise_id)
    }
}
