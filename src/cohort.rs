//! Cohort partitioning and outlier exclusion
//!
//! A cohort is selected by a pure predicate over a record's identifying
//! fields. A predicate and its negation split a record set into two disjoint
//! cohorts whose union is the input.

use crate::error::GainError;
use crate::record::DerivedRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Deterministic membership rule for cohort A (cohort B is its negation)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PartitionRule {
    /// Odd user ids form cohort A (between-subject design)
    UserParity,
    /// Cohort A where user parity differs from exercise parity (within-subject
    /// design alternating the trained skill by exercise)
    UserExerciseParity,
}

impl PartitionRule {
    /// Whether a record belongs to cohort A
    pub fn in_cohort_a(&self, record: &DerivedRecord) -> bool {
        match self {
            PartitionRule::UserParity => record.user_id % 2 != 0,
            PartitionRule::UserExerciseParity => record.user_id % 2 != record.exercise_id % 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PartitionRule::UserParity => "user-parity",
            PartitionRule::UserExerciseParity => "user-exercise-parity",
        }
    }
}

impl FromStr for PartitionRule {
    type Err = GainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "user-parity" => Ok(PartitionRule::UserParity),
            "user-exercise-parity" => Ok(PartitionRule::UserExerciseParity),
            other => Err(GainError::UnknownPartitionRule(other.to_string())),
        }
    }
}

impl TryFrom<String> for PartitionRule {
    type Error = GainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PartitionRule> for String {
    fn from(rule: PartitionRule) -> Self {
        rule.as_str().to_string()
    }
}

impl fmt::Display for PartitionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named, versioned list of users excluded from a study
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionPolicy {
    pub name: String,
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub users: BTreeSet<u32>,
}

impl ExclusionPolicy {
    /// Policy that excludes nobody
    pub fn none() -> Self {
        Self {
            name: "none".to_string(),
            version: 0,
            users: BTreeSet::new(),
        }
    }

    pub fn excludes(&self, user_id: u32) -> bool {
        self.users.contains(&user_id)
    }

    /// Drop records of excluded users, returning the kept records
    pub fn apply(&self, records: &[DerivedRecord]) -> Vec<DerivedRecord> {
        let kept: Vec<DerivedRecord> = records
            .iter()
            .filter(|r| !self.excludes(r.user_id))
            .cloned()
            .collect();

        let dropped = records.len() - kept.len();
        if dropped > 0 {
            tracing::warn!(
                policy = %self.name,
                version = self.version,
                dropped,
                "excluded records of outlier users"
            );
        }
        kept
    }
}

/// A named subset of derived records
#[derive(Debug, Clone, PartialEq)]
pub struct Cohort {
    pub name: String,
    pub records: Vec<DerivedRecord>,
}

impl Cohort {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct users in this cohort, ascending
    pub fn users(&self) -> BTreeSet<u32> {
        self.records.iter().map(|r| r.user_id).collect()
    }
}

/// Select the records matching `predicate`, preserving input order
pub fn partition<P>(name: &str, records: &[DerivedRecord], predicate: P) -> Cohort
where
    P: Fn(&DerivedRecord) -> bool,
{
    Cohort {
        name: name.to_string(),
        records: records.iter().filter(|r| predicate(r)).cloned().collect(),
    }
}

/// Split records into cohort A (rule holds) and cohort B (rule fails)
pub fn split(
    records: &[DerivedRecord],
    rule: PartitionRule,
    name_a: &str,
    name_b: &str,
) -> (Cohort, Cohort) {
    let a = partition(name_a, records, |r| rule.in_cohort_a(r));
    let b = partition(name_b, records, |r| !rule.in_cohort_a(r));
    tracing::debug!(rule = %rule, a = a.len(), b = b.len(), "partitioned records");
    (a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(user_id: u32, exercise_id: u32) -> DerivedRecord {
        DerivedRecord {
            user_id,
            exercise_id,
            exercise_skill: "vlan".to_string(),
            pretest_correct: 1.0,
            posttest_correct: 2.0,
            pretest_rel: 0.1,
            posttest_rel: 0.2,
            improvement_abs: 0.1,
            normalized_change: 0.1 / 0.9,
            normalized_pretest_rel: 0.0,
            normalized_posttest_rel: 0.0,
            improvement_abs_normalized: 0.0,
        }
    }

    fn grid() -> Vec<DerivedRecord> {
        let mut records = Vec::new();
        for user in 1..=6 {
            for exercise in 1..=4 {
                records.push(record(user, exercise));
            }
        }
        records
    }

    #[test]
    fn test_user_parity() {
        let (a, b) = split(&grid(), PartitionRule::UserParity, "Recommended", "Control");
        assert_eq!(a.users().into_iter().collect::<Vec<_>>(), vec![1, 3, 5]);
        assert_eq!(b.users().into_iter().collect::<Vec<_>>(), vec![2, 4, 6]);
        assert_eq!(a.name, "Recommended");
    }

    #[test]
    fn test_user_exercise_parity() {
        let (a, b) = split(&grid(), PartitionRule::UserExerciseParity, "Trained", "Untrained");
        assert!(a.records.iter().all(|r| r.user_id % 2 != r.exercise_id % 2));
        assert!(b.records.iter().all(|r| r.user_id % 2 == r.exercise_id % 2));
        // Every user appears in both cohorts in a within-subject design
        assert_eq!(a.users(), b.users());
        assert_eq!(a.len(), 12);
    }

    #[test]
    fn test_split_is_exact_partition() {
        let records = grid();
        for rule in [PartitionRule::UserParity, PartitionRule::UserExerciseParity] {
            let (a, b) = split(&records, rule, "a", "b");
            assert_eq!(a.len() + b.len(), records.len());
            for r in &records {
                let in_a = a.records.contains(r);
                let in_b = b.records.contains(r);
                assert!(in_a ^ in_b, "record {:?} must be in exactly one cohort", r.key());
            }
        }
    }

    #[test]
    fn test_rule_parsing() {
        assert_eq!(
            "user-parity".parse::<PartitionRule>().unwrap(),
            PartitionRule::UserParity
        );
        assert_eq!(
            "user-exercise-parity".parse::<PartitionRule>().unwrap(),
            PartitionRule::UserExerciseParity
        );
        assert!(matches!(
            "odd-users".parse::<PartitionRule>(),
            Err(GainError::UnknownPartitionRule(_))
        ));
    }

    #[test]
    fn test_exclusion_policy() {
        let policy = ExclusionPolicy {
            name: "pre-study-outliers".to_string(),
            version: 1,
            users: [2, 5].into_iter().collect(),
        };
        let kept = policy.apply(&grid());
        assert_eq!(kept.len(), 16);
        assert!(kept.iter().all(|r| r.user_id != 2 && r.user_id != 5));
        assert!(ExclusionPolicy::none().apply(&grid()).len() == 24);
    }

    #[test]
    fn test_partition_with_closure() {
        let cohort = partition("late", &grid(), |r| r.exercise_id > 2);
        assert_eq!(cohort.len(), 12);
        assert!(!cohort.is_empty());
    }
}
