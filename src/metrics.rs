//! Sample extraction: which numbers a comparison feeds to the hypothesis test
//!
//! A cohort's records are reduced to one value per record, per (user, skill)
//! or per user. Groups are keyed by `BTreeMap`, so values come out ordered by
//! user and then key. Paired samples are matched user by user, never by
//! position in the whole sample.

use crate::cohort::Cohort;
use crate::error::{GainError, Result};
use crate::gain::normalized_change;
use crate::record::{DerivedRecord, TestPhase};
use crate::scoring::TaskMapping;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Quantity compared between two cohorts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Metric {
    ImprovementAbs,
    NormalizedChange,
    /// Difference of pre/post z-scores
    ImprovementAbsNormalized,
    PosttestRel,
    /// Per user: best minus worst per-skill mean posttest score
    SkillSpread,
    /// Per user: normalized change of summed raw points, in percent
    TotalNormalizedChange,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::ImprovementAbs,
        Metric::NormalizedChange,
        Metric::ImprovementAbsNormalized,
        Metric::PosttestRel,
        Metric::SkillSpread,
        Metric::TotalNormalizedChange,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::ImprovementAbs => "improvement_abs",
            Metric::NormalizedChange => "normalized_change",
            Metric::ImprovementAbsNormalized => "improvement_abs_normalized",
            Metric::PosttestRel => "posttest_rel",
            Metric::SkillSpread => "skill_spread",
            Metric::TotalNormalizedChange => "total_normalized_change",
        }
    }

    /// Metrics that only exist once per user
    pub fn is_per_user(&self) -> bool {
        matches!(self, Metric::SkillSpread | Metric::TotalNormalizedChange)
    }

    /// Value of a record-level metric, `None` for per-user metrics
    pub fn record_value(&self, record: &DerivedRecord) -> Option<f64> {
        match self {
            Metric::ImprovementAbs => Some(record.improvement_abs),
            Metric::NormalizedChange => Some(record.normalized_change),
            Metric::ImprovementAbsNormalized => Some(record.improvement_abs_normalized),
            Metric::PosttestRel => Some(record.posttest_rel),
            Metric::SkillSpread | Metric::TotalNormalizedChange => None,
        }
    }
}

impl FromStr for Metric {
    type Err = GainError;

    fn from_str(s: &str) -> Result<Self> {
        Metric::ALL
            .into_iter()
            .find(|m| m.as_str() == s.trim())
            .ok_or_else(|| GainError::UnknownMetric(s.to_string()))
    }
}

impl TryFrom<String> for Metric {
    type Error = GainError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Metric> for String {
    fn from(metric: Metric) -> Self {
        metric.as_str().to_string()
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Level at which record values are averaged before testing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// One value per (user, exercise) record
    #[default]
    Exercise,
    /// Mean per (user, skill)
    Skill,
    /// Mean per user
    User,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Exercise => write!(f, "exercise"),
            Granularity::Skill => write!(f, "skill"),
            Granularity::User => write!(f, "user"),
        }
    }
}

/// Draw the sample a comparison tests for one cohort
///
/// `mapping` is only consulted by [`Metric::TotalNormalizedChange`], which
/// needs the max points of every exercise; without it that metric fails with
/// [`GainError::Config`].
pub fn extract_sample(
    cohort: &Cohort,
    metric: Metric,
    granularity: Granularity,
    mapping: Option<&TaskMapping>,
) -> Result<Vec<f64>> {
    Ok(user_values(cohort, metric, granularity, mapping)?
        .into_iter()
        .map(|(_, v)| v)
        .collect())
}

/// Draw both samples of a paired comparison
///
/// Values are matched user by user: the n-th value a user contributes to
/// cohort A is paired with the n-th value that user contributes to cohort B.
/// A user whose value counts differ between the cohorts, including a user
/// present in only one of them, fails with [`GainError::UnpairedUser`]. An
/// empty cohort is returned as is so the test reports it by label.
pub fn extract_paired(
    a: &Cohort,
    b: &Cohort,
    metric: Metric,
    granularity: Granularity,
    mapping: Option<&TaskMapping>,
) -> Result<(Vec<f64>, Vec<f64>)> {
    let values_a = user_values(a, metric, granularity, mapping)?;
    let values_b = user_values(b, metric, granularity, mapping)?;
    if values_a.is_empty() || values_b.is_empty() {
        return Ok((
            values_a.into_iter().map(|(_, v)| v).collect(),
            values_b.into_iter().map(|(_, v)| v).collect(),
        ));
    }

    let by_user_a = by_user(values_a);
    let by_user_b = by_user(values_b);
    let users: BTreeSet<u32> = by_user_a.keys().chain(by_user_b.keys()).copied().collect();

    let mut sample_a = Vec::new();
    let mut sample_b = Vec::new();
    for user_id in users {
        let va = by_user_a.get(&user_id).map(Vec::as_slice).unwrap_or_default();
        let vb = by_user_b.get(&user_id).map(Vec::as_slice).unwrap_or_default();
        if va.len() != vb.len() {
            return Err(GainError::UnpairedUser {
                user_id,
                len_a: va.len(),
                len_b: vb.len(),
            });
        }
        sample_a.extend_from_slice(va);
        sample_b.extend_from_slice(vb);
    }
    Ok((sample_a, sample_b))
}

fn by_user(values: Vec<(u32, f64)>) -> BTreeMap<u32, Vec<f64>> {
    let mut groups: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for (user_id, v) in values {
        groups.entry(user_id).or_default().push(v);
    }
    groups
}

// Sample values tagged with their user, ordered by user and then key
fn user_values(
    cohort: &Cohort,
    metric: Metric,
    granularity: Granularity,
    mapping: Option<&TaskMapping>,
) -> Result<Vec<(u32, f64)>> {
    let mut records: Vec<&DerivedRecord> = cohort.records.iter().collect();
    records.sort_by_key(|r| r.key());

    match metric {
        Metric::SkillSpread => Ok(skill_spread(&records)),
        Metric::TotalNormalizedChange => {
            let mapping = mapping.ok_or_else(|| {
                GainError::Config(format!(
                    "{} needs the exercises table (max points per exercise)",
                    metric
                ))
            })?;
            total_normalized_change(&records, mapping)
        }
        _ => {
            let values = records
                .iter()
                .filter_map(|r| metric.record_value(r).map(|v| (r, v)));
            Ok(match granularity {
                Granularity::Exercise => values.map(|(r, v)| (r.user_id, v)).collect(),
                Granularity::Skill => {
                    let keyed = values.map(|(r, v)| ((r.user_id, r.exercise_skill.as_str()), v));
                    group_means(keyed)
                        .into_iter()
                        .map(|((user_id, _), m)| (user_id, m))
                        .collect()
                }
                Granularity::User => group_means(values.map(|(r, v)| (r.user_id, v))),
            })
        }
    }
}

// Mean per key, in key order
fn group_means<K, I>(values: I) -> Vec<(K, f64)>
where
    K: Ord,
    I: Iterator<Item = (K, f64)>,
{
    let mut groups: BTreeMap<K, Vec<f64>> = BTreeMap::new();
    for (key, value) in values {
        groups.entry(key).or_default().push(value);
    }
    groups.into_iter().map(|(k, v)| (k, v.mean())).collect()
}

fn skill_spread(records: &[&DerivedRecord]) -> Vec<(u32, f64)> {
    let mut per_user: BTreeMap<u32, BTreeMap<&str, Vec<f64>>> = BTreeMap::new();
    for r in records {
        per_user
            .entry(r.user_id)
            .or_default()
            .entry(r.exercise_skill.as_str())
            .or_default()
            .push(r.posttest_rel);
    }

    per_user
        .into_iter()
        .map(|(user_id, skills)| {
            let means = skills.values().map(|v| v.mean());
            let (lo, hi) = means.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), m| {
                (lo.min(m), hi.max(m))
            });
            (user_id, hi - lo)
        })
        .collect()
}

fn total_normalized_change(
    records: &[&DerivedRecord],
    mapping: &TaskMapping,
) -> Result<Vec<(u32, f64)>> {
    #[derive(Default)]
    struct Totals {
        pre: f64,
        post: f64,
        pre_max: f64,
        post_max: f64,
    }

    let mut per_user: BTreeMap<u32, Totals> = BTreeMap::new();
    for r in records {
        let pre_max = mapping
            .max_points(TestPhase::Pretest, r.exercise_id)
            .map_err(|e| e.for_record(r.user_id, r.exercise_id))?;
        let post_max = mapping
            .max_points(TestPhase::Posttest, r.exercise_id)
            .map_err(|e| e.for_record(r.user_id, r.exercise_id))?;

        let totals = per_user.entry(r.user_id).or_default();
        totals.pre += r.pretest_correct;
        totals.post += r.posttest_correct;
        totals.pre_max += f64::from(pre_max);
        totals.post_max += f64::from(post_max);
    }

    Ok(per_user
        .into_iter()
        .map(|(user_id, t)| {
            let change = normalized_change(
                t.pre / t.pre_max * 100.0,
                t.post / t.post_max * 100.0,
                100.0,
            );
            (user_id, change)
        })
        .collect())
}

/// Mean of a record-level metric per exercise, ascending by exercise id
///
/// Returns an empty list for per-user metrics.
pub fn exercise_means(cohort: &Cohort, metric: Metric) -> Vec<(u32, f64)> {
    let mut groups: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for r in &cohort.records {
        if let Some(v) = metric.record_value(r) {
            groups.entry(r.exercise_id).or_default().push(v);
        }
    }
    groups.into_iter().map(|(id, v)| (id, v.mean())).collect()
}
