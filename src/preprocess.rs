//! From raw test tables to derived records
//!
//! 1. join pretest and posttest rows on (user, exercise)
//! 2. tag each exercise with its skill from the study config
//! 3. drop excluded users, score, compute gains and study-wide z-scores

use crate::error::{GainError, Result};
use crate::gain::{compute_gain, normalize_labeled};
use crate::record::{DerivedRecord, ExerciseRecord, TestPhase};
use crate::scoring::{relative_score, TaskMapping};
use crate::study::StudyConfig;
use std::collections::BTreeMap;

/// One row of a pretest or posttest table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreRow {
    pub user_id: u32,
    pub exercise_id: u32,
    pub correct: f64,
}

fn index_phase(rows: &[ScoreRow], phase: TestPhase) -> Result<BTreeMap<(u32, u32), f64>> {
    let mut index = BTreeMap::new();
    for row in rows {
        if index
            .insert((row.user_id, row.exercise_id), row.correct)
            .is_some()
        {
            return Err(GainError::DuplicateRecord {
                phase,
                user_id: row.user_id,
                exercise_id: row.exercise_id,
            });
        }
    }
    Ok(index)
}

/// Join pretest and posttest rows into exercise records
///
/// Every (user, exercise) must appear exactly once in each table. The result
/// is ordered by user, then exercise.
pub fn join_phases(
    pretest: &[ScoreRow],
    posttest: &[ScoreRow],
    study: &StudyConfig,
) -> Result<Vec<ExerciseRecord>> {
    let pre = index_phase(pretest, TestPhase::Pretest)?;
    let mut post = index_phase(posttest, TestPhase::Posttest)?;

    let mut records = Vec::with_capacity(pre.len());
    for ((user_id, exercise_id), pretest_correct) in pre {
        let posttest_correct = post.remove(&(user_id, exercise_id)).ok_or(GainError::UnmatchedRecord {
            missing_phase: TestPhase::Posttest,
            user_id,
            exercise_id,
        })?;
        let skill = study
            .skill_for(exercise_id)
            .map_err(|e| e.for_record(user_id, exercise_id))?;

        records.push(ExerciseRecord {
            user_id,
            exercise_id,
            exercise_skill: skill.to_string(),
            pretest_correct,
            posttest_correct,
        });
    }

    if let Some((&(user_id, exercise_id), _)) = post.iter().next() {
        return Err(GainError::UnmatchedRecord {
            missing_phase: TestPhase::Pretest,
            user_id,
            exercise_id,
        });
    }

    Ok(records)
}

/// Compute every derived column for a study's records
///
/// Users named by the study's exclusion policy are dropped first, so they
/// neither fail validation nor shift the z-scores. z-scores are taken over
/// all remaining records of the study. Any error is tagged with the record it
/// came from.
///
/// # Example
/// ```
/// use gainstat::preprocess::derive_records;
/// use gainstat::record::{ExerciseRecord, TestPhase};
/// use gainstat::scoring::{MappingRow, TaskMapping};
/// use gainstat::study::StudyConfig;
///
/// let study = StudyConfig::preset("main_study").unwrap();
/// let mapping = TaskMapping::from_rows([
///     MappingRow { phase: TestPhase::Pretest, exercise_id: 1, max_points: 10 },
///     MappingRow { phase: TestPhase::Posttest, exercise_id: 1, max_points: 10 },
/// ])
/// .unwrap();
/// let raw = vec![
///     ExerciseRecord { user_id: 1, exercise_id: 1, exercise_skill: "vlan".into(), pretest_correct: 4.0, posttest_correct: 8.0 },
///     ExerciseRecord { user_id: 2, exercise_id: 1, exercise_skill: "vlan".into(), pretest_correct: 6.0, posttest_correct: 7.0 },
/// ];
///
/// let derived = derive_records(&raw, &mapping, &study).unwrap();
/// assert!((derived[0].normalized_change - 2.0 / 3.0).abs() < 1e-12);
/// ```
pub fn derive_records(
    raw: &[ExerciseRecord],
    mapping: &TaskMapping,
    study: &StudyConfig,
) -> Result<Vec<DerivedRecord>> {
    let mut kept: Vec<&ExerciseRecord> = raw
        .iter()
        .filter(|r| !study.exclusion.excludes(r.user_id))
        .collect();
    let dropped = raw.len() - kept.len();
    if dropped > 0 {
        tracing::warn!(
            policy = %study.exclusion.name,
            version = study.exclusion.version,
            dropped,
            "excluded records before scoring"
        );
    }
    kept.sort_by_key(|r| (r.user_id, r.exercise_id));

    let scale = study.scale;
    let mut derived = Vec::with_capacity(kept.len());
    for r in kept {
        let tag = |e: GainError| e.for_record(r.user_id, r.exercise_id);
        let pretest_rel = relative_score(r.pretest_correct, r.exercise_id, TestPhase::Pretest, mapping, scale)
            .map_err(tag)?;
        let posttest_rel = relative_score(r.posttest_correct, r.exercise_id, TestPhase::Posttest, mapping, scale)
            .map_err(tag)?;
        let gain = compute_gain(pretest_rel, posttest_rel, scale.max());

        tracing::debug!(
            user = r.user_id,
            exercise = r.exercise_id,
            pretest_rel,
            posttest_rel,
            normalized_change = gain.normalized_change,
            "derived record"
        );

        derived.push(DerivedRecord {
            user_id: r.user_id,
            exercise_id: r.exercise_id,
            exercise_skill: r.exercise_skill.clone(),
            pretest_correct: r.pretest_correct,
            posttest_correct: r.posttest_correct,
            pretest_rel,
            posttest_rel,
            improvement_abs: gain.improvement_abs,
            normalized_change: gain.normalized_change,
            normalized_pretest_rel: 0.0,
            normalized_posttest_rel: 0.0,
            improvement_abs_normalized: 0.0,
        });
    }

    let pre: Vec<f64> = derived.iter().map(|r| r.pretest_rel).collect();
    let post: Vec<f64> = derived.iter().map(|r| r.posttest_rel).collect();
    let z_pre = normalize_labeled(&pre, "PretestCorrectRel")?;
    let z_post = normalize_labeled(&post, "PosttestCorrectRel")?;

    for ((record, zp), zq) in derived.iter_mut().zip(z_pre).zip(z_post) {
        record.normalized_pretest_rel = zp;
        record.normalized_posttest_rel = zq;
        record.improvement_abs_normalized = zq - zp;
    }

    tracing::info!(study = %study.name, records = derived.len(), "derived learning-gain metrics");
    Ok(derived)
}

/// Join raw tables and derive every record in one step
pub fn prepare(
    pretest: &[ScoreRow],
    posttest: &[ScoreRow],
    mapping: &TaskMapping,
    study: &StudyConfig,
) -> Result<Vec<DerivedRecord>> {
    // Excluded users may have broken rows; drop them before the join checks
    let keep = |row: &&ScoreRow| !study.exclusion.excludes(row.user_id);
    let pretest: Vec<ScoreRow> = pretest.iter().filter(keep).copied().collect();
    let posttest: Vec<ScoreRow> = posttest.iter().filter(keep).copied().collect();

    let raw = join_phases(&pretest, &posttest, study)?;
    for r in &raw {
        mapping
            .require_both_phases(r.exercise_id)
            .map_err(|e| e.for_record(r.user_id, r.exercise_id))?;
    }
    derive_records(&raw, mapping, study)
}
