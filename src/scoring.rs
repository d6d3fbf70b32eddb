//! Raw correctness counts to relative scores
//!
//! The task mapping is keyed by `(TestPhase, exercise_id)` so a lookup can
//! never mix up string and integer keys.

use crate::error::{GainError, Result};
use crate::record::TestPhase;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Scale convention for relative scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreScale {
    /// Relative scores in [0, 1]
    #[default]
    Unit,
    /// Relative scores in [0, 100]
    Percent,
}

impl ScoreScale {
    /// Upper bound of a relative score under this convention
    pub fn max(self) -> f64 {
        match self {
            ScoreScale::Unit => 1.0,
            ScoreScale::Percent => 100.0,
        }
    }
}

/// One row of the exercises table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MappingRow {
    pub phase: TestPhase,
    pub exercise_id: u32,
    pub max_points: u32,
}

/// Maximum attainable points per test phase and exercise
///
/// Built once per study before any record is processed, read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskMapping {
    max_points: BTreeMap<(TestPhase, u32), u32>,
}

impl TaskMapping {
    /// Build a mapping from exercises-table rows
    ///
    /// Rejects zero totals and conflicting duplicate rows. Repeating an
    /// identical row is harmless.
    pub fn from_rows<I>(rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = MappingRow>,
    {
        let mut max_points = BTreeMap::new();
        for row in rows {
            if row.max_points == 0 {
                return Err(GainError::InvalidMapping(format!(
                    "exercise {} in the {} has max points 0",
                    row.exercise_id, row.phase
                )));
            }
            if let Some(existing) = max_points.insert((row.phase, row.exercise_id), row.max_points) {
                if existing != row.max_points {
                    return Err(GainError::InvalidMapping(format!(
                        "exercise {} in the {} listed with {} and {} max points",
                        row.exercise_id, row.phase, existing, row.max_points
                    )));
                }
            }
        }
        Ok(Self { max_points })
    }

    /// Max points for an exercise in a phase
    pub fn max_points(&self, phase: TestPhase, exercise_id: u32) -> Result<u32> {
        self.max_points
            .get(&(phase, exercise_id))
            .copied()
            .ok_or(GainError::MissingMapping { phase, exercise_id })
    }

    /// Check that an exercise has entries for both phases
    pub fn require_both_phases(&self, exercise_id: u32) -> Result<()> {
        self.max_points(TestPhase::Pretest, exercise_id)?;
        self.max_points(TestPhase::Posttest, exercise_id)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.max_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.max_points.is_empty()
    }

    /// All rows, ordered by phase then exercise
    pub fn rows(&self) -> impl Iterator<Item = MappingRow> + '_ {
        self.max_points
            .iter()
            .map(|(&(phase, exercise_id), &max_points)| MappingRow {
                phase,
                exercise_id,
                max_points,
            })
    }
}

/// Relative score of a raw correctness count
///
/// `rel = raw_correct / max_points[phase][exercise]`, multiplied by 100 under
/// [`ScoreScale::Percent`]. A result outside `[0, scale.max()]` means the raw
/// data is corrupt and fails with [`GainError::RangeViolation`]; it is never
/// clamped.
pub fn relative_score(
    raw_correct: f64,
    exercise_id: u32,
    phase: TestPhase,
    mapping: &TaskMapping,
    scale: ScoreScale,
) -> Result<f64> {
    let max_points = mapping.max_points(phase, exercise_id)?;
    let value = raw_correct / f64::from(max_points) * scale.max();

    if !value.is_finite() || !(0.0..=scale.max()).contains(&value) {
        return Err(GainError::RangeViolation {
            phase,
            exercise_id,
            raw_correct,
            max_points,
            value,
            scale_max: scale.max(),
        });
    }

    Ok(value)
}
