//! Error taxonomy for the gain/inference pipeline
//!
//! Every failure is surfaced to the caller. A malformed record fails the
//! whole run instead of being skipped, unless the study's exclusion policy
//! names it.

use crate::record::TestPhase;
use thiserror::Error;

/// Errors produced while deriving metrics or running comparisons
#[derive(Error, Debug)]
pub enum GainError {
    #[error("no max points for exercise {exercise_id} in the {phase}")]
    MissingMapping { phase: TestPhase, exercise_id: u32 },

    #[error(
        "relative score {value} for exercise {exercise_id} ({phase}) is outside [0, {scale_max}] \
         (raw {raw_correct} of {max_points})"
    )]
    RangeViolation {
        phase: TestPhase,
        exercise_id: u32,
        raw_correct: f64,
        max_points: u32,
        value: f64,
        scale_max: f64,
    },

    #[error("sample '{label}' is empty")]
    EmptySample { label: String },

    #[error("sample '{label}' has {actual} values, need at least {required}")]
    InsufficientSampleSize {
        label: String,
        required: usize,
        actual: usize,
    },

    #[error("sample '{label}' is degenerate: {reason}")]
    DegenerateSample { label: String, reason: String },

    #[error("paired samples differ in length: {len_a} vs {len_b}")]
    PairedLengthMismatch { len_a: usize, len_b: usize },

    #[error("paired samples do not line up for user {user_id}: {len_a} vs {len_b} values")]
    UnpairedUser {
        user_id: u32,
        len_a: usize,
        len_b: usize,
    },

    #[error("no skill tag configured for exercise {0}")]
    MissingSkill(u32),

    #[error("{missing_phase} row missing for user {user_id}, exercise {exercise_id}")]
    UnmatchedRecord {
        missing_phase: TestPhase,
        user_id: u32,
        exercise_id: u32,
    },

    #[error("duplicate {phase} row for user {user_id}, exercise {exercise_id}")]
    DuplicateRecord {
        phase: TestPhase,
        user_id: u32,
        exercise_id: u32,
    },

    #[error("invalid task mapping: {0}")]
    InvalidMapping(String),

    #[error("unknown study '{0}' (known: pre_study, main_study)")]
    UnknownStudy(String),

    #[error("unknown partition rule '{0}' (known: user-parity, user-exercise-parity)")]
    UnknownPartitionRule(String),

    #[error("unknown metric '{0}'")]
    UnknownMetric(String),

    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("invalid study configuration: {0}")]
    Config(String),

    #[error("distribution error: {0}")]
    Distribution(String),

    #[error("figure output failed: {0}")]
    Figure(String),

    #[error("record (user {user_id}, exercise {exercise_id}): {source}")]
    Record {
        user_id: u32,
        exercise_id: u32,
        #[source]
        source: Box<GainError>,
    },

    #[error("analysis '{name}': {source}")]
    Analysis {
        name: String,
        #[source]
        source: Box<GainError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GainError {
    /// Attach the identifying fields of the record being processed
    pub fn for_record(self, user_id: u32, exercise_id: u32) -> Self {
        GainError::Record {
            user_id,
            exercise_id,
            source: Box::new(self),
        }
    }

    /// Attach the name of the comparison being run
    pub fn for_analysis(self, name: impl Into<String>) -> Self {
        GainError::Analysis {
            name: name.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error, skipping record/analysis context wrappers
    pub fn root(&self) -> &GainError {
        match self {
            GainError::Record { source, .. } | GainError::Analysis { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result type for gain/inference operations
pub type Result<T> = std::result::Result<T, GainError>;
