//! gainstat - Learning-gain metrics and adaptive hypothesis testing
//!
//! This library turns pre-test/post-test exercise scores into relative scores,
//! absolute and normalized learning gains and z-scores, splits the records
//! into two cohorts and compares them, choosing between parametric and
//! rank-based tests with a Shapiro-Wilk normality check.
//!
//! Pipeline: raw tables → [`scoring`] → [`gain`] → [`cohort`] →
//! [`hypothesis`] (+ [`effect_size`]) → [`report`].

pub mod cli;
pub mod cohort;
pub mod csv_input;
pub mod csv_output;
pub mod effect_size;
pub mod error;
pub mod figures;
pub mod gain;
pub mod hypothesis;
pub mod metrics;
pub mod preprocess;
pub mod record;
pub mod report;
pub mod scoring;
pub mod study;

pub use error::{GainError, Result};
