// Adaptive hypothesis testing for cohort comparisons
//
// A comparison checks both samples for normality (Shapiro-Wilk) and then runs
// the parametric test when both look normal, or its rank-based counterpart
// when either does not.
//
//                 | related samples        | independent samples
//   --------------+------------------------+---------------------
//   normal        | paired t-test          | two-sample t-test
//   not normal    | Wilcoxon signed-rank   | Mann-Whitney U
//
// Scientific Foundation:
// - Shapiro & Wilk (1965), Royston (1995) for the normality gate
// - Pratt (1959) for zero differences in the signed-rank test
// - Uses statrs for Student's t and normal distribution functions

mod config;
mod dispatch;
mod nonparametric;
mod normality;
mod parametric;

pub use config::{Alternative, Comparison, HypothesisConfig};
pub use dispatch::{adaptive_test, compare, HypothesisOutcome, Sample, TestKind, TestResult};
pub use nonparametric::{mann_whitney_u, wilcoxon_pratt, RankTest};
pub use normality::{shapiro_wilk, ShapiroWilk};
pub use parametric::{independent_t_test, paired_t_test, TTest};
