// Analysis run: derived records in, one result row per comparison out
//
// 1. Drop excluded users, split the rest into cohorts A and B
// 2. Per-exercise and per-skill bar charts of posttest score and normalized
//    change, and per-user pretest/posttest bars when the study asks for them
// 3. Per [[analysis]] entry: draw both samples, emit a comparison histogram,
//    run the adaptive test and Cohen's d
// 4. Box plot of normalized change per cohort
//
// Figures go to the caller's sink; nothing here touches the filesystem.

use crate::cohort::{split, Cohort};
use crate::csv_output::{ResultRow, ResultsCsvOutput};
use crate::error::Result;
use crate::figures::{Figure, FigureSink, LabeledSample};
use crate::hypothesis::{compare, Alternative, Sample, TestResult};
use crate::metrics::{exercise_means, extract_paired, extract_sample, Granularity, Metric};
use crate::record::DerivedRecord;
use crate::scoring::TaskMapping;
use crate::study::{AnalysisSpec, StudyConfig};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

/// Size of one cohort after exclusion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CohortSummary {
    pub name: String,
    pub records: usize,
    pub users: usize,
}

impl From<&Cohort> for CohortSummary {
    fn from(cohort: &Cohort) -> Self {
        Self {
            name: cohort.name.clone(),
            records: cohort.len(),
            users: cohort.users().len(),
        }
    }
}

/// Result of one `[[analysis]]` entry
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonOutcome {
    pub name: String,
    pub metric: Metric,
    pub granularity: Granularity,
    pub paired: bool,
    pub alternative: Alternative,
    pub n_a: usize,
    pub n_b: usize,
    pub result: TestResult,
}

impl ComparisonOutcome {
    pub fn to_row(&self) -> ResultRow {
        ResultRow {
            kind: self.name.clone(),
            t: self.result.statistic,
            p: self.result.p_value,
            cohens: self.result.effect_size,
            test: self.result.test.to_string(),
        }
    }
}

/// Everything one analysis run produced apart from figures
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub study: String,
    pub significance_level: f64,
    pub excluded_records: usize,
    pub cohort_a: CohortSummary,
    pub cohort_b: CohortSummary,
    pub outcomes: Vec<ComparisonOutcome>,
}

impl AnalysisReport {
    pub fn rows(&self) -> Vec<ResultRow> {
        self.outcomes.iter().map(ComparisonOutcome::to_row).collect()
    }

    /// Results table (`type,t,p,cohens,test`)
    pub fn to_csv(&self) -> String {
        let mut output = ResultsCsvOutput::new();
        for row in self.rows() {
            output.add_row(row);
        }
        output.to_csv()
    }

    /// Generate human-readable report
    pub fn to_report_string(&self) -> String {
        let alpha = self.significance_level;
        let significant = self
            .outcomes
            .iter()
            .filter(|o| o.result.is_significant(alpha))
            .count();

        let mut report = String::new();
        report.push_str(&format!("Study: {}\n", self.study));
        report.push_str(&format!(
            "Significance level: {} ({}% confidence)\n",
            alpha,
            (1.0 - alpha) * 100.0
        ));
        for cohort in [&self.cohort_a, &self.cohort_b] {
            report.push_str(&format!(
                "Cohort '{}': {} records from {} users\n",
                cohort.name, cohort.records, cohort.users
            ));
        }
        if self.excluded_records > 0 {
            report.push_str(&format!("Excluded records: {}\n", self.excluded_records));
        }
        report.push_str(&format!(
            "\n{} of {} comparisons significant\n\n",
            significant,
            self.outcomes.len()
        ));

        for o in &self.outcomes {
            let r = &o.result;
            let marker = if r.is_significant(alpha) { "✅" } else { "➖" };
            report.push_str(&format!(
                "{} {} ({} per {}, {}, alternative: {})\n",
                marker,
                o.name,
                o.metric,
                o.granularity,
                if o.paired { "paired" } else { "independent" },
                o.alternative
            ));
            report.push_str(&format!(
                "   test: {}  statistic: {:.4}  p: {:.4}  cohen's d: {:.4}\n",
                r.test, r.statistic, r.p_value, r.effect_size
            ));
            report.push_str(&format!(
                "   Shapiro-Wilk p: {:.4} (n = {}), {:.4} (n = {})\n",
                r.normality_a.p_value, o.n_a, r.normality_b.p_value, o.n_b
            ));
        }

        report
    }
}

fn slug(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

// Skills in configuration order, each listed once
fn skill_order(study: &StudyConfig) -> Vec<&str> {
    let mut order: Vec<&str> = Vec::new();
    for skill in &study.skills {
        if !order.contains(&skill.as_str()) {
            order.push(skill);
        }
    }
    order
}

// Position in the study's skill list, unknown tags last
fn skill_rank<'a>(order: &[&str], skill: &'a str) -> (usize, &'a str) {
    let position = order.iter().position(|s| *s == skill).unwrap_or(order.len());
    (position, skill)
}

fn bar_charts(
    a: &Cohort,
    b: &Cohort,
    study: &StudyConfig,
    sink: &mut dyn FigureSink,
) -> Result<()> {
    let order = skill_order(study);
    for metric in [Metric::PosttestRel, Metric::NormalizedChange] {
        for cohort in [a, b] {
            let means = exercise_means(cohort, metric);
            let categories = means
                .iter()
                .map(|&(id, _)| match study.skill_for(id) {
                    Ok(skill) => format!("{} ({})", id, skill),
                    Err(_) => id.to_string(),
                })
                .collect();

            // per-exercise means averaged per skill
            let mut per_skill: BTreeMap<(usize, &str), Vec<f64>> = BTreeMap::new();
            for &(id, value) in &means {
                match study.skill_for(id) {
                    Ok(skill) => per_skill.entry(skill_rank(&order, skill)).or_default().push(value),
                    Err(_) => tracing::debug!(exercise_id = id, "no skill tag, left out of skill bars"),
                }
            }

            sink.render(&Figure::BarChart {
                file: format!("barplots/{}_{}", slug(&cohort.name), metric),
                title: format!("{}: {}", cohort.name, metric),
                categories,
                values: means.iter().map(|&(_, v)| v).collect(),
            })?;
            sink.render(&Figure::BarChart {
                file: format!("barplots/{}_{}_per_skill", slug(&cohort.name), metric),
                title: format!("{}: {} per skill", cohort.name, metric),
                categories: per_skill.keys().map(|(_, skill)| skill.to_string()).collect(),
                values: per_skill.into_values().map(|v| v.mean()).collect(),
            })?;
        }
    }
    Ok(())
}

// Per user: mean pretest and posttest score per skill
fn pre_post_bars(
    records: &[DerivedRecord],
    study: &StudyConfig,
    sink: &mut dyn FigureSink,
) -> Result<()> {
    let order = skill_order(study);
    let mut per_user: BTreeMap<u32, BTreeMap<(usize, &str), (Vec<f64>, Vec<f64>)>> = BTreeMap::new();
    for r in records {
        let (pre, post) = per_user
            .entry(r.user_id)
            .or_default()
            .entry(skill_rank(&order, &r.exercise_skill))
            .or_default();
        pre.push(r.pretest_rel);
        post.push(r.posttest_rel);
    }

    for (user_id, skills) in per_user {
        let categories: Vec<String> = skills.keys().map(|(_, skill)| skill.to_string()).collect();
        let (pretest, posttest): (Vec<f64>, Vec<f64>) = skills
            .into_values()
            .map(|(pre, post)| (pre.mean(), post.mean()))
            .unzip();
        sink.render(&Figure::PrePostBars {
            file: format!("users/user_{}", user_id),
            title: format!("User {}", user_id),
            categories,
            pretest,
            posttest,
        })?;
    }
    Ok(())
}

fn run_comparison(
    spec: &AnalysisSpec,
    a: &Cohort,
    b: &Cohort,
    mapping: Option<&TaskMapping>,
    study: &StudyConfig,
    sink: &mut dyn FigureSink,
) -> Result<ComparisonOutcome> {
    let (sample_a, sample_b) = if spec.paired {
        extract_paired(a, b, spec.metric, spec.granularity, mapping)?
    } else {
        (
            extract_sample(a, spec.metric, spec.granularity, mapping)?,
            extract_sample(b, spec.metric, spec.granularity, mapping)?,
        )
    };

    sink.render(&Figure::ComparisonHistogram {
        file: format!("histograms/{}", spec.name),
        x_label: spec.metric.to_string(),
        samples: vec![
            LabeledSample::new(a.name.clone(), sample_a.clone()),
            LabeledSample::new(b.name.clone(), sample_b.clone()),
        ],
    })?;

    let result = compare(
        Sample::new(&a.name, &sample_a),
        Sample::new(&b.name, &sample_b),
        &spec.comparison(),
        &study.hypothesis_config(),
    )?;

    Ok(ComparisonOutcome {
        name: spec.name.clone(),
        metric: spec.metric,
        granularity: spec.granularity,
        paired: spec.paired,
        alternative: spec.alternative,
        n_a: sample_a.len(),
        n_b: sample_b.len(),
        result,
    })
}

/// Run every configured comparison of a study
///
/// `mapping` is only needed by analyses on
/// [`Metric::TotalNormalizedChange`]. A failing comparison fails the run with
/// its analysis name attached.
pub fn run_analysis(
    records: &[DerivedRecord],
    mapping: Option<&TaskMapping>,
    study: &StudyConfig,
    sink: &mut dyn FigureSink,
) -> Result<AnalysisReport> {
    study.validate()?;

    let kept = study.exclusion.apply(records);
    let p = &study.partition;
    let (a, b) = split(&kept, p.rule, &p.cohort_a, &p.cohort_b);

    bar_charts(&a, &b, study, sink)?;
    if study.pre_post_bars {
        pre_post_bars(&kept, study, sink)?;
    }

    let mut outcomes = Vec::with_capacity(study.analysis.len());
    for spec in &study.analysis {
        let outcome = run_comparison(spec, &a, &b, mapping, study, sink)
            .map_err(|e| e.for_analysis(spec.name.as_str()))?;
        outcomes.push(outcome);
    }

    sink.render(&Figure::Boxplot {
        file: "boxplot_normalized_change".to_string(),
        y_label: "Normalized change".to_string(),
        y_range: (-1.1, 1.1),
        samples: [&a, &b]
            .into_iter()
            .map(|c| LabeledSample::new(c.name.clone(), c.records.iter().map(|r| r.normalized_change).collect()))
            .collect(),
    })?;

    Ok(AnalysisReport {
        study: study.name.clone(),
        significance_level: study.significance_level,
        excluded_records: records.len() - kept.len(),
        cohort_a: CohortSummary::from(&a),
        cohort_b: CohortSummary::from(&b),
        outcomes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GainError;
    use crate::figures::{MemorySink, NullSink};

    fn record(user_id: u32, exercise_id: u32, post: f64) -> DerivedRecord {
        DerivedRecord {
            user_id,
            exercise_id,
            exercise_skill: if exercise_id % 2 == 1 { "vlan" } else { "routing" }.to_string(),
            pretest_correct: 2.0,
            posttest_correct: post * 10.0,
            pretest_rel: 0.2,
            posttest_rel: post,
            improvement_abs: post - 0.2,
            normalized_change: (post - 0.2) / 0.8,
            normalized_pretest_rel: 0.0,
            normalized_posttest_rel: 0.0,
            improvement_abs_normalized: 0.0,
        }
    }

    fn study() -> StudyConfig {
        StudyConfig::from_toml_str(
            r#"
            name = "pilot"
            skills = ["vlan", "routing"]

            [exclusion]
            name = "pilot-outliers"
            version = 1
            users = [99]

            [partition]
            rule = "user-parity"
            cohort_a = "Recommendation System"
            cohort_b = "Control"

            [[analysis]]
            type = "posttest"
            metric = "posttest_rel"

            [[analysis]]
            type = "spread"
            metric = "skill_spread"
            granularity = "user"
            alternative = "less"
            "#,
        )
        .unwrap()
    }

    // Odd users score higher and more evenly across skills
    fn records() -> Vec<DerivedRecord> {
        let mut records = Vec::new();
        for user in 1..=12u32 {
            let bump = f64::from(user) * 0.004;
            if user % 2 == 1 {
                records.push(record(user, 1, 0.70 + bump));
                records.push(record(user, 2, 0.66 + bump * 1.5));
            } else {
                records.push(record(user, 1, 0.45 + bump));
                records.push(record(user, 2, 0.25 + bump * 2.5));
            }
        }
        records.push(record(99, 1, 0.0));
        records
    }

    #[test]
    fn test_report_rows_follow_config_order() {
        let report = run_analysis(&records(), None, &study(), &mut NullSink).unwrap();
        let names: Vec<String> = report.rows().into_iter().map(|r| r.kind).collect();
        assert_eq!(names, ["posttest", "spread"]);
        assert_eq!(report.excluded_records, 1);
        assert_eq!(report.cohort_a.users, 6);
        assert_eq!(report.cohort_b.records, 12);
    }

    #[test]
    fn test_directions() {
        let report = run_analysis(&records(), None, &study(), &mut NullSink).unwrap();
        let posttest = &report.outcomes[0].result;
        assert!(posttest.statistic > 0.0);
        assert!(posttest.p_value < 0.01);
        assert!(posttest.effect_size > 0.0);

        let spread = &report.outcomes[1].result;
        assert_eq!(report.outcomes[1].n_a, 6);
        assert!(spread.effect_size < 0.0);
        assert!(spread.p_value < 0.01);
    }

    #[test]
    fn test_figures_emitted() {
        let mut sink = MemorySink::new();
        run_analysis(&records(), None, &study(), &mut sink).unwrap();

        // 2 metrics x 2 cohorts x (per exercise, per skill) bar charts,
        // 2 histograms, 1 box plot
        assert_eq!(sink.figures.len(), 11);
        assert!(sink.get("histograms/posttest").is_some());
        assert!(sink.get("barplots/recommendation_system_posttest_rel").is_some());
        assert!(sink.get("users/user_1").is_none());
        match sink.get("boxplot_normalized_change") {
            Some(Figure::Boxplot { samples, .. }) => {
                assert_eq!(samples.len(), 2);
                assert_eq!(samples[0].values.len(), 12);
            }
            other => panic!("unexpected figure {:?}", other),
        }
    }

    #[test]
    fn test_skill_bars_average_exercise_means() {
        let mut study = study();
        study.skills = vec!["vlan".to_string(), "vlan".to_string(), "routing".to_string()];
        let mut records = records();
        for user in 1..=12u32 {
            records.push(record(user, 3, 0.5));
        }

        let mut sink = MemorySink::new();
        run_analysis(&records, None, &study, &mut sink).unwrap();

        match sink.get("barplots/control_posttest_rel_per_skill") {
            Some(Figure::BarChart { categories, values, .. }) => {
                assert_eq!(categories, &["vlan", "routing"]);
                // exercise means 0.45 + 0.028 and 0.25 + 0.07 share the vlan bar
                assert!((values[0] - (0.478 + 0.32) / 2.0).abs() < 1e-9);
                assert!((values[1] - 0.5).abs() < 1e-12);
            }
            other => panic!("unexpected figure {:?}", other),
        }
    }

    #[test]
    fn test_pre_post_bars_per_kept_user() {
        let mut study = study();
        study.pre_post_bars = true;

        let mut sink = MemorySink::new();
        run_analysis(&records(), None, &study, &mut sink).unwrap();

        assert_eq!(sink.figures.len(), 11 + 12);
        assert!(sink.get("users/user_99").is_none());
        match sink.get("users/user_2") {
            Some(Figure::PrePostBars {
                categories,
                pretest,
                posttest,
                ..
            }) => {
                assert_eq!(categories, &["vlan", "routing"]);
                assert_eq!(pretest, &[0.2, 0.2]);
                assert!((posttest[0] - 0.458).abs() < 1e-12);
                assert!((posttest[1] - 0.27).abs() < 1e-12);
            }
            other => panic!("unexpected figure {:?}", other),
        }
    }

    #[test]
    fn test_paired_analysis_rejects_users_with_gaps() {
        let study = StudyConfig::from_toml_str(
            r#"
            name = "within"
            skills = ["vlan", "routing", "vlan", "routing"]

            [partition]
            rule = "user-exercise-parity"
            cohort_a = "Trained"
            cohort_b = "Untrained"

            [[analysis]]
            type = "normalized_change"
            metric = "normalized_change"
            paired = true
            alternative = "greater"
            "#,
        )
        .unwrap();

        // both cohorts still hold 7 records each
        let records: Vec<DerivedRecord> = [1u32, 3, 5, 7]
            .into_iter()
            .flat_map(|user| {
                (1..=4u32).map(move |exercise| {
                    record(user, exercise, 0.3 + 0.1 * f64::from(exercise) + 0.01 * f64::from(user))
                })
            })
            .filter(|r| r.key() != (1, 4) && r.key() != (3, 1))
            .collect();

        let err = run_analysis(&records, None, &study, &mut NullSink).unwrap_err();
        assert!(err.to_string().starts_with("analysis 'normalized_change'"));
        assert!(matches!(
            err.root(),
            GainError::UnpairedUser {
                user_id: 1,
                len_a: 1,
                len_b: 2
            }
        ));
    }

    #[test]
    fn test_csv_and_text() {
        let report = run_analysis(&records(), None, &study(), &mut NullSink).unwrap();
        let csv = report.to_csv();
        assert!(csv.starts_with("type,t,p,cohens,test\nposttest,"));
        assert_eq!(csv.lines().count(), 3);

        let text = report.to_report_string();
        assert!(text.contains("Study: pilot"));
        assert!(text.contains("2 of 2 comparisons significant"));
        assert!(text.contains("Cohort 'Control': 12 records from 6 users"));
    }

    #[test]
    fn test_failure_names_analysis() {
        let mut study = study();
        study.analysis.truncate(1);
        study.analysis[0].metric = Metric::TotalNormalizedChange;
        study.analysis[0].granularity = Granularity::User;

        let err = run_analysis(&records(), None, &study, &mut NullSink).unwrap_err();
        assert!(err.to_string().starts_with("analysis 'posttest'"));
        assert!(matches!(err.root(), GainError::Config(_)));
    }

    #[test]
    fn test_empty_cohort_is_reported() {
        let only_odd: Vec<DerivedRecord> = records().into_iter().filter(|r| r.user_id % 2 == 1).collect();
        let err = run_analysis(&only_odd, None, &study(), &mut NullSink).unwrap_err();
        assert!(matches!(err.root(), GainError::EmptySample { .. }));
    }
}
