// CLI integration tests: prepare + analyze through the binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn fixture(study: &str, file: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(study)
        .join(file)
}

fn prepare_cmd(study: &str, output: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("gainstat").unwrap();
    cmd.arg("prepare")
        .arg("--pretest")
        .arg(fixture(study, "pretest.csv"))
        .arg("--posttest")
        .arg(fixture(study, "posttest.csv"))
        .arg("--exercises")
        .arg(fixture(study, "exercises.csv"))
        .arg("--study")
        .arg(study)
        .arg("-o")
        .arg(output);
    cmd
}

// ============================================================================
// prepare
// ============================================================================

#[test]
fn test_prepare_writes_derived_table() {
    let tmp = TempDir::new().unwrap();
    let derived = tmp.path().join("derived.csv");

    prepare_cmd("main_study", &derived)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 60 records"));

    let content = fs::read_to_string(&derived).unwrap();
    let mut lines = content.lines();
    let header = lines.next().unwrap();
    assert!(header.starts_with("User,Exercise,ExerciseSkill,"));
    assert!(header.contains("NormalizedChange"));
    assert_eq!(lines.count(), 60);
}

#[test]
fn test_prepare_rejects_unknown_study() {
    let tmp = TempDir::new().unwrap();
    let derived = tmp.path().join("derived.csv");

    prepare_cmd("post_study", &derived)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown study 'post_study'"));
    assert!(!derived.exists());
}

#[test]
fn test_prepare_reports_range_violation() {
    let tmp = TempDir::new().unwrap();
    let posttest = tmp.path().join("posttest.csv");
    let original = fs::read_to_string(fixture("main_study", "posttest.csv")).unwrap();
    // exercise 2 is worth 3 points
    let corrupted = original
        .lines()
        .map(|line| if line.starts_with("4,2,") { "4,2,7" } else { line })
        .collect::<Vec<_>>()
        .join("\n");
    fs::write(&posttest, corrupted).unwrap();

    let mut cmd = Command::cargo_bin("gainstat").unwrap();
    cmd.arg("prepare")
        .arg("--pretest")
        .arg(fixture("main_study", "pretest.csv"))
        .arg("--posttest")
        .arg(&posttest)
        .arg("--exercises")
        .arg(fixture("main_study", "exercises.csv"))
        .arg("--study")
        .arg("main_study")
        .arg("-o")
        .arg(tmp.path().join("derived.csv"));

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("user 4, exercise 2"));
}

#[test]
fn test_prepare_requires_study_source() {
    let mut cmd = Command::cargo_bin("gainstat").unwrap();
    cmd.arg("prepare")
        .arg("--pretest")
        .arg("pre.csv")
        .arg("--posttest")
        .arg("post.csv")
        .arg("--exercises")
        .arg("ex.csv")
        .arg("-o")
        .arg("out.csv");

    cmd.assert().failure();
}

// ============================================================================
// analyze
// ============================================================================

#[test]
fn test_prepare_then_analyze_main_study() {
    let tmp = TempDir::new().unwrap();
    let derived = tmp.path().join("derived.csv");
    let results = tmp.path().join("results.csv");
    let figures = tmp.path().join("img");

    prepare_cmd("main_study", &derived).assert().success();

    let mut cmd = Command::cargo_bin("gainstat").unwrap();
    cmd.arg("analyze")
        .arg("-i")
        .arg(&derived)
        .arg("--study")
        .arg("main_study")
        .arg("-r")
        .arg(&results)
        .arg("--figures-dir")
        .arg(&figures);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Study: main_study"))
        .stdout(predicate::str::contains("Cohort 'Recommendation System': 30 records from 6 users"))
        .stdout(predicate::str::contains("difference (skill_spread per user"));

    let table = fs::read_to_string(&results).unwrap();
    assert!(table.starts_with("type,t,p,cohens,test\n"));
    assert_eq!(table.lines().count(), 4);

    assert!(figures.join("boxplot_normalized_change.json").exists());
    assert!(figures.join("histograms/improvement_abs.json").exists());
    assert!(figures.join("barplots/recommendation_system_posttest_rel.json").exists());

    let doc: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(figures.join("histograms/difference.json")).unwrap()).unwrap();
    assert_eq!(doc["figure"]["kind"], "comparison_histogram");
    assert_eq!(doc["summaries"][0]["n"], 6);
}

#[test]
fn test_pre_study_needs_exercises_for_total_change() {
    let tmp = TempDir::new().unwrap();
    let derived = tmp.path().join("derived.csv");
    let results = tmp.path().join("results.csv");

    prepare_cmd("pre_study", &derived).assert().success();

    let analyze = |with_exercises: bool| {
        let mut cmd = Command::cargo_bin("gainstat").unwrap();
        cmd.arg("analyze")
            .arg("--input")
            .arg(&derived)
            .arg("--study")
            .arg("pre_study")
            .arg("--results")
            .arg(&results);
        if with_exercises {
            cmd.arg("--exercises").arg(fixture("pre_study", "exercises.csv"));
        }
        cmd
    };

    analyze(false)
        .assert()
        .failure()
        .stderr(predicate::str::contains("analysis 'normalized_change'"));

    analyze(true)
        .assert()
        .success()
        .stdout(predicate::str::contains("improvement_abs_skill"));
    assert_eq!(fs::read_to_string(&results).unwrap().lines().count(), 6);
}

#[test]
fn test_analyze_with_custom_config_and_alpha() {
    let tmp = TempDir::new().unwrap();
    let derived = tmp.path().join("derived.csv");
    let results = tmp.path().join("results.csv");
    let config = tmp.path().join("study.toml");

    prepare_cmd("main_study", &derived).assert().success();
    fs::write(
        &config,
        r#"
name = "posttest-only"
skills = ["a", "b", "c", "d", "e"]

[partition]
rule = "user-parity"
cohort_a = "Odd"
cohort_b = "Even"

[[analysis]]
type = "posttest"
metric = "posttest_rel"
"#,
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("gainstat").unwrap();
    cmd.arg("analyze")
        .arg("-i")
        .arg(&derived)
        .arg("--config")
        .arg(&config)
        .arg("-r")
        .arg(&results)
        .arg("--alpha")
        .arg("0.1");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Significance level: 0.1"))
        .stdout(predicate::str::contains("Cohort 'Odd'"));
}

#[test]
fn test_analyze_rejects_invalid_alpha() {
    let tmp = TempDir::new().unwrap();
    let derived = tmp.path().join("derived.csv");
    prepare_cmd("main_study", &derived).assert().success();

    let mut cmd = Command::cargo_bin("gainstat").unwrap();
    cmd.arg("analyze")
        .arg("-i")
        .arg(&derived)
        .arg("--study")
        .arg("main_study")
        .arg("-r")
        .arg(tmp.path().join("results.csv"))
        .arg("--alpha")
        .arg("1.5");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("invalid study configuration"));
}

#[test]
fn test_analyze_missing_input_file() {
    let tmp = TempDir::new().unwrap();

    let mut cmd = Command::cargo_bin("gainstat").unwrap();
    cmd.arg("analyze")
        .arg("-i")
        .arg(tmp.path().join("nope.csv"))
        .arg("--study")
        .arg("main_study")
        .arg("-r")
        .arg(tmp.path().join("results.csv"));

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read"));
}

#[test]
fn test_analyze_reports_unreadable_config() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("missing.toml");

    let mut cmd = Command::cargo_bin("gainstat").unwrap();
    cmd.arg("analyze")
        .arg("-i")
        .arg(tmp.path().join("derived.csv"))
        .arg("--config")
        .arg(&config)
        .arg("-r")
        .arg(tmp.path().join("results.csv"));

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid study configuration"))
        .stderr(predicate::str::contains("missing.toml"));
}
