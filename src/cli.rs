//! CLI argument parsing for gainstat

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "gainstat")]
#[command(version)]
#[command(about = "Learning-gain metrics and adaptive hypothesis tests for pre/post-test studies", long_about = None)]
pub struct Cli {
    /// Enable debug tracing output to stderr
    #[arg(long = "debug", global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Score raw pretest/posttest tables and write the derived-record table
    Prepare(PrepareArgs),
    /// Run a study's comparisons on a derived-record table
    Analyze(AnalyzeArgs),
}

/// Built-in study preset or a study TOML file
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct StudySource {
    /// Built-in study (pre_study, main_study)
    #[arg(long = "study", value_name = "NAME")]
    pub study: Option<String>,

    /// Study configuration file
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct PrepareArgs {
    /// Pretest table (User,Exercise,Correct)
    #[arg(long = "pretest", value_name = "CSV")]
    pub pretest: PathBuf,

    /// Posttest table (User,Exercise,Correct)
    #[arg(long = "posttest", value_name = "CSV")]
    pub posttest: PathBuf,

    /// Exercises table with max points (Test,Exercise,Total)
    #[arg(long = "exercises", value_name = "CSV")]
    pub exercises: PathBuf,

    #[command(flatten)]
    pub source: StudySource,

    /// Derived-record table to write
    #[arg(short = 'o', long = "output", value_name = "CSV")]
    pub output: PathBuf,
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Derived-record table written by `prepare`
    #[arg(short = 'i', long = "input", value_name = "CSV")]
    pub input: PathBuf,

    #[command(flatten)]
    pub source: StudySource,

    /// Results table to write (type,t,p,cohens,test)
    #[arg(short = 'r', long = "results", value_name = "CSV")]
    pub results: PathBuf,

    /// Exercises table, needed by total_normalized_change analyses
    #[arg(long = "exercises", value_name = "CSV")]
    pub exercises: Option<PathBuf>,

    /// Write figure data as JSON into this directory
    #[arg(long = "figures-dir", value_name = "DIR")]
    pub figures_dir: Option<PathBuf>,

    /// Override the study's significance level
    #[arg(long = "alpha", value_name = "ALPHA")]
    pub alpha: Option<f64>,
}
