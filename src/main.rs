use anyhow::{Context, Result};
use clap::Parser;
use gainstat::cli::{AnalyzeArgs, Cli, Command, PrepareArgs, StudySource};
use gainstat::csv_input::{parse_derived_records, parse_exercises_table, parse_score_table};
use gainstat::csv_output::DerivedCsvOutput;
use gainstat::figures::{FigureSink, JsonFigureSink, NullSink, PlotConfig};
use gainstat::preprocess::prepare;
use gainstat::report::run_analysis;
use gainstat::scoring::TaskMapping;
use gainstat::study::StudyConfig;
use std::fs;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn load_study(source: &StudySource, alpha: Option<f64>) -> Result<StudyConfig> {
    let study = match (&source.study, &source.config) {
        (Some(name), _) => StudyConfig::preset(name)?,
        (None, Some(path)) => StudyConfig::from_file(path)
            .with_context(|| format!("Invalid study configuration {}", path.display()))?,
        (None, None) => anyhow::bail!("either --study or --config is required"),
    };

    match alpha {
        Some(alpha) => Ok(study.with_significance_level(alpha)?),
        None => Ok(study),
    }
}

fn load_mapping(path: &Path) -> Result<TaskMapping> {
    let rows = parse_exercises_table(&read_file(path)?)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(TaskMapping::from_rows(rows)?)
}

fn run_prepare(args: PrepareArgs) -> Result<()> {
    let study = load_study(&args.source, None)?;
    let pretest = parse_score_table(&read_file(&args.pretest)?)
        .with_context(|| format!("Failed to parse {}", args.pretest.display()))?;
    let posttest = parse_score_table(&read_file(&args.posttest)?)
        .with_context(|| format!("Failed to parse {}", args.posttest.display()))?;
    let mapping = load_mapping(&args.exercises)?;

    let records = prepare(&pretest, &posttest, &mapping, &study)
        .with_context(|| format!("Failed to prepare study '{}'", study.name))?;
    let count = records.len();

    let csv = records.into_iter().collect::<DerivedCsvOutput>().to_csv();
    fs::write(&args.output, csv)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    println!("Wrote {} records to {}", count, args.output.display());
    Ok(())
}

fn run_analyze(args: AnalyzeArgs) -> Result<()> {
    let study = load_study(&args.source, args.alpha)?;
    let records = parse_derived_records(&read_file(&args.input)?)
        .with_context(|| format!("Failed to parse {}", args.input.display()))?;
    let mapping = args.exercises.as_deref().map(load_mapping).transpose()?;

    let mut json_sink;
    let mut null_sink = NullSink;
    let sink: &mut dyn FigureSink = match &args.figures_dir {
        Some(dir) => {
            json_sink = JsonFigureSink::new(PlotConfig::new(dir));
            &mut json_sink
        }
        None => &mut null_sink,
    };

    let report = run_analysis(&records, mapping.as_ref(), &study, sink)
        .with_context(|| format!("Analysis of study '{}' failed", study.name))?;

    fs::write(&args.results, report.to_csv())
        .with_context(|| format!("Failed to write {}", args.results.display()))?;

    print!("{}", report.to_report_string());
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();

    // Initialize tracing (--debug enables everything)
    init_tracing(args.debug);

    match args.command {
        Command::Prepare(prepare_args) => run_prepare(prepare_args),
        Command::Analyze(analyze_args) => run_analyze(analyze_args),
    }
}
