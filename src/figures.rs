//! Figures produced by an analysis run
//!
//! Rendering is a side effect behind [`FigureSink`]; the analysis only builds
//! [`Figure`] values. [`JsonFigureSink`] writes each figure as a JSON document
//! with the plotted data and summary statistics, ready for any plotting tool.
//! The output directory comes from an explicit [`PlotConfig`].

use crate::error::{GainError, Result};
use aprender::stats::DescriptiveStats;
use serde::Serialize;
use std::fs;
use std::path::{Component, Path, PathBuf};
use trueno::Vector;

/// Values plotted under one label
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledSample {
    pub label: String,
    pub values: Vec<f64>,
}

impl LabeledSample {
    pub fn new(label: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            label: label.into(),
            values,
        }
    }
}

/// A figure to render
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Figure {
    /// Side-by-side histograms of the two samples of a comparison, used to
    /// judge normality by eye
    ComparisonHistogram {
        file: String,
        x_label: String,
        samples: Vec<LabeledSample>,
    },
    /// Box plot of one metric per cohort
    Boxplot {
        file: String,
        y_label: String,
        y_range: (f64, f64),
        samples: Vec<LabeledSample>,
    },
    /// One bar per category
    BarChart {
        file: String,
        title: String,
        categories: Vec<String>,
        values: Vec<f64>,
    },
    /// Pretest next to posttest bar per category
    PrePostBars {
        file: String,
        title: String,
        categories: Vec<String>,
        pretest: Vec<f64>,
        posttest: Vec<f64>,
    },
}

impl Figure {
    /// Output name without extension, may contain `/` subdirectories
    pub fn file(&self) -> &str {
        match self {
            Figure::ComparisonHistogram { file, .. }
            | Figure::Boxplot { file, .. }
            | Figure::BarChart { file, .. }
            | Figure::PrePostBars { file, .. } => file,
        }
    }

    fn samples(&self) -> Vec<LabeledSample> {
        match self {
            Figure::ComparisonHistogram { samples, .. } | Figure::Boxplot { samples, .. } => {
                samples.clone()
            }
            Figure::BarChart { title, values, .. } => {
                vec![LabeledSample::new(title.clone(), values.clone())]
            }
            Figure::PrePostBars { pretest, posttest, .. } => vec![
                LabeledSample::new("Pretest", pretest.clone()),
                LabeledSample::new("Posttest", posttest.clone()),
            ],
        }
    }
}

/// Where rendered figures go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlotConfig {
    pub output_dir: PathBuf,
}

impl PlotConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

/// Consumer of figures
pub trait FigureSink {
    fn render(&mut self, figure: &Figure) -> Result<()>;
}

/// Discards every figure
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl FigureSink for NullSink {
    fn render(&mut self, _figure: &Figure) -> Result<()> {
        Ok(())
    }
}

/// Keeps figures in memory
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub figures: Vec<Figure>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Figure with the given file name, if rendered
    pub fn get(&self, file: &str) -> Option<&Figure> {
        self.figures.iter().find(|f| f.file() == file)
    }
}

impl FigureSink for MemorySink {
    fn render(&mut self, figure: &Figure) -> Result<()> {
        self.figures.push(figure.clone());
        Ok(())
    }
}

/// Five-number summary plus mean and spread of one sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub label: String,
    pub n: usize,
    pub mean: f32,
    pub stddev: f32,
    pub min: f32,
    pub q1: f32,
    pub median: f32,
    pub q3: f32,
    pub max: f32,
    pub histogram: Histogram,
}

/// Equal-width bins over `[min, max]`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    /// `counts.len() + 1` bin edges
    pub edges: Vec<f32>,
    pub counts: Vec<usize>,
}

fn figure_error(what: &str, e: impl std::fmt::Display) -> GainError {
    GainError::Figure(format!("{}: {}", what, e))
}

/// Summary statistics of a sample, `None` when it is empty
pub fn summarize(sample: &LabeledSample) -> Result<Option<SeriesSummary>> {
    if sample.values.is_empty() {
        return Ok(None);
    }
    let data: Vec<f32> = sample.values.iter().map(|&v| v as f32).collect();
    let v = Vector::from_slice(&data);

    let min = v.min().map_err(|e| figure_error("min", e))?;
    let max = v.max().map_err(|e| figure_error("max", e))?;
    let stats = DescriptiveStats::new(&v);
    let quantile = |q| {
        stats
            .quantile(q)
            .map_err(|e| figure_error("quantile", e))
    };

    Ok(Some(SeriesSummary {
        label: sample.label.clone(),
        n: data.len(),
        mean: v.mean().map_err(|e| figure_error("mean", e))?,
        stddev: v.stddev().unwrap_or(0.0),
        min,
        q1: quantile(0.25)?,
        median: quantile(0.5)?,
        q3: quantile(0.75)?,
        max,
        histogram: histogram(&data, min, max),
    }))
}

// Sturges' rule for the bin count
fn histogram(data: &[f32], min: f32, max: f32) -> Histogram {
    let width = max - min;
    if width <= 0.0 || !width.is_finite() {
        return Histogram {
            edges: vec![min, max],
            counts: vec![data.len()],
        };
    }

    let bins = (data.len() as f64).log2().ceil() as usize + 1;
    let step = width / bins as f32;
    let edges: Vec<f32> = (0..=bins).map(|i| min + step * i as f32).collect();

    let mut counts = vec![0; bins];
    for &x in data {
        let i = (((x - min) / step) as usize).min(bins - 1);
        counts[i] += 1;
    }
    Histogram { edges, counts }
}

#[derive(Serialize)]
struct FigureDocument<'a> {
    figure: &'a Figure,
    summaries: Vec<SeriesSummary>,
}

/// Writes `<output_dir>/<file>.json` per figure
#[derive(Debug, Clone)]
pub struct JsonFigureSink {
    config: PlotConfig,
    written: Vec<PathBuf>,
}

impl JsonFigureSink {
    pub fn new(config: PlotConfig) -> Self {
        Self {
            config,
            written: Vec::new(),
        }
    }

    /// Paths written so far, in render order
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn path_for(&self, file: &str) -> Result<PathBuf> {
        let relative = Path::new(file);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if file.is_empty() || escapes {
            return Err(GainError::Figure(format!(
                "figure name '{}' must be a relative path inside the output directory",
                file
            )));
        }
        Ok(self.config.output_dir.join(format!("{}.json", file)))
    }
}

impl FigureSink for JsonFigureSink {
    fn render(&mut self, figure: &Figure) -> Result<()> {
        let path = self.path_for(figure.file())?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut summaries = Vec::new();
        for sample in figure.samples() {
            summaries.extend(summarize(&sample)?);
        }

        let document = FigureDocument { figure, summaries };
        let json = serde_json::to_string_pretty(&document).map_err(|e| figure_error("serialize", e))?;
        fs::write(&path, json)?;

        tracing::debug!(path = %path.display(), "wrote figure");
        self.written.push(path);
        Ok(())
    }
}
