//! CSV input: raw score tables, the exercises table, derived-record tables
//!
//! Records are read with the `csv` crate: a header row, comma separators,
//! double-quoted fields with `""` escapes. Header names are trimmed, blank
//! lines are skipped and a UTF-8 BOM is ignored. Columns are looked up by
//! header name, so their order is free.

use crate::csv_output::DERIVED_COLUMNS;
use crate::error::{GainError, Result};
use crate::preprocess::ScoreRow;
use crate::record::{DerivedRecord, TestPhase};
use crate::scoring::MappingRow;
use std::str::FromStr;

/// A parsed CSV document
#[derive(Debug, Clone, PartialEq)]
pub struct CsvTable {
    pub header: Vec<String>,
    /// Data rows with the 1-based line each starts on
    pub rows: Vec<(usize, Vec<String>)>,
}

impl CsvTable {
    /// Parse CSV text with a header row
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(text.as_bytes());

        let header: Vec<String> = reader
            .headers()
            .map_err(csv_error)?
            .iter()
            .map(String::from)
            .collect();
        if header.is_empty() {
            return Err(GainError::Parse {
                line: 1,
                message: "missing header row".to_string(),
            });
        }

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result.map_err(csv_error)?;
            let line = record.position().map_or(0, |p| p.line() as usize);
            if record.len() == 1 && record[0].trim().is_empty() {
                continue;
            }
            if record.len() != header.len() {
                return Err(GainError::Parse {
                    line,
                    message: format!("expected {} fields, found {}", header.len(), record.len()),
                });
            }
            rows.push((line, record.iter().map(String::from).collect()));
        }

        Ok(Self { header, rows })
    }

    /// Index of a named column
    pub fn column(&self, name: &str) -> Result<usize> {
        self.header
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| GainError::Parse {
                line: 1,
                message: format!("missing column '{}'", name),
            })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn csv_error(err: csv::Error) -> GainError {
    GainError::Parse {
        line: err.position().map_or(0, |p| p.line() as usize),
        message: err.to_string(),
    }
}

fn parse_field<T>(value: &str, line: usize, column: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| GainError::Parse {
        line,
        message: format!("column '{}': cannot parse '{}': {}", column, value, e),
    })
}

// Identifiers exported by spreadsheet tools sometimes come out as "3.0"
fn parse_id(value: &str, line: usize, column: &str) -> Result<u32> {
    if let Ok(id) = value.trim().parse::<u32>() {
        return Ok(id);
    }
    let float: f64 = parse_field(value, line, column)?;
    if float.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&float) {
        Ok(float as u32)
    } else {
        Err(GainError::Parse {
            line,
            message: format!("column '{}': '{}' is not an id", column, value),
        })
    }
}

/// Parse a pretest or posttest table (`User,Exercise,Correct`)
pub fn parse_score_table(text: &str) -> Result<Vec<ScoreRow>> {
    let table = CsvTable::parse(text)?;
    let user = table.column("User")?;
    let exercise = table.column("Exercise")?;
    let correct = table.column("Correct")?;

    table
        .rows
        .iter()
        .map(|(line, f)| {
            Ok(ScoreRow {
                user_id: parse_id(&f[user], *line, "User")?,
                exercise_id: parse_id(&f[exercise], *line, "Exercise")?,
                correct: parse_field(&f[correct], *line, "Correct")?,
            })
        })
        .collect()
}

/// Parse the exercises table (`Test,Exercise,Total`)
///
/// `Test` 1 is the pretest, 2 the posttest.
pub fn parse_exercises_table(text: &str) -> Result<Vec<MappingRow>> {
    let table = CsvTable::parse(text)?;
    let test = table.column("Test")?;
    let exercise = table.column("Exercise")?;
    let total = table.column("Total")?;

    table
        .rows
        .iter()
        .map(|(line, f)| {
            let n = parse_id(&f[test], *line, "Test")?;
            let phase = TestPhase::from_test_number(n).ok_or_else(|| GainError::Parse {
                line: *line,
                message: format!("column 'Test': expected 1 or 2, found {}", n),
            })?;
            Ok(MappingRow {
                phase,
                exercise_id: parse_id(&f[exercise], *line, "Exercise")?,
                max_points: parse_id(&f[total], *line, "Total")?,
            })
        })
        .collect()
}

/// Parse a derived-record table written by [`crate::csv_output::DerivedCsvOutput`]
pub fn parse_derived_records(text: &str) -> Result<Vec<DerivedRecord>> {
    let table = CsvTable::parse(text)?;
    let mut idx = [0usize; DERIVED_COLUMNS.len()];
    for (slot, name) in idx.iter_mut().zip(DERIVED_COLUMNS) {
        *slot = table.column(name)?;
    }

    table
        .rows
        .iter()
        .map(|(line, f)| {
            let line = *line;
            let num = |i: usize| parse_field::<f64>(&f[idx[i]], line, DERIVED_COLUMNS[i]);
            Ok(DerivedRecord {
                user_id: parse_id(&f[idx[0]], line, DERIVED_COLUMNS[0])?,
                exercise_id: parse_id(&f[idx[1]], line, DERIVED_COLUMNS[1])?,
                exercise_skill: f[idx[2]].clone(),
                pretest_correct: num(3)?,
                posttest_correct: num(4)?,
                pretest_rel: num(5)?,
                posttest_rel: num(6)?,
                improvement_abs: num(7)?,
                normalized_change: num(8)?,
                normalized_pretest_rel: num(9)?,
                normalized_posttest_rel: num(10)?,
                improvement_abs_normalized: num(11)?,
            })
        })
        .collect()
}
