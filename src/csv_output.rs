//! CSV output for derived records and analysis results
//!
//! Numbers are written with `f64`'s `Display`, the shortest text that parses
//! back to the same value, so a written table reloads exactly.

use crate::record::DerivedRecord;

/// Canonical column set of a derived-record table, in order
pub const DERIVED_COLUMNS: [&str; 12] = [
    "User",
    "Exercise",
    "ExerciseSkill",
    "PretestCorrect",
    "PosttestCorrect",
    "PretestCorrectRel",
    "PosttestCorrectRel",
    "ImprovementAbs",
    "NormalizedChange",
    "NormalizedPretestCorrectRel",
    "NormalizedPosttestCorrectRel",
    "ImprovementAbsNormalizedScores",
];

/// Escape CSV field (handle commas, quotes, newlines)
pub(crate) fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Derived-record table formatter
#[derive(Debug, Default)]
pub struct DerivedCsvOutput {
    records: Vec<DerivedRecord>,
}

impl DerivedCsvOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_record(&mut self, record: DerivedRecord) {
        self.records.push(record);
    }

    fn format_record(record: &DerivedRecord) -> String {
        let fields = [
            record.user_id.to_string(),
            record.exercise_id.to_string(),
            escape_field(&record.exercise_skill),
            record.pretest_correct.to_string(),
            record.posttest_correct.to_string(),
            record.pretest_rel.to_string(),
            record.posttest_rel.to_string(),
            record.improvement_abs.to_string(),
            record.normalized_change.to_string(),
            record.normalized_pretest_rel.to_string(),
            record.normalized_posttest_rel.to_string(),
            record.improvement_abs_normalized.to_string(),
        ];
        fields.join(",")
    }

    /// Generate CSV output as string
    pub fn to_csv(&self) -> String {
        let mut output = DERIVED_COLUMNS.join(",");
        output.push('\n');

        for record in &self.records {
            output.push_str(&Self::format_record(record));
            output.push('\n');
        }

        output
    }
}

impl FromIterator<DerivedRecord> for DerivedCsvOutput {
    fn from_iter<I: IntoIterator<Item = DerivedRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

/// One row of the results table
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    /// Analysis name
    pub kind: String,
    pub t: f64,
    pub p: f64,
    pub cohens: f64,
    pub test: String,
}

/// Results table formatter (`type,t,p,cohens,test`)
#[derive(Debug, Default)]
pub struct ResultsCsvOutput {
    rows: Vec<ResultRow>,
}

impl ResultsCsvOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row(&mut self, row: ResultRow) {
        self.rows.push(row);
    }

    pub fn to_csv(&self) -> String {
        let mut output = String::from("type,t,p,cohens,test\n");
        for row in &self.rows {
            output.push_str(&format!(
                "{},{},{},{},{}\n",
                escape_field(&row.kind),
                row.t,
                row.p,
                row.cohens,
                escape_field(&row.test)
            ));
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv_input::parse_derived_records;

    fn record(skill: &str) -> DerivedRecord {
        DerivedRecord {
            user_id: 3,
            exercise_id: 2,
            exercise_skill: skill.to_string(),
            pretest_correct: 4.0,
            posttest_correct: 8.0,
            pretest_rel: 0.4,
            posttest_rel: 0.8,
            improvement_abs: 0.4,
            normalized_change: 0.4 / 0.6,
            normalized_pretest_rel: -1.2345678901234567,
            normalized_posttest_rel: 0.1,
            improvement_abs_normalized: 1.3345678901234567,
        }
    }

    #[test]
    fn test_header_is_canonical() {
        let csv = DerivedCsvOutput::new().to_csv();
        assert_eq!(
            csv,
            "User,Exercise,ExerciseSkill,PretestCorrect,PosttestCorrect,PretestCorrectRel,\
             PosttestCorrectRel,ImprovementAbs,NormalizedChange,NormalizedPretestCorrectRel,\
             NormalizedPosttestCorrectRel,ImprovementAbsNormalizedScores\n"
        );
    }

    #[test]
    fn test_record_row() {
        let mut output = DerivedCsvOutput::new();
        output.add_record(record("vlan"));
        let csv = output.to_csv();
        let row = csv.lines().nth(1).unwrap();
        assert!(row.starts_with("3,2,vlan,4,8,0.4,0.8,0.4,"));
    }

    #[test]
    fn test_written_table_reloads_exactly() {
        let records = vec![record("vlan"), record("routing, static \"v2\"")];
        let csv = records.iter().cloned().collect::<DerivedCsvOutput>().to_csv();
        assert_eq!(parse_derived_records(&csv).unwrap(), records);
    }

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"x\""), "\"say \"\"x\"\"\"");
    }

    #[test]
    fn test_results_csv() {
        let mut output = ResultsCsvOutput::new();
        output.add_row(ResultRow {
            kind: "improvement_abs".to_string(),
            t: 1.5,
            p: 0.07,
            cohens: 0.55,
            test: "unpaired-t".to_string(),
        });
        assert_eq!(
            output.to_csv(),
            "type,t,p,cohens,test\nimprovement_abs,1.5,0.07,0.55,unpaired-t\n"
        );
    }
}
