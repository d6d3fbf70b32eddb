#![no_main]

use gainstat::csv_input::{parse_derived_records, parse_score_table};
use gainstat::csv_output::DerivedCsvOutput;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let _ = parse_score_table(input);

        // Anything that parses must survive a write/reload cycle
        if let Ok(records) = parse_derived_records(input) {
            let csv = records.iter().cloned().collect::<DerivedCsvOutput>().to_csv();
            let reloaded = parse_derived_records(&csv).unwrap();
            assert_eq!(reloaded.len(), records.len());
        }
    }
});
