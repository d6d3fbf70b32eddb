#![no_main]

use gainstat::study::StudyConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Parsing and validation should never panic
        let _ = StudyConfig::from_toml_str(input);
    }
});
