//! Allowlist CSV and configuration handling against real files

use std::io::Write;

use hypercert_engine::allowlist::{parse_csv, validate_default_supply, validate_entries};
use hypercert_engine::config::EngineConfig;
use hypercert_engine::types::DEFAULT_TOTAL_UNITS;
use hypercert_engine::U256;

#[test]
fn csv_upload_parses_and_validates_against_the_default_supply() {
    let csv = "\
address,units
0x1111111111111111111111111111111111111111,25%
0x2222222222222222222222222222222222222222,25%
0x3333333333333333333333333333333333333333,50%
";
    let entries = parse_csv(csv, *DEFAULT_TOTAL_UNITS).unwrap();
    assert_eq!(entries.len(), 3);
    validate_default_supply(&entries).unwrap();

    let quarter = *DEFAULT_TOTAL_UNITS / U256::from(4u64);
    assert_eq!(entries[0].units, quarter);
    assert_eq!(entries[2].units, quarter * U256::from(2u64));
}

#[test]
fn csv_errors_carry_line_numbers() {
    let csv = "\
0x1111111111111111111111111111111111111111,500

not-an-address,500
";
    let err = parse_csv(csv, U256::from(1000u64)).unwrap_err();
    assert!(err.to_string().contains("line 3"));
}

#[test]
fn mixed_percent_and_absolute_rows_still_need_the_exact_sum() {
    let csv = "\
0x1111111111111111111111111111111111111111,60%
0x2222222222222222222222222222222222222222,399
";
    let entries = parse_csv(csv, U256::from(1000u64)).unwrap();
    let err = validate_entries(&entries, U256::from(1000u64)).unwrap_err();
    assert!(err.to_string().contains("sum to 999"));
}

#[test]
fn config_loads_from_a_toml_file() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    write!(
        file,
        r#"
[backend]
base_url = "http://localhost:4000"
timeout_secs = 5

[chain]
id = 11155111
name = "sepolia"

[flows]
close_delay_ms = 500
skip_revalidation = true
"#
    )
    .unwrap();

    let config = EngineConfig::from_file(file.path().to_str().unwrap()).unwrap();
    assert_eq!(config.backend.base_url, "http://localhost:4000");
    assert_eq!(config.backend.timeout_secs, 5);
    assert_eq!(config.chain.id, 11155111);
    assert_eq!(config.chain.name, "sepolia");
    assert_eq!(config.flows.close_delay_ms, 500);
    assert!(config.flows.skip_revalidation);
}

#[test]
fn missing_config_file_is_an_error() {
    assert!(EngineConfig::from_file("/nonexistent/engine.toml").is_err());
}
