//! Allowlist parsing and validation
//!
//! An allowlist allocates a hypercert's full unit supply across claimant
//! addresses. Entries come from manual form input or a CSV upload; both paths
//! go through [`validate_entries`], which enforces the exact-sum invariant
//! against [`crate::types::DEFAULT_TOTAL_UNITS`] before anything is sent to
//! the backend for pinning. After upload the list is immutable.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

use crate::errors::EngineError;
use crate::types::DEFAULT_TOTAL_UNITS;

/// One claimant allocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowlistEntry {
    pub address: Address,
    pub units: U256,
}

/// Validate a complete allowlist against a fixed total supply.
///
/// Rejects empty lists, zero-unit entries, duplicate addresses, and any sum
/// that is not exactly `total_units`. Both undershoot and overshoot are
/// reported with the actual sum so the user can fix their allocation.
pub fn validate_entries(entries: &[AllowlistEntry], total_units: U256) -> Result<(), EngineError> {
    if entries.is_empty() {
        return Err(EngineError::validation("allowlist has no entries"));
    }

    let mut seen = HashSet::with_capacity(entries.len());
    let mut sum = U256::ZERO;

    for entry in entries {
        if entry.units.is_zero() {
            return Err(EngineError::validation(format!(
                "entry for {} has zero units",
                entry.address
            )));
        }
        if !seen.insert(entry.address) {
            return Err(EngineError::validation(format!(
                "duplicate address {}",
                entry.address
            )));
        }
        sum = sum.checked_add(entry.units).ok_or_else(|| {
            EngineError::validation("allowlist units overflow".to_string())
        })?;
    }

    if sum != total_units {
        return Err(EngineError::validation(format!(
            "allowlist units sum to {sum}, expected exactly {total_units}"
        )));
    }
    Ok(())
}

/// Shortcut for the standard hypercert supply
pub fn validate_default_supply(entries: &[AllowlistEntry]) -> Result<(), EngineError> {
    validate_entries(entries, *DEFAULT_TOTAL_UNITS)
}

/// Parse a two-column `address,units` CSV into entries.
///
/// The units column accepts absolute unit counts or a percentage of
/// `total_units` written as `N%`. A header row is detected and skipped;
/// blank lines are ignored. Parsing does not enforce the sum invariant;
/// callers follow up with [`validate_entries`].
pub fn parse_csv(input: &str, total_units: U256) -> Result<Vec<AllowlistEntry>, EngineError> {
    let mut entries = Vec::new();

    for (line_no, raw_line) in input.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        if line_no == 0 && is_header(line) {
            continue;
        }

        let mut columns = line.split(',');
        let address_col = columns.next().unwrap_or_default().trim();
        let units_col = columns
            .next()
            .ok_or_else(|| {
                EngineError::validation(format!("line {}: missing units column", line_no + 1))
            })?
            .trim();
        if columns.next().is_some() {
            return Err(EngineError::validation(format!(
                "line {}: expected exactly two columns",
                line_no + 1
            )));
        }

        let address = Address::from_str(address_col).map_err(|_| {
            EngineError::validation(format!("line {}: invalid address {address_col:?}", line_no + 1))
        })?;
        let units = parse_units(units_col, total_units).map_err(|reason| {
            EngineError::validation(format!("line {}: {reason}", line_no + 1))
        })?;

        entries.push(AllowlistEntry { address, units });
    }

    Ok(entries)
}

fn is_header(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    lower.starts_with("address") || lower.starts_with("\"address")
}

fn parse_units(column: &str, total_units: U256) -> Result<U256, String> {
    if let Some(percent) = column.strip_suffix('%') {
        let percent: u64 = percent
            .trim()
            .parse()
            .map_err(|_| format!("invalid percentage {column:?}"))?;
        if percent == 0 || percent > 100 {
            return Err(format!("percentage {percent} out of range (1-100)"));
        }
        return Ok(total_units * U256::from(percent) / U256::from(100u64));
    }

    U256::from_str(column).map_err(|_| format!("invalid unit count {column:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    fn entry(byte: u8, units: u64) -> AllowlistEntry {
        AllowlistEntry {
            address: addr(byte),
            units: U256::from(units),
        }
    }

    #[test]
    fn exact_sum_is_accepted() {
        let entries = vec![entry(1, 600), entry(2, 400)];
        assert!(validate_entries(&entries, U256::from(1000u64)).is_ok());
    }

    #[test]
    fn undershoot_and_overshoot_both_rejected() {
        let under = vec![entry(1, 999)];
        let err = validate_entries(&under, U256::from(1000u64)).unwrap_err();
        assert!(err.to_string().contains("sum to 999"));

        let over = vec![entry(1, 1001)];
        assert!(validate_entries(&over, U256::from(1000u64)).is_err());
    }

    #[test]
    fn duplicates_and_zero_units_rejected() {
        let dupes = vec![entry(1, 500), entry(1, 500)];
        assert!(validate_entries(&dupes, U256::from(1000u64))
            .unwrap_err()
            .to_string()
            .contains("duplicate"));

        let zero = vec![entry(1, 0), entry(2, 1000)];
        assert!(validate_entries(&zero, U256::from(1000u64))
            .unwrap_err()
            .to_string()
            .contains("zero units"));
    }

    #[test]
    fn default_supply_round_trip() {
        let half = *DEFAULT_TOTAL_UNITS / U256::from(2u64);
        let entries = vec![
            AllowlistEntry { address: addr(1), units: half },
            AllowlistEntry { address: addr(2), units: half },
        ];
        assert!(validate_default_supply(&entries).is_ok());
    }

    #[test]
    fn csv_with_header_and_percentages() {
        let csv = "\
address,units
0x1111111111111111111111111111111111111111,60%
0x2222222222222222222222222222222222222222,40%
";
        let entries = parse_csv(csv, U256::from(1000u64)).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].units, U256::from(600u64));
        assert_eq!(entries[1].units, U256::from(400u64));
        assert!(validate_entries(&entries, U256::from(1000u64)).is_ok());
    }

    #[test]
    fn csv_absolute_units_without_header() {
        let csv = "0x1111111111111111111111111111111111111111,250\n\
                   0x2222222222222222222222222222222222222222,750\n";
        let entries = parse_csv(csv, U256::from(1000u64)).unwrap();
        assert_eq!(entries[0].units, U256::from(250u64));
        assert_eq!(entries[1].units, U256::from(750u64));
    }

    #[test]
    fn csv_rejects_bad_rows() {
        assert!(parse_csv("not-an-address,100", U256::from(1000u64)).is_err());
        assert!(parse_csv("0x1111111111111111111111111111111111111111", U256::from(1000u64)).is_err());
        assert!(parse_csv(
            "0x1111111111111111111111111111111111111111,100,extra",
            U256::from(1000u64)
        )
        .is_err());
        assert!(parse_csv(
            "0x1111111111111111111111111111111111111111,150%",
            U256::from(1000u64)
        )
        .is_err());
    }
}
