//! Kubernetes quantity normalization
//!
//! Collectors report CPU as whole cores (`"2"`, `"1.5"`) or millicores
//! (`"250m"`) and memory with binary suffixes (`"512Mi"`, `"16068476Ki"`).
//! Everything is normalized to cores and GiB.

use crate::error::ParseError;

const KIB_PER_GIB: f64 = 1024.0 * 1024.0;
const MIB_PER_GIB: f64 = 1024.0;
const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Parse a CPU quantity into cores
pub fn parse_cpu(raw: &str) -> Result<f64, ParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ParseError::Empty);
    }

    match raw.strip_suffix('m') {
        Some(millicores) => parse_number(millicores, raw).map(|m| m / 1000.0),
        None => parse_number(raw, raw),
    }
}

/// Convert a numeric memory value with its unit suffix into GiB
///
/// `Ki`, `Mi` and `Gi` are binary units. Any other suffix, including none,
/// is read as a plain byte count.
pub fn parse_memory(value: &str, unit: &str) -> Result<f64, ParseError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ParseError::Empty);
    }

    let raw = format!("{}{}", value, unit);
    let number = parse_number(value, &raw)?;

    Ok(match unit {
        "Ki" => number / KIB_PER_GIB,
        "Mi" => number / MIB_PER_GIB,
        "Gi" => number,
        _ => number / BYTES_PER_GIB,
    })
}

/// Parse a raw memory quantity such as `"512Mi"` into GiB
pub fn parse_memory_quantity(raw: &str) -> Result<f64, ParseError> {
    let (value, unit) = split_quantity(raw.trim());
    parse_memory(value, unit)
}

/// Split a quantity into its numeric part and trailing alphabetic unit
pub fn split_quantity(raw: &str) -> (&str, &str) {
    let unit_start = raw
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_alphabetic())
        .last()
        .map(|(i, _)| i)
        .unwrap_or(raw.len());

    raw.split_at(unit_start)
}

fn parse_number(digits: &str, raw: &str) -> Result<f64, ParseError> {
    let value: f64 = digits.trim().parse().map_err(|_| ParseError::InvalidNumber {
        raw: raw.to_string(),
    })?;

    if !value.is_finite() {
        return Err(ParseError::InvalidNumber {
            raw: raw.to_string(),
        });
    }
    if value < 0.0 {
        return Err(ParseError::Negative {
            raw: raw.to_string(),
        });
    }

    // "-0" passes the sign check as -0.0
    Ok(value.abs())
}
