//! Canonical schema for the integrated case/mobility dataset.
//!
//! Column names are normalized (trimmed, lowercased, whitespace collapsed to
//! underscores) before validation, so `Daily Cases` and `daily_cases` refer
//! to the same column. Every canonical column must be present; columns beyond
//! the canonical set are accepted and typed as numeric so that derived-metric
//! CSVs read back through the same path.

use chrono::NaiveDateTime;
use csv::StringRecord;

use crate::errors::ReaderError;

/// Default number of rows per chunk when streaming a large CSV.
pub const DEFAULT_CHUNK_SIZE: usize = 100_000;

pub const CANONICAL_COLUMNS: [&str; 17] = [
    "date",
    "county",
    "state",
    "fips",
    "cases",
    "deaths",
    "daily_cases",
    "daily_deaths",
    "day_of_week",
    "is_weekend",
    "is_holiday",
    "retail_recreation",
    "grocery_pharmacy",
    "parks",
    "transit",
    "workplaces",
    "residential",
];

/// The six mobility categories, expressed as percent change from baseline.
pub const MOBILITY_COLUMNS: [&str; 6] = [
    "retail_recreation",
    "grocery_pharmacy",
    "parks",
    "transit",
    "workplaces",
    "residential",
];

pub const CATEGORICAL_COLUMNS: [&str; 2] = ["county", "state"];

/// String tokens treated as null in every column.
pub const NULL_TOKENS: [&str; 8] = ["", "nan", "NaN", "NA", "N/A", "null", "NULL", "None"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Date,
    Categorical,
    Numeric,
}

pub fn normalize_column_name(name: &str) -> String {
    name.trim()
        .to_ascii_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

pub fn is_null_token(value: &str) -> bool {
    NULL_TOKENS.contains(&value)
}

/// Normalizes a header row and assigns a role to each column.
///
/// Canonical columns get their declared role; anything else is treated as a
/// numeric derived column. Fails if a canonical column is absent.
pub fn classify_header(header: &StringRecord) -> Result<(Vec<String>, Vec<ColumnRole>), ReaderError> {
    if header.is_empty() {
        return Err(ReaderError::SchemaMismatch {
            reason: "header row was empty".to_string(),
        });
    }

    let names: Vec<String> = header.iter().map(normalize_column_name).collect();

    for canonical in CANONICAL_COLUMNS {
        if !names.iter().any(|name| name == canonical) {
            return Err(ReaderError::MissingColumn {
                column: canonical.to_string(),
            });
        }
    }

    let roles = names
        .iter()
        .map(|name| {
            if name == "date" {
                ColumnRole::Date
            } else if CATEGORICAL_COLUMNS.contains(&name.as_str()) {
                ColumnRole::Categorical
            } else {
                ColumnRole::Numeric
            }
        })
        .collect();

    Ok((names, roles))
}

pub(crate) fn parse_optional_f64(
    value: &str,
    line_index: usize,
    column: &str,
) -> Result<Option<f64>, ReaderError> {
    let trimmed = value.trim();
    if is_null_token(trimmed) {
        return Ok(None);
    }
    trimmed
        .parse::<f64>()
        .map(Some)
        .map_err(|err| ReaderError::DataRow {
            line_index,
            column: column.to_string(),
            message: format!("failed to parse '{trimmed}' as float: {err}"),
        })
}

pub(crate) fn clean_optional_str(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if is_null_token(trimmed) {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parses a date cell into microseconds since the epoch. Unparseable values
/// become null rather than failing the row, matching the lenient coercion of
/// the upstream data sources.
pub(crate) fn parse_date_micros(value: &str) -> Option<i64> {
    static FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];
    let trimmed = value.trim();
    if is_null_token(trimmed) {
        return None;
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_micros());
    }
    for fmt in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt.and_utc().timestamp_micros());
        }
    }
    None
}
