//! Streaming clean: normalize, drop empty and duplicate rows, re-emit CSV.
//!
//! Rows are processed one chunk at a time with at-most-once pass-through:
//! the first occurrence of a row (by full-row content hash) is written to the
//! output, every later occurrence is dropped, within and across chunks.

use std::collections::HashSet;
use std::path::Path;

use polars::prelude::*;
use serde::Serialize;
use tracing::info;

use epiflow_reader::ChunkedCsvReader;

use crate::error::{PipelineError, Result};

#[derive(Debug, Default, Clone, Serialize)]
pub struct CleanSummary {
    pub rows_read: usize,
    pub rows_written: usize,
    pub duplicate_rows: usize,
    pub empty_rows: usize,
    pub chunks: usize,
}

/// Cleans `input` into `output`, returning per-stage row counts.
///
/// Holds one chunk plus the seen-row hash set in memory; the hash set grows
/// with the number of distinct rows.
pub fn clean_csv(input: &Path, output: &Path, chunk_size: usize) -> Result<CleanSummary> {
    let reader = ChunkedCsvReader::open(input, chunk_size)?;
    let columns: Vec<String> = reader.columns().to_vec();

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut writer = csv::Writer::from_path(output)?;
    writer.write_record(&columns)?;

    let mut seen: HashSet<[u8; 32]> = HashSet::new();
    let mut summary = CleanSummary::default();

    for chunk in reader {
        let chunk = chunk?;
        summary.chunks += 1;
        summary.rows_read += chunk.height();

        let views = column_views(&chunk, &columns)?;
        for idx in 0..chunk.height() {
            let fields: Vec<Option<String>> =
                views.iter().map(|view| view.render(idx)).collect();

            if fields.iter().all(Option::is_none) {
                summary.empty_rows += 1;
                continue;
            }

            if !seen.insert(row_hash(&fields)) {
                summary.duplicate_rows += 1;
                continue;
            }

            writer.write_record(fields.iter().map(|f| f.as_deref().unwrap_or("")))?;
            summary.rows_written += 1;
        }
    }
    writer.flush()?;

    info!(
        rows_read = summary.rows_read,
        rows_written = summary.rows_written,
        duplicates = summary.duplicate_rows,
        empty = summary.empty_rows,
        chunks = summary.chunks,
        output = %output.display(),
        "cleaning finished"
    );
    Ok(summary)
}

enum ColumnView<'a> {
    Date(&'a DatetimeChunked),
    Text(&'a StringChunked),
    Number(&'a Float64Chunked),
}

impl ColumnView<'_> {
    fn render(&self, idx: usize) -> Option<String> {
        match self {
            ColumnView::Date(values) => values.get(idx).and_then(format_date_micros),
            ColumnView::Text(values) => values.get(idx).map(str::to_string),
            ColumnView::Number(values) => values.get(idx).map(|v| format!("{v}")),
        }
    }
}

fn column_views<'a>(df: &'a DataFrame, columns: &[String]) -> Result<Vec<ColumnView<'a>>> {
    let mut views = Vec::with_capacity(columns.len());
    for name in columns {
        let column = df.column(name.as_str())?;
        let view = match column.dtype() {
            DataType::Datetime(_, _) => ColumnView::Date(column.datetime()?),
            DataType::String => ColumnView::Text(column.str()?),
            DataType::Float64 => ColumnView::Number(column.f64()?),
            other => {
                return Err(PipelineError::Processing(format!(
                    "unexpected dtype {other} in column '{name}'"
                )))
            }
        };
        views.push(view);
    }
    Ok(views)
}

fn format_date_micros(micros: i64) -> Option<String> {
    chrono::DateTime::from_timestamp_micros(micros)
        .map(|dt| dt.date_naive().format("%Y-%m-%d").to_string())
}

/// Content hash of a row; nulls are distinguished from empty strings.
fn row_hash(fields: &[Option<String>]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    for field in fields {
        match field {
            Some(value) => {
                hasher.update(&[1]);
                hasher.update(value.as_bytes());
            }
            None => {
                hasher.update(&[0]);
            }
        }
        hasher.update(&[0x1f]);
    }
    *hasher.finalize().as_bytes()
}
