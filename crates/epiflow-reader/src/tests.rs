use std::path::PathBuf;

use crate::errors::ReaderError;
use crate::reader::{file_info, read_dataframe, read_head, ChunkedCsvReader};
use crate::schema::CANONICAL_COLUMNS;

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/data")
        .join(path)
}

#[test]
fn reads_fixture_in_fixed_chunks() {
    let reader = ChunkedCsvReader::open(fixture("integrated_small.csv"), 3).expect("open");
    assert_eq!(reader.columns(), &CANONICAL_COLUMNS[..]);

    let chunks: Vec<_> = reader.map(|chunk| chunk.expect("chunk")).collect();
    let heights: Vec<usize> = chunks.iter().map(|df| df.height()).collect();
    assert_eq!(heights, vec![3, 3, 2]);
}

#[test]
fn full_read_matches_chunked_read() {
    let df = read_dataframe(fixture("integrated_small.csv"), 3).expect("read");
    assert_eq!(df.height(), 8);
    assert_eq!(df.width(), CANONICAL_COLUMNS.len());

    let cases = df.column("cases").expect("cases").f64().expect("f64");
    assert_eq!(cases.get(0), Some(1200.0));
    assert_eq!(cases.get(7), Some(990.0));
}

#[test]
fn header_names_are_normalized() {
    let df = read_dataframe(fixture("integrated_small.csv"), 100).expect("read");
    assert!(df.column("daily_cases").is_ok());
    assert!(df.column("retail_recreation").is_ok());
}

#[test]
fn null_tokens_and_bad_dates_become_null() {
    let df = read_dataframe(fixture("integrated_small.csv"), 100).expect("read");

    let grocery = df
        .column("grocery_pharmacy")
        .expect("grocery_pharmacy")
        .f64()
        .expect("f64");
    assert_eq!(grocery.get(2), None);

    let transit = df.column("transit").expect("transit").f64().expect("f64");
    assert_eq!(transit.get(2), None);

    let dates = df.column("date").expect("date").datetime().expect("datetime");
    assert!(dates.get(0).is_some());
    assert_eq!(dates.get(7), None);
}

#[test]
fn bad_numeric_cell_reports_line_and_column() {
    let reader = ChunkedCsvReader::open(fixture("bad_numeric.csv"), 100).expect("open");
    let err = reader
        .into_iter()
        .find_map(Result::err)
        .expect("expected a data row error");
    match err {
        ReaderError::DataRow {
            line_index, column, ..
        } => {
            assert_eq!(line_index, 3);
            assert_eq!(column, "cases");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn header_only_file_is_empty_data() {
    let reader = ChunkedCsvReader::open(fixture("header_only.csv"), 100).expect("open");
    let err = reader.into_iter().find_map(Result::err).expect("error");
    assert!(matches!(err, ReaderError::EmptyData));
}

#[test]
fn missing_canonical_column_fails_at_open() {
    let err = ChunkedCsvReader::open(fixture("missing_deaths.csv"), 100)
        .err()
        .expect("open should fail");
    assert!(matches!(err, ReaderError::MissingColumn { column } if column == "deaths"));
}

#[test]
fn derived_columns_read_back_as_numeric() {
    let df = read_dataframe(fixture("with_derived.csv"), 100).expect("read");
    let rate = df
        .column("mortality_rate")
        .expect("mortality_rate")
        .f64()
        .expect("f64");
    assert_eq!(rate.get(0), Some(3.125));

    // ISO timestamps from a previous polars write parse back to the same day.
    let dates = df.column("date").expect("date").datetime().expect("datetime");
    assert!(dates.get(0).is_some());
}

#[test]
fn read_head_limits_rows() {
    let df = read_head(fixture("integrated_small.csv"), 2).expect("head");
    assert_eq!(df.height(), 2);
}

#[test]
fn file_info_streams_counts() {
    let info = file_info(fixture("integrated_small.csv")).expect("info");
    assert_eq!(info.total_rows, 8);
    assert_eq!(info.columns.len(), CANONICAL_COLUMNS.len());
    assert!(info.size_bytes > 0);
}
