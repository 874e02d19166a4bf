use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;
use polars::lazy::dsl::col;
use polars::prelude::*;

use epiflow_core::outputs::{date_range, OutputMetadata, OutputWriter};

fn date_micros(date: &str) -> i64 {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .expect("parse date")
        .and_hms_opt(0, 0, 0)
        .expect("midnight")
        .and_utc()
        .timestamp_micros()
}

fn sample_frame() -> DataFrame {
    let micros = vec![
        date_micros("2021-03-01"),
        date_micros("2021-03-02"),
        date_micros("2021-03-03"),
    ];
    df![
        "date" => micros,
        "county" => ["cook", "cook", "cook"],
        "cases" => [800.0, 870.0, 930.0],
    ]
    .expect("df")
    .lazy()
    .with_column(col("date").cast(DataType::Datetime(TimeUnit::Microseconds, None)))
    .collect()
    .expect("collect")
}

fn scratch_dir(test: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("epiflow_outputs_{}_{test}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    dir
}

#[test]
fn writes_each_format_with_the_right_extension() {
    let dir = scratch_dir("formats");
    let writer = OutputWriter::new(&dir).expect("writer");
    let df = sample_frame();

    let csv = writer.write_csv(&df, "data").expect("csv");
    let json = writer.write_json(&df, "data").expect("json");
    let parquet = writer.write_parquet(&df, "data").expect("parquet");

    assert_eq!(csv.extension().and_then(|e| e.to_str()), Some("csv"));
    assert_eq!(json.extension().and_then(|e| e.to_str()), Some("json"));
    assert_eq!(parquet.extension().and_then(|e| e.to_str()), Some("parquet"));
    for path in [&csv, &json, &parquet] {
        assert!(fs::metadata(path).expect("metadata").len() > 0);
    }

    // Record-oriented JSON parses as an array with one object per row.
    let parsed: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&json).expect("json text")).expect("parse");
    assert_eq!(parsed.as_array().map(Vec::len), Some(3));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn metadata_side_file_describes_the_dataset() {
    let dir = scratch_dir("metadata");
    let writer = OutputWriter::new(&dir).expect("writer");
    let df = sample_frame();

    let metadata = OutputMetadata::describe(
        &df,
        "data.csv",
        "test dataset",
        &["moving_average_7d", "mortality_rate"],
    );
    let path = writer.write_metadata("data.csv", &metadata).expect("write");
    assert!(path.ends_with("data_metadata.json"));

    let parsed: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).expect("text")).expect("parse");
    assert_eq!(parsed["total_rows"], 3);
    assert_eq!(parsed["total_columns"], 3);
    assert_eq!(parsed["source_file"], "data.csv");
    assert_eq!(parsed["date_range"]["start"], "2021-03-01");
    assert_eq!(parsed["date_range"]["end"], "2021-03-03");
    assert_eq!(
        parsed["transformations_applied"][0],
        "moving_average_7d"
    );
    assert!(parsed["run_id"].is_string());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn backup_copies_with_timestamped_name() {
    let dir = scratch_dir("backup");
    let writer = OutputWriter::new(&dir).expect("writer");
    let df = sample_frame();
    writer.write_csv(&df, "data.csv").expect("csv");

    let backup = writer.create_backup("data.csv").expect("backup");
    let name = backup
        .file_name()
        .and_then(|n| n.to_str())
        .expect("backup name");
    assert!(name.starts_with("data_backup_"));
    assert!(name.ends_with(".csv"));
    assert_eq!(
        fs::read_to_string(dir.join("data.csv")).expect("original"),
        fs::read_to_string(&backup).expect("backup"),
    );

    assert!(writer.create_backup("missing.csv").is_err());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn list_files_filters_by_extension() {
    let dir = scratch_dir("list");
    let writer = OutputWriter::new(&dir).expect("writer");
    let df = sample_frame();
    writer.write_csv(&df, "one").expect("csv");
    writer.write_csv(&df, "two").expect("csv");
    writer.write_json(&df, "three").expect("json");

    let csvs = writer.list_files(Some(".csv")).expect("list");
    assert_eq!(csvs.len(), 2);
    let all = writer.list_files(None).expect("list all");
    assert_eq!(all.len(), 3);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn date_range_reads_min_and_max() {
    let df = sample_frame();
    let range = date_range(&df).expect("range");
    assert_eq!(range.start, "2021-03-01");
    assert_eq!(range.end, "2021-03-03");

    let no_dates = df!["cases" => [1.0]].expect("df");
    assert!(date_range(&no_dates).is_none());
}
