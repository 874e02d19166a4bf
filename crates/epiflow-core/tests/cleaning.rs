use std::fs;
use std::path::PathBuf;

use epiflow_core::cleaning;

const HEADER: &str = "date,county,state,fips,cases,deaths,daily_cases,daily_deaths,day_of_week,is_weekend,is_holiday,retail_recreation,grocery_pharmacy,parks,transit,workplaces,residential";

fn row(date: &str, county: &str, cases: f64) -> String {
    format!("{date},{county},somestate,17031,{cases},5,10,1,1,0,0,-25.0,-8.0,2.0,-33.0,-22.0,8.0")
}

fn scratch_dir(test: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("epiflow_cleaning_{}_{test}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

fn count_data_rows(path: &PathBuf) -> usize {
    fs::read_to_string(path)
        .expect("read output")
        .lines()
        .count()
        - 1
}

#[test]
fn removes_duplicates_across_chunk_boundaries() {
    let dir = scratch_dir("dupes");
    let input = dir.join("raw.csv");
    let output = dir.join("cleaned.csv");

    // chunk size 2 puts the repeats of the first row into later chunks
    let rows = [
        row("2021-03-01", "cook", 800.0),
        row("2021-03-02", "cook", 870.0),
        row("2021-03-01", "cook", 800.0),
        row("2021-03-03", "cook", 930.0),
        row("2021-03-01", "cook", 800.0),
    ];
    fs::write(&input, format!("{HEADER}\n{}\n", rows.join("\n"))).expect("write input");

    let summary = cleaning::clean_csv(&input, &output, 2).expect("clean");
    assert_eq!(summary.rows_read, 5);
    assert_eq!(summary.duplicate_rows, 2);
    assert_eq!(summary.rows_written, 3);
    assert_eq!(summary.chunks, 3);
    assert!(summary.rows_written <= summary.rows_read);
    assert_eq!(count_data_rows(&output), 3);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn drops_rows_with_every_field_null() {
    let dir = scratch_dir("empty");
    let input = dir.join("raw.csv");
    let output = dir.join("cleaned.csv");

    let empty_row = ",".repeat(16);
    let null_tokens = format!("NA,null,None,{}", ",".repeat(13));
    let contents = format!(
        "{HEADER}\n{}\n{empty_row}\n{null_tokens}\n{}\n",
        row("2021-03-01", "cook", 800.0),
        row("2021-03-02", "cook", 870.0),
    );
    fs::write(&input, contents).expect("write input");

    let summary = cleaning::clean_csv(&input, &output, 100).expect("clean");
    assert_eq!(summary.rows_read, 4);
    assert_eq!(summary.empty_rows, 2);
    assert_eq!(summary.rows_written, 2);
    assert_eq!(count_data_rows(&output), 2);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn trims_whitespace_before_comparing_rows() {
    let dir = scratch_dir("trim");
    let input = dir.join("raw.csv");
    let output = dir.join("cleaned.csv");

    let padded = row("2021-03-01", " cook ", 800.0);
    let contents = format!(
        "{HEADER}\n{}\n{padded}\n",
        row("2021-03-01", "cook", 800.0),
    );
    fs::write(&input, contents).expect("write input");

    let summary = cleaning::clean_csv(&input, &output, 100).expect("clean");
    assert_eq!(summary.duplicate_rows, 1);
    assert_eq!(summary.rows_written, 1);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn cleaning_a_clean_file_is_a_no_op() {
    let dir = scratch_dir("idempotent");
    let input = dir.join("raw.csv");
    let first = dir.join("cleaned.csv");
    let second = dir.join("cleaned_again.csv");

    let contents = format!(
        "{HEADER}\n{}\n{}\n{}\n{}\n",
        row("2021-03-01", "cook", 800.0),
        row("2021-03-02", "cook", 870.0),
        row("2021-03-01", "cook", 800.0),
        row("2021-03-03", "cook", 930.0),
    );
    fs::write(&input, contents).expect("write input");

    cleaning::clean_csv(&input, &first, 2).expect("first clean");
    let summary = cleaning::clean_csv(&first, &second, 2).expect("second clean");

    assert_eq!(summary.duplicate_rows, 0);
    assert_eq!(summary.empty_rows, 0);
    assert_eq!(summary.rows_read, summary.rows_written);
    assert_eq!(
        fs::read_to_string(&first).expect("first"),
        fs::read_to_string(&second).expect("second"),
    );

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn output_keeps_the_canonical_header() {
    let dir = scratch_dir("header");
    let input = dir.join("raw.csv");
    let output = dir.join("cleaned.csv");

    fs::write(
        &input,
        format!("{HEADER}\n{}\n", row("2021-03-01", "cook", 800.0)),
    )
    .expect("write input");

    cleaning::clean_csv(&input, &output, 100).expect("clean");
    let contents = fs::read_to_string(&output).expect("read output");
    assert_eq!(contents.lines().next(), Some(HEADER));

    let _ = fs::remove_dir_all(&dir);
}
