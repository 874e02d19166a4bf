use chrono::NaiveDate;
use polars::lazy::dsl::col;
use polars::prelude::*;

use epiflow_core::analysis;

fn date_micros(date: &str) -> i64 {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .expect("parse date")
        .and_hms_opt(0, 0, 0)
        .expect("midnight")
        .and_utc()
        .timestamp_micros()
}

fn sample_frame() -> DataFrame {
    let dates = [
        "2021-03-01",
        "2021-03-02",
        "2021-03-01",
        "2021-03-02",
        "2021-03-01",
        "2021-03-02",
    ];
    let micros: Vec<i64> = dates.iter().map(|d| date_micros(d)).collect();

    df![
        "date" => micros,
        "county" => ["alpha", "alpha", "beta", "beta", "gamma", "gamma"],
        "state" => ["east", "east", "east", "east", "west", "west"],
        "cases" => [100.0, 150.0, 20.0, 30.0, 500.0, 600.0],
        "deaths" => [10.0, 12.0, 1.0, 2.0, 20.0, 30.0],
        "daily_cases" => [50.0, 50.0, 10.0, 10.0, 100.0, 100.0],
        "daily_deaths" => [5.0, 2.0, 1.0, 1.0, 10.0, 10.0],
        "is_weekend" => [0.0, 0.0, 0.0, 0.0, 1.0, 1.0],
        "day_of_week" => [1.0, 2.0, 1.0, 2.0, 0.0, 6.0],
    ]
    .expect("df")
    .lazy()
    .with_column(col("date").cast(DataType::Datetime(TimeUnit::Microseconds, None)))
    .collect()
    .expect("collect")
}

#[test]
fn aggregate_by_date_sums_across_locations() {
    let national = analysis::aggregate_by_date(&sample_frame()).expect("aggregate");
    assert_eq!(national.height(), 2);

    let daily_cases = national
        .column("daily_cases")
        .expect("daily_cases")
        .f64()
        .expect("f64");
    assert_eq!(daily_cases.get(0), Some(160.0));
    assert_eq!(daily_cases.get(1), Some(160.0));

    let cases = national.column("cases").expect("cases").f64().expect("f64");
    assert_eq!(cases.get(0), Some(620.0));
}

#[test]
fn aggregate_by_state_takes_final_counts_and_mean_dailies() {
    let by_state = analysis::aggregate_by_state(&sample_frame()).expect("aggregate");
    assert_eq!(by_state.height(), 2);

    let states = by_state.column("state").expect("state").str().expect("str");
    let cases = by_state.column("cases").expect("cases").f64().expect("f64");
    let daily_deaths = by_state
        .column("daily_deaths")
        .expect("daily_deaths")
        .f64()
        .expect("f64");

    // Sorted by state: east first.
    assert_eq!(states.get(0), Some("east"));
    assert_eq!(cases.get(0), Some(150.0));
    assert_eq!(daily_deaths.get(0), Some(2.25));
    assert_eq!(states.get(1), Some("west"));
    assert_eq!(cases.get(1), Some(600.0));
}

#[test]
fn top_counties_orders_and_limits() {
    let top = analysis::top_counties(&sample_frame(), "cases", 2).expect("top");
    assert_eq!(top.height(), 2);

    let counties = top.column("county").expect("county").str().expect("str");
    assert_eq!(counties.get(0), Some("gamma"));
    assert_eq!(counties.get(1), Some("alpha"));
}

#[test]
fn state_mortality_filters_small_states() {
    let rates = analysis::state_mortality(&sample_frame(), 200.0, 10).expect("mortality");
    assert_eq!(rates.height(), 1);

    let states = rates.column("state").expect("state").str().expect("str");
    let rate = rates
        .column("mortality_rate")
        .expect("mortality_rate")
        .f64()
        .expect("f64");
    assert_eq!(states.get(0), Some("west"));
    assert!((rate.get(0).expect("rate") - 5.0).abs() < 1e-12);
}

#[test]
fn weekday_weekend_means_split_on_flag() {
    let means = analysis::weekday_weekend_means(&sample_frame()).expect("means");
    assert_eq!(means.height(), 2);

    let flags = means
        .column("is_weekend")
        .expect("is_weekend")
        .f64()
        .expect("f64");
    let daily_cases = means
        .column("daily_cases")
        .expect("daily_cases")
        .f64()
        .expect("f64");
    assert_eq!(flags.get(0), Some(0.0));
    assert_eq!(daily_cases.get(0), Some(30.0));
    assert_eq!(flags.get(1), Some(1.0));
    assert_eq!(daily_cases.get(1), Some(100.0));
}

#[test]
fn correlation_matrix_is_symmetric_with_unit_diagonal() {
    let df = df![
        "daily_cases" => [1.0, 2.0, 3.0, 4.0],
        "daily_deaths" => [2.0, 4.0, 6.0, 8.0],
        "residential" => [4.0, 3.0, 2.0, 1.0],
    ]
    .expect("df");
    let columns = analysis::correlation_columns(&df);
    assert_eq!(columns, ["daily_cases", "daily_deaths", "residential"]);

    let matrix = analysis::correlation_matrix(&df, &columns).expect("matrix");
    let cases = matrix
        .column("daily_cases")
        .expect("daily_cases")
        .f64()
        .expect("f64");
    let deaths = matrix
        .column("daily_deaths")
        .expect("daily_deaths")
        .f64()
        .expect("f64");

    assert!((cases.get(0).expect("diag") - 1.0).abs() < 1e-12);
    assert!((deaths.get(0).expect("corr") - 1.0).abs() < 1e-12);
    assert!((cases.get(1).expect("corr") - 1.0).abs() < 1e-12);

    let residential = matrix
        .column("residential")
        .expect("residential")
        .f64()
        .expect("f64");
    assert!((residential.get(0).expect("anti") + 1.0).abs() < 1e-12);
}

#[test]
fn summary_statistics_describe_numeric_columns() {
    let df = df![
        "cases" => [Some(1.0), Some(2.0), Some(3.0), Some(4.0), None],
        "label" => ["a", "b", "c", "d", "e"],
    ]
    .expect("df");

    let summary = analysis::summary_statistics(&df).expect("summary");
    assert_eq!(summary.height(), 9);
    assert_eq!(summary.width(), 2);

    let cases = summary.column("cases").expect("cases").f64().expect("f64");
    // count, null_count, mean, std, min, 25%, 50%, 75%, max
    assert_eq!(cases.get(0), Some(4.0));
    assert_eq!(cases.get(1), Some(1.0));
    assert_eq!(cases.get(2), Some(2.5));
    assert_eq!(cases.get(4), Some(1.0));
    assert_eq!(cases.get(6), Some(2.5));
    assert_eq!(cases.get(8), Some(4.0));
}
