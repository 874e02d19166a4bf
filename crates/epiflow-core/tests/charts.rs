use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;
use polars::lazy::dsl::col;
use polars::prelude::*;

use epiflow_core::charts::{self, ChartError, ChartSize};

fn date_micros(date: &str) -> i64 {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .expect("parse date")
        .and_hms_opt(0, 0, 0)
        .expect("midnight")
        .and_utc()
        .timestamp_micros()
}

fn scratch_dir(test: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("epiflow_charts_{}_{test}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

fn full_frame() -> DataFrame {
    let days = 30usize;
    let mut micros = Vec::new();
    let mut counties = Vec::new();
    let mut states = Vec::new();
    let mut cases = Vec::new();
    let mut deaths = Vec::new();
    let mut daily_cases = Vec::new();
    let mut daily_deaths = Vec::new();
    let mut is_weekend = Vec::new();
    let mut is_holiday = Vec::new();
    let mut day_of_week = Vec::new();
    let mut retail = Vec::new();
    let mut grocery = Vec::new();
    let mut parks = Vec::new();
    let mut transit = Vec::new();
    let mut workplaces = Vec::new();
    let mut residential = Vec::new();

    let base = NaiveDate::parse_from_str("2021-03-01", "%Y-%m-%d").expect("base");
    for (county, state, scale) in [("cook", "illinois", 1.0), ("harris", "texas", 2.0)] {
        for day in 0..days {
            let date = base + chrono::Duration::days(day as i64);
            micros.push(date.and_hms_opt(0, 0, 0).expect("midnight").and_utc().timestamp_micros());
            counties.push(county);
            states.push(state);
            let daily = scale * (40.0 + 10.0 * ((day % 7) as f64));
            daily_cases.push(daily);
            daily_deaths.push(daily / 20.0);
            cases.push(scale * 1000.0 + daily * day as f64);
            deaths.push(scale * 50.0 + day as f64);
            let dow = date.weekday().num_days_from_sunday() as f64;
            day_of_week.push(dow);
            is_weekend.push(if dow == 0.0 || dow == 6.0 { 1.0 } else { 0.0 });
            is_holiday.push(0.0);
            retail.push(-30.0 + day as f64 * 0.5);
            grocery.push(-10.0 + day as f64 * 0.2);
            parks.push(5.0 + day as f64 * 0.3);
            transit.push(-40.0 + day as f64 * 0.4);
            workplaces.push(-28.0 + day as f64 * 0.1);
            residential.push(11.0 - day as f64 * 0.1);
        }
    }

    df![
        "date" => micros,
        "county" => counties,
        "state" => states,
        "cases" => cases,
        "deaths" => deaths,
        "daily_cases" => daily_cases,
        "daily_deaths" => daily_deaths,
        "day_of_week" => day_of_week,
        "is_weekend" => is_weekend,
        "is_holiday" => is_holiday,
        "retail_recreation" => retail,
        "grocery_pharmacy" => grocery,
        "parks" => parks,
        "transit" => transit,
        "workplaces" => workplaces,
        "residential" => residential,
    ]
    .expect("df")
    .lazy()
    .with_column(col("date").cast(DataType::Datetime(TimeUnit::Microseconds, None)))
    .collect()
    .expect("collect")
}

#[test]
fn registry_lists_eleven_charts() {
    assert_eq!(charts::all_chart_descriptors().len(), 11);
}

#[test]
fn missing_mobility_columns_are_invalid_data() {
    let dir = scratch_dir("no_mobility");
    let df = df![
        "daily_cases" => [1.0, 2.0],
        "daily_deaths" => [0.1, 0.2],
    ]
    .expect("df");

    let err = charts::mobility_correlation(&df, &dir, ChartSize::default())
        .expect_err("should reject frame without mobility columns");
    assert!(matches!(err, ChartError::InvalidData(_)));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn too_few_points_for_scatter_is_invalid_data() {
    let dir = scratch_dir("scatter");
    let df = df![
        "daily_cases" => [1.0],
        "daily_deaths" => [0.1],
    ]
    .expect("df");

    let err = charts::cases_vs_deaths(&df, &dir, ChartSize::default())
        .expect_err("one point cannot form a trend");
    assert!(matches!(err, ChartError::InvalidData(_)));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn heatmap_needs_at_least_two_variables() {
    let dir = scratch_dir("heatmap");
    let df = df!["daily_cases" => [1.0, 2.0]].expect("df");

    let err = charts::correlation_heatmap(&df, &dir, ChartSize::default())
        .expect_err("a one-variable heatmap is meaningless");
    assert!(matches!(err, ChartError::InvalidData(_)));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
#[ignore = "Font rendering not available in test environment"]
fn renders_the_full_chart_set() {
    let dir = scratch_dir("render_all");
    let df = full_frame();

    let report = charts::render_all(&df, &dir, ChartSize::default()).expect("render");
    assert_eq!(report.written.len(), 11);
    assert!(report.failures.is_empty());
    for descriptor in charts::all_chart_descriptors() {
        assert!(dir.join(descriptor.file_name).exists());
    }

    let _ = fs::remove_dir_all(&dir);
}
