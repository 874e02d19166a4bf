//! Aggregations and descriptive statistics over the transformed frame.

use polars::lazy::dsl::{col, lit};
use polars::prelude::*;

use crate::stats;

/// Columns included in the full correlation matrix when present.
pub const CORRELATION_COLUMNS: [&str; 12] = [
    "cases",
    "deaths",
    "daily_cases",
    "daily_deaths",
    "retail_recreation",
    "grocery_pharmacy",
    "parks",
    "transit",
    "workplaces",
    "residential",
    "is_weekend",
    "is_holiday",
];

/// National daily totals, sorted by date.
pub fn aggregate_by_date(df: &DataFrame) -> PolarsResult<DataFrame> {
    df.clone()
        .lazy()
        .group_by([col("date")])
        .agg([
            col("cases").sum(),
            col("deaths").sum(),
            col("daily_cases").sum(),
            col("daily_deaths").sum(),
        ])
        .sort(["date"], SortMultipleOptions::default())
        .collect()
}

/// Per-state rollup: final cumulative counts (max) and mean daily counts.
pub fn aggregate_by_state(df: &DataFrame) -> PolarsResult<DataFrame> {
    df.clone()
        .lazy()
        .group_by([col("state")])
        .agg([
            col("cases").max(),
            col("deaths").max(),
            col("daily_cases").mean(),
            col("daily_deaths").mean(),
        ])
        .sort(["state"], SortMultipleOptions::default())
        .collect()
}

/// Per-county rollup, keyed by `(county, state)`.
pub fn aggregate_by_county(df: &DataFrame) -> PolarsResult<DataFrame> {
    df.clone()
        .lazy()
        .group_by([col("county"), col("state")])
        .agg([
            col("cases").max(),
            col("deaths").max(),
            col("daily_cases").mean(),
            col("daily_deaths").mean(),
        ])
        .sort(["county", "state"], SortMultipleOptions::default())
        .collect()
}

pub fn top_states(df: &DataFrame, metric: &str, n: usize) -> PolarsResult<DataFrame> {
    aggregate_by_state(df)?
        .lazy()
        .sort(
            [metric],
            SortMultipleOptions::default().with_order_descending(true),
        )
        .limit(n as IdxSize)
        .collect()
}

pub fn top_counties(df: &DataFrame, metric: &str, n: usize) -> PolarsResult<DataFrame> {
    aggregate_by_county(df)?
        .lazy()
        .sort(
            [metric],
            SortMultipleOptions::default().with_order_descending(true),
        )
        .limit(n as IdxSize)
        .collect()
}

/// Per-state mortality rate (final deaths / final cases * 100) for states
/// with more than `min_cases` cumulative cases, top `n` by rate.
pub fn state_mortality(df: &DataFrame, min_cases: f64, n: usize) -> PolarsResult<DataFrame> {
    aggregate_by_state(df)?
        .lazy()
        .filter(col("cases").gt(lit(min_cases)))
        .with_column((col("deaths") / col("cases") * lit(100.0)).alias("mortality_rate"))
        .sort(
            ["mortality_rate"],
            SortMultipleOptions::default().with_order_descending(true),
        )
        .limit(n as IdxSize)
        .collect()
}

/// Mean daily counts split by the `is_weekend` flag, weekdays first.
pub fn weekday_weekend_means(df: &DataFrame) -> PolarsResult<DataFrame> {
    df.clone()
        .lazy()
        .group_by([col("is_weekend")])
        .agg([col("daily_cases").mean(), col("daily_deaths").mean()])
        .sort(["is_weekend"], SortMultipleOptions::default())
        .collect()
}

/// Mean daily counts per day of week (0 = Sunday).
pub fn day_of_week_means(df: &DataFrame) -> PolarsResult<DataFrame> {
    df.clone()
        .lazy()
        .group_by([col("day_of_week")])
        .agg([col("daily_cases").mean(), col("daily_deaths").mean()])
        .sort(["day_of_week"], SortMultipleOptions::default())
        .collect()
}

/// The correlation-matrix column set actually present in `df`, in canonical
/// order.
pub fn correlation_columns(df: &DataFrame) -> Vec<String> {
    CORRELATION_COLUMNS
        .iter()
        .filter(|name| df.column(name).is_ok())
        .map(|name| name.to_string())
        .collect()
}

/// Pearson correlation matrix over pairwise-complete observations, with a
/// leading `variable` column.
pub fn correlation_matrix(df: &DataFrame, columns: &[String]) -> PolarsResult<DataFrame> {
    let mut data: Vec<Vec<Option<f64>>> = Vec::with_capacity(columns.len());
    for name in columns {
        let values = df.column(name.as_str())?.f64()?;
        data.push(values.into_iter().collect());
    }

    let mut output: Vec<Column> = Vec::with_capacity(columns.len() + 1);
    let names: Vec<&str> = columns.iter().map(String::as_str).collect();
    output.push(Series::new("variable".into(), names).into());

    for (j, name) in columns.iter().enumerate() {
        let column: Vec<Option<f64>> = (0..columns.len())
            .map(|i| stats::pearson(&data[i], &data[j]))
            .collect();
        output.push(Series::new(name.as_str().into(), column).into());
    }

    DataFrame::new(output)
}

const SUMMARY_STATISTICS: [&str; 9] = [
    "count",
    "null_count",
    "mean",
    "std",
    "min",
    "25%",
    "50%",
    "75%",
    "max",
];

/// Describe-style summary over every Float64 column.
pub fn summary_statistics(df: &DataFrame) -> PolarsResult<DataFrame> {
    let numeric: Vec<String> = df
        .get_columns()
        .iter()
        .filter(|column| column.dtype() == &DataType::Float64)
        .map(|column| column.name().to_string())
        .collect();

    let mut output: Vec<Column> = Vec::with_capacity(numeric.len() + 1);
    output.push(Series::new("statistic".into(), SUMMARY_STATISTICS.to_vec()).into());

    for name in &numeric {
        let values = df.column(name.as_str())?.f64()?;
        let mut non_null: Vec<f64> = values.into_iter().flatten().collect();
        non_null.sort_by(|a, b| a.total_cmp(b));

        let min = non_null.first().copied().unwrap_or(f64::NAN);
        let max = non_null.last().copied().unwrap_or(f64::NAN);
        let column = vec![
            non_null.len() as f64,
            (values.len() - non_null.len()) as f64,
            stats::mean(&non_null),
            stats::sample_std(&non_null),
            min,
            stats::quantile(&non_null, 0.25),
            stats::quantile(&non_null, 0.50),
            stats::quantile(&non_null, 0.75),
            max,
        ];
        output.push(Series::new(name.as_str().into(), column).into());
    }

    DataFrame::new(output)
}
