//! Derived-metric calculations over the cleaned frame.
//!
//! Every function returns a new frame; derived columns are pure functions of
//! existing columns and transforms only ever add columns or remove rows.
//! Series metrics (moving average, growth rate) operate within each
//! `(state, county)` group after sorting by `(state, county, date)`; frames
//! without location columns (national aggregates) are treated as one group.

use std::collections::VecDeque;

use chrono::Datelike;
use polars::prelude::*;

pub const DEFAULT_MOVING_AVERAGE_WINDOW: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeMethod {
    MinMax,
    ZScore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutlierMethod {
    Iqr,
    ZScore,
}

/// Trailing mean of `column` over the previous `window` rows per group,
/// emitted as `{column}_ma{window}`. Null until a full window of non-null
/// values has accumulated.
pub fn moving_average(df: &DataFrame, column: &str, window: usize) -> PolarsResult<DataFrame> {
    if window == 0 {
        return Err(PolarsError::ComputeError(
            "moving average window must be positive".into(),
        ));
    }
    let grouped = has_location_groups(df);
    let sorted = sort_for_series(df, grouped)?;
    let len = sorted.height();
    let values = sorted.column(column)?.f64()?;
    let group_starts = new_group_flags(&sorted, grouped)?;

    let mut result: Vec<Option<f64>> = Vec::with_capacity(len);
    let mut window_values: VecDeque<Option<f64>> = VecDeque::with_capacity(window + 1);

    for idx in 0..len {
        if group_starts[idx] {
            window_values.clear();
        }
        window_values.push_back(values.get(idx));
        if window_values.len() > window {
            window_values.pop_front();
        }

        if window_values.len() == window && window_values.iter().all(Option::is_some) {
            let sum: f64 = window_values.iter().map(|v| v.unwrap_or(0.0)).sum();
            result.push(Some(sum / window as f64));
        } else {
            result.push(None);
        }
    }

    let mut output = sorted;
    output.hstack_mut(&mut [
        Series::new(format!("{column}_ma{window}").into(), result).into()
    ])?;
    Ok(output)
}

/// Day-over-day percent change of `column` per group as
/// `{column}_growth_rate`. Null at group starts and when the previous value
/// is zero or null, so the column never carries non-finite values.
pub fn growth_rate(df: &DataFrame, column: &str) -> PolarsResult<DataFrame> {
    let grouped = has_location_groups(df);
    let sorted = sort_for_series(df, grouped)?;
    let len = sorted.height();
    let values = sorted.column(column)?.f64()?;
    let group_starts = new_group_flags(&sorted, grouped)?;

    let mut result: Vec<Option<f64>> = Vec::with_capacity(len);
    let mut previous: Option<f64> = None;

    for idx in 0..len {
        if group_starts[idx] {
            previous = None;
        }
        let current = values.get(idx);
        let rate = match (previous, current) {
            (Some(prev), Some(cur)) if prev != 0.0 => Some((cur - prev) / prev * 100.0),
            _ => None,
        };
        result.push(rate);
        previous = current;
    }

    let mut output = sorted;
    output.hstack_mut(&mut [
        Series::new(format!("{column}_growth_rate").into(), result).into()
    ])?;
    Ok(output)
}

/// `deaths / cases * 100` as `mortality_rate`; null where `cases` is zero or
/// either input is null.
pub fn mortality_rate(df: &DataFrame) -> PolarsResult<DataFrame> {
    let len = df.height();
    let cases = df.column("cases")?.f64()?;
    let deaths = df.column("deaths")?.f64()?;

    let mut result: Vec<Option<f64>> = Vec::with_capacity(len);
    for idx in 0..len {
        let rate = match (deaths.get(idx), cases.get(idx)) {
            (Some(d), Some(c)) if c != 0.0 => Some(d / c * 100.0),
            _ => None,
        };
        result.push(rate);
    }

    let mut output = df.clone();
    output.hstack_mut(&mut [Series::new("mortality_rate".into(), result).into()])?;
    Ok(output)
}

/// Calendar features derived from `date`: year, month, ISO week, day,
/// day_of_year, quarter. `day_of_week` (0 = Sunday, the dataset's own
/// convention) is added only when not already present.
pub fn add_time_features(df: &DataFrame) -> PolarsResult<DataFrame> {
    let len = df.height();
    let dates = df.column("date")?.datetime()?;

    let mut year: Vec<Option<i32>> = Vec::with_capacity(len);
    let mut month: Vec<Option<i32>> = Vec::with_capacity(len);
    let mut week: Vec<Option<i32>> = Vec::with_capacity(len);
    let mut day: Vec<Option<i32>> = Vec::with_capacity(len);
    let mut day_of_year: Vec<Option<i32>> = Vec::with_capacity(len);
    let mut quarter: Vec<Option<i32>> = Vec::with_capacity(len);
    let mut day_of_week: Vec<Option<i32>> = Vec::with_capacity(len);

    for idx in 0..len {
        let date = dates
            .get(idx)
            .and_then(chrono::DateTime::from_timestamp_micros)
            .map(|dt| dt.date_naive());
        year.push(date.map(|d| d.year()));
        month.push(date.map(|d| d.month() as i32));
        week.push(date.map(|d| d.iso_week().week() as i32));
        day.push(date.map(|d| d.day() as i32));
        day_of_year.push(date.map(|d| d.ordinal() as i32));
        quarter.push(date.map(|d| (d.month0() / 3 + 1) as i32));
        day_of_week.push(date.map(|d| d.weekday().num_days_from_sunday() as i32));
    }

    let mut columns: Vec<Column> = vec![
        Series::new("year".into(), year).into(),
        Series::new("month".into(), month).into(),
        Series::new("week".into(), week).into(),
        Series::new("day".into(), day).into(),
        Series::new("day_of_year".into(), day_of_year).into(),
        Series::new("quarter".into(), quarter).into(),
    ];
    if df.column("day_of_week").is_err() {
        columns.push(Series::new("day_of_week".into(), day_of_week).into());
    }

    let mut output = df.clone();
    output.hstack_mut(&mut columns)?;
    Ok(output)
}

/// Min-max or z-score normalization as `{column}_normalized`. Degenerate
/// inputs (constant column, fewer than two values) normalize to null.
pub fn normalize_column(
    df: &DataFrame,
    column: &str,
    method: NormalizeMethod,
) -> PolarsResult<DataFrame> {
    let values = df.column(column)?.f64()?;
    let non_null: Vec<f64> = values.into_iter().flatten().collect();

    let normalize: Box<dyn Fn(f64) -> Option<f64>> = match method {
        NormalizeMethod::MinMax => {
            let min = non_null.iter().copied().fold(f64::INFINITY, f64::min);
            let max = non_null.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            if non_null.is_empty() || max <= min {
                Box::new(|_| None)
            } else {
                Box::new(move |v| Some((v - min) / (max - min)))
            }
        }
        NormalizeMethod::ZScore => {
            let mean = crate::stats::mean(&non_null);
            let std = crate::stats::sample_std(&non_null);
            if !std.is_finite() || std == 0.0 {
                Box::new(|_| None)
            } else {
                Box::new(move |v| Some((v - mean) / std))
            }
        }
    };

    let result: Vec<Option<f64>> = values
        .into_iter()
        .map(|v| v.and_then(&normalize))
        .collect();

    let mut output = df.clone();
    output.hstack_mut(&mut [
        Series::new(format!("{column}_normalized").into(), result).into()
    ])?;
    Ok(output)
}

/// Drops rows whose `column` value falls outside the IQR fence or z-score
/// threshold. Rows with null in `column` are kept. Returns the filtered
/// frame and the removed-row count.
pub fn filter_outliers(
    df: &DataFrame,
    column: &str,
    method: OutlierMethod,
    threshold: f64,
) -> PolarsResult<(DataFrame, usize)> {
    let values = df.column(column)?.f64()?;
    let mut non_null: Vec<f64> = values.into_iter().flatten().collect();
    non_null.sort_by(|a, b| a.total_cmp(b));

    let keep: Vec<bool> = match method {
        OutlierMethod::Iqr => {
            let q1 = crate::stats::quantile(&non_null, 0.25);
            let q3 = crate::stats::quantile(&non_null, 0.75);
            let iqr = q3 - q1;
            let lower = q1 - threshold * iqr;
            let upper = q3 + threshold * iqr;
            values
                .into_iter()
                .map(|v| v.map_or(true, |v| v >= lower && v <= upper))
                .collect()
        }
        OutlierMethod::ZScore => {
            let mean = crate::stats::mean(&non_null);
            let std = crate::stats::sample_std(&non_null);
            values
                .into_iter()
                .map(|v| {
                    v.map_or(true, |v| {
                        if std.is_finite() && std > 0.0 {
                            ((v - mean) / std).abs() < threshold
                        } else {
                            true
                        }
                    })
                })
                .collect()
        }
    };

    let mask = BooleanChunked::from_slice("keep".into(), &keep);
    let filtered = df.filter(&mask)?;
    let removed = df.height() - filtered.height();
    Ok((filtered, removed))
}

fn has_location_groups(df: &DataFrame) -> bool {
    df.column("state").is_ok() && df.column("county").is_ok()
}

fn sort_for_series(df: &DataFrame, grouped: bool) -> PolarsResult<DataFrame> {
    if grouped {
        df.sort(["state", "county", "date"], SortMultipleOptions::default())
    } else {
        df.sort(["date"], SortMultipleOptions::default())
    }
}

/// True at the first row of each `(state, county)` run in a sorted frame.
fn new_group_flags(df: &DataFrame, grouped: bool) -> PolarsResult<Vec<bool>> {
    let len = df.height();
    let mut flags = vec![false; len];
    if len > 0 {
        flags[0] = true;
    }
    if !grouped {
        return Ok(flags);
    }

    let states = df.column("state")?.str()?;
    let counties = df.column("county")?.str()?;
    for idx in 1..len {
        if states.get(idx) != states.get(idx - 1) || counties.get(idx) != counties.get(idx - 1) {
            flags[idx] = true;
        }
    }
    Ok(flags)
}
