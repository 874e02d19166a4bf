//! Chart rendering for the fixed set of pipeline figures.
//!
//! Eleven PNG charts rendered with [`plotters`]' bitmap backend, so rendering
//! works headless. Each renderer takes the cleaned (or transformed) frame,
//! aggregates what it needs, and writes one numbered file into the figures
//! directory.

mod comparisons;
mod correlation;
mod rankings;
mod timeseries;

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use plotters::prelude::*;
use polars::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

pub use comparisons::{day_of_week, weekday_weekend};
pub use correlation::{cases_vs_deaths, correlation_heatmap, mobility_correlation};
pub use rankings::{state_mortality, top_counties, top_states};
pub use timeseries::{mobility_trends, moving_average_panels, national_trajectory};

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("failed to create drawing area: {0}")]
    DrawingArea(String),

    #[error("failed to configure chart: {0}")]
    ChartConfig(String),

    #[error("failed to draw chart elements: {0}")]
    Drawing(String),

    #[error("failed to save chart to file: {0}")]
    FileSave(#[from] std::io::Error),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("polars operation failed: {0}")]
    Polars(#[from] PolarsError),
}

pub type Result<T> = core::result::Result<T, ChartError>;

#[derive(Debug, Clone, Copy)]
pub struct ChartSize {
    pub width: u32,
    pub height: u32,
}

impl Default for ChartSize {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 800,
        }
    }
}

type RenderFn = fn(&DataFrame, &Path, ChartSize) -> Result<PathBuf>;

pub struct ChartDescriptor {
    pub code: &'static str,
    pub file_name: &'static str,
    pub description: &'static str,
    render: RenderFn,
}

static CHARTS: Lazy<Vec<ChartDescriptor>> = Lazy::new(|| {
    vec![
        ChartDescriptor {
            code: "national_trajectory",
            file_name: "01_national_trajectory.png",
            description: "National daily cases and deaths over time",
            render: national_trajectory,
        },
        ChartDescriptor {
            code: "top_counties_cases",
            file_name: "02_top_counties_cases.png",
            description: "Top 10 counties by cumulative cases",
            render: top_counties,
        },
        ChartDescriptor {
            code: "cases_vs_deaths",
            file_name: "03_cases_vs_deaths.png",
            description: "Daily cases vs daily deaths with trend line",
            render: cases_vs_deaths,
        },
        ChartDescriptor {
            code: "mobility_correlation",
            file_name: "04_mobility_correlation.png",
            description: "Correlation of mobility categories with daily cases",
            render: mobility_correlation,
        },
        ChartDescriptor {
            code: "weekday_weekend",
            file_name: "05_weekday_weekend.png",
            description: "Mean daily counts, weekdays vs weekends",
            render: weekday_weekend,
        },
        ChartDescriptor {
            code: "top_states_cases",
            file_name: "06_top_states_cases.png",
            description: "Top 10 states by cumulative cases",
            render: top_states,
        },
        ChartDescriptor {
            code: "state_mortality",
            file_name: "07_state_mortality.png",
            description: "Top 15 states by mortality rate",
            render: state_mortality,
        },
        ChartDescriptor {
            code: "mobility_trends",
            file_name: "08_mobility_trends.png",
            description: "National mobility trends, 7-day smoothed",
            render: mobility_trends,
        },
        ChartDescriptor {
            code: "day_of_week",
            file_name: "09_day_of_week.png",
            description: "Mean daily counts per day of week",
            render: day_of_week,
        },
        ChartDescriptor {
            code: "moving_average",
            file_name: "10_moving_average.png",
            description: "National daily counts with 7-day moving average",
            render: moving_average_panels,
        },
        ChartDescriptor {
            code: "correlation_heatmap",
            file_name: "11_correlation_heatmap.png",
            description: "Correlation heatmap across all variables",
            render: correlation_heatmap,
        },
    ]
});

pub fn all_chart_descriptors() -> &'static [ChartDescriptor] {
    CHARTS.as_slice()
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartFailure {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct RenderReport {
    pub written: Vec<PathBuf>,
    pub failures: Vec<ChartFailure>,
}

/// Renders every registered chart, logging and collecting per-chart failures
/// instead of aborting the batch.
pub fn render_all(df: &DataFrame, outdir: &Path, size: ChartSize) -> Result<RenderReport> {
    std::fs::create_dir_all(outdir)?;

    let mut report = RenderReport::default();
    for descriptor in all_chart_descriptors() {
        match (descriptor.render)(df, outdir, size) {
            Ok(path) => {
                info!(chart = descriptor.code, file = %path.display(), "chart rendered");
                report.written.push(path);
            }
            Err(err) => {
                warn!(chart = descriptor.code, error = %err, "chart failed");
                report.failures.push(ChartFailure {
                    code: descriptor.code.to_string(),
                    message: err.to_string(),
                });
            }
        }
    }
    Ok(report)
}

// Shared palette, matching the original figure colors.
pub(crate) const CASES_BLUE: RGBColor = RGBColor(52, 152, 219);
pub(crate) const DEATHS_RED: RGBColor = RGBColor(231, 76, 60);
pub(crate) const DEATHS_PURPLE: RGBColor = RGBColor(155, 89, 182);
pub(crate) const WARN_ORANGE: RGBColor = RGBColor(230, 126, 34);
pub(crate) const DROP_GREEN: RGBColor = RGBColor(39, 174, 96);

pub(crate) const MOBILITY_SERIES: [(&str, &str, RGBColor); 6] = [
    ("retail_recreation", "Retail & recreation", RGBColor(52, 152, 219)),
    ("grocery_pharmacy", "Grocery & pharmacy", RGBColor(230, 126, 34)),
    ("parks", "Parks", RGBColor(39, 174, 96)),
    ("transit", "Transit stations", RGBColor(231, 76, 60)),
    ("workplaces", "Workplaces", RGBColor(155, 89, 182)),
    ("residential", "Residential", RGBColor(127, 140, 141)),
];

pub(crate) fn variable_label(name: &str) -> String {
    match name {
        "cases" => "Cumulative cases".to_string(),
        "deaths" => "Cumulative deaths".to_string(),
        "daily_cases" => "Daily cases".to_string(),
        "daily_deaths" => "Daily deaths".to_string(),
        "is_weekend" => "Weekend".to_string(),
        "is_holiday" => "Holiday".to_string(),
        other => MOBILITY_SERIES
            .iter()
            .find(|(code, _, _)| *code == other)
            .map(|(_, label, _)| label.to_string())
            .unwrap_or_else(|| other.replace('_', " ")),
    }
}

/// Day labels indexed by the dataset's 0 = Sunday convention.
pub(crate) const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Converts the `date` column into day offsets from the first date, for
/// plain-f64 time axes. Returns the base date and one offset per row (null
/// dates stay null).
pub(crate) fn date_offsets(dates: &DatetimeChunked) -> Result<(NaiveDate, Vec<Option<f64>>)> {
    let base_micros = dates
        .min()
        .ok_or_else(|| ChartError::InvalidData("no valid dates in frame".to_string()))?;
    let base = micros_to_date(base_micros)
        .ok_or_else(|| ChartError::InvalidData("date out of range".to_string()))?;

    let offsets = (0..dates.len())
        .map(|idx| {
            dates
                .get(idx)
                .and_then(micros_to_date)
                .map(|date| (date - base).num_days() as f64)
        })
        .collect();
    Ok((base, offsets))
}

pub(crate) fn micros_to_date(micros: i64) -> Option<NaiveDate> {
    chrono::DateTime::from_timestamp_micros(micros).map(|dt| dt.date_naive())
}

pub(crate) fn format_day_offset(base: NaiveDate, offset: f64) -> String {
    (base + chrono::Duration::days(offset.round() as i64))
        .format("%Y-%m")
        .to_string()
}

/// Centered rolling mean used for presentation smoothing (chart 8); nulls
/// inside the window shrink the divisor rather than poisoning the mean.
pub(crate) fn centered_rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let half = window / 2;
    (0..values.len())
        .map(|idx| {
            let start = idx.saturating_sub(half);
            let end = (idx + half + 1).min(values.len());
            let window_values: Vec<f64> = values[start..end].iter().flatten().copied().collect();
            if window_values.is_empty() {
                None
            } else {
                Some(window_values.iter().sum::<f64>() / window_values.len() as f64)
            }
        })
        .collect()
}

pub(crate) fn thousands(value: f64) -> String {
    let rounded = value.round() as i64;
    let digits = rounded.abs().to_string();
    let mut grouped = String::new();
    for (idx, c) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if rounded < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

/// Non-null maximum with a floor of `min`, for padding axis ranges.
pub(crate) fn axis_max(values: impl Iterator<Item = Option<f64>>, min: f64) -> f64 {
    values.flatten().fold(min, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousands_groups_digits() {
        assert_eq!(thousands(0.0), "0");
        assert_eq!(thousands(999.0), "999");
        assert_eq!(thousands(1000.0), "1,000");
        assert_eq!(thousands(1234567.4), "1,234,567");
        assert_eq!(thousands(-1234567.0), "-1,234,567");
    }

    #[test]
    fn centered_rolling_mean_handles_nulls_and_edges() {
        let values = vec![Some(1.0), Some(2.0), None, Some(4.0), Some(5.0)];
        let smoothed = centered_rolling_mean(&values, 3);
        assert_eq!(smoothed.len(), 5);
        assert_eq!(smoothed[0], Some(1.5));
        assert_eq!(smoothed[2], Some(3.0));
        assert_eq!(smoothed[4], Some(4.5));
        assert_eq!(centered_rolling_mean(&[None, None], 3), vec![None, None]);
    }

    #[test]
    fn registry_is_complete_and_ordered() {
        let descriptors = all_chart_descriptors();
        assert_eq!(descriptors.len(), 11);
        let mut names: Vec<&str> = descriptors.iter().map(|d| d.file_name).collect();
        let original = names.clone();
        names.sort();
        assert_eq!(names, original);
    }
}
