//! Time-axis charts: national trajectory, mobility trends, moving averages.

use std::path::{Path, PathBuf};

use plotters::prelude::*;
use polars::lazy::dsl::col;
use polars::prelude::*;

use crate::analysis;
use crate::transform::DEFAULT_MOVING_AVERAGE_WINDOW;

use super::{
    axis_max, centered_rolling_mean, date_offsets, format_day_offset, ChartError, ChartSize,
    Result, CASES_BLUE, DEATHS_RED, MOBILITY_SERIES,
};

/// Chart 1: national daily cases (left axis) and deaths (right axis).
pub fn national_trajectory(df: &DataFrame, outdir: &Path, size: ChartSize) -> Result<PathBuf> {
    let national = analysis::aggregate_by_date(df)?;
    let dates = national.column("date")?.datetime()?;
    let (base, offsets) = date_offsets(dates)?;
    let cases = national.column("daily_cases")?.f64()?;
    let deaths = national.column("daily_deaths")?.f64()?;

    let mut case_points = Vec::with_capacity(national.height());
    let mut death_points = Vec::with_capacity(national.height());
    for idx in 0..national.height() {
        if let (Some(x), Some(y)) = (offsets[idx], cases.get(idx)) {
            case_points.push((x, y));
        }
        if let (Some(x), Some(y)) = (offsets[idx], deaths.get(idx)) {
            death_points.push((x, y));
        }
    }
    if case_points.is_empty() {
        return Err(ChartError::InvalidData(
            "no national daily case data to plot".to_string(),
        ));
    }

    let x_max = axis_max(offsets.iter().copied(), 1.0);
    let y_cases = axis_max(case_points.iter().map(|(_, y)| Some(*y)), 1.0) * 1.05;
    let y_deaths = axis_max(death_points.iter().map(|(_, y)| Some(*y)), 1.0) * 1.05;

    let path = outdir.join("01_national_trajectory.png");
    let root = BitMapBackend::new(&path, (size.width, size.height)).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| ChartError::DrawingArea(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .caption("National case and death trajectory", ("sans-serif", 36))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(95)
        .right_y_label_area_size(95)
        .build_cartesian_2d(0f64..x_max, 0f64..y_cases)
        .map_err(|e| ChartError::ChartConfig(e.to_string()))?
        .set_secondary_coord(0f64..x_max, 0f64..y_deaths);

    chart
        .configure_mesh()
        .x_desc("Date")
        .y_desc("Daily cases (national)")
        .x_label_formatter(&|x| format_day_offset(base, *x))
        .y_label_formatter(&|y| super::thousands(*y))
        .label_style(("sans-serif", 18))
        .draw()
        .map_err(|e| ChartError::Drawing(e.to_string()))?;

    chart
        .configure_secondary_axes()
        .y_desc("Daily deaths (national)")
        .y_label_formatter(&|y| super::thousands(*y))
        .label_style(("sans-serif", 18))
        .draw()
        .map_err(|e| ChartError::Drawing(e.to_string()))?;

    chart
        .draw_series(LineSeries::new(case_points, &CASES_BLUE))
        .map_err(|e| ChartError::Drawing(e.to_string()))?
        .label("Daily cases")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], CASES_BLUE));

    chart
        .draw_secondary_series(LineSeries::new(death_points, &DEATHS_RED))
        .map_err(|e| ChartError::Drawing(e.to_string()))?
        .label("Daily deaths")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], DEATHS_RED));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .label_font(("sans-serif", 18))
        .position(SeriesLabelPosition::UpperLeft)
        .draw()
        .map_err(|e| ChartError::Drawing(e.to_string()))?;

    root.present()
        .map_err(|e| ChartError::Drawing(e.to_string()))?;
    Ok(path)
}

/// Chart 8: national mean mobility per category over time, 7-day smoothed.
pub fn mobility_trends(df: &DataFrame, outdir: &Path, size: ChartSize) -> Result<PathBuf> {
    let present: Vec<(&str, &str, RGBColor)> = MOBILITY_SERIES
        .iter()
        .copied()
        .filter(|(code, _, _)| df.column(code).is_ok())
        .collect();
    if present.is_empty() {
        return Err(ChartError::InvalidData(
            "no mobility columns available".to_string(),
        ));
    }

    let daily = df
        .clone()
        .lazy()
        .group_by([col("date")])
        .agg(
            present
                .iter()
                .map(|(code, _, _)| col(*code).mean())
                .collect::<Vec<_>>(),
        )
        .sort(["date"], SortMultipleOptions::default())
        .collect()?;

    let dates = daily.column("date")?.datetime()?;
    let (base, offsets) = date_offsets(dates)?;
    let x_max = axis_max(offsets.iter().copied(), 1.0);

    let mut series: Vec<(&str, RGBColor, Vec<(f64, f64)>)> = Vec::with_capacity(present.len());
    let mut y_min = 0.0f64;
    let mut y_max = 0.0f64;
    for &(code, label, color) in present.iter() {
        let values = daily.column(code)?.f64()?;
        let raw: Vec<Option<f64>> = (0..daily.height()).map(|idx| values.get(idx)).collect();
        let smoothed = centered_rolling_mean(&raw, 7);

        let mut points = Vec::with_capacity(smoothed.len());
        for idx in 0..smoothed.len() {
            if let (Some(x), Some(y)) = (offsets[idx], smoothed[idx]) {
                y_min = y_min.min(y);
                y_max = y_max.max(y);
                points.push((x, y));
            }
        }
        series.push((label, color, points));
    }

    let path = outdir.join("08_mobility_trends.png");
    let root = BitMapBackend::new(&path, (size.width, size.height)).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| ChartError::DrawingArea(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Mobility trends (7-day smoothed)", ("sans-serif", 36))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(90)
        .build_cartesian_2d(0f64..x_max, (y_min - 5.0)..(y_max + 5.0))
        .map_err(|e| ChartError::ChartConfig(e.to_string()))?;

    chart
        .configure_mesh()
        .x_desc("Date")
        .y_desc("Mobility change vs baseline (%)")
        .x_label_formatter(&|x| format_day_offset(base, *x))
        .label_style(("sans-serif", 18))
        .draw()
        .map_err(|e| ChartError::Drawing(e.to_string()))?;

    // Baseline reference at 0%.
    chart
        .draw_series(std::iter::once(PathElement::new(
            vec![(0.0, 0.0), (x_max, 0.0)],
            BLACK.mix(0.5),
        )))
        .map_err(|e| ChartError::Drawing(e.to_string()))?;

    for (label, color, points) in series {
        chart
            .draw_series(LineSeries::new(points, color.stroke_width(2)))
            .map_err(|e| ChartError::Drawing(e.to_string()))?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .label_font(("sans-serif", 16))
        .position(SeriesLabelPosition::LowerRight)
        .draw()
        .map_err(|e| ChartError::Drawing(e.to_string()))?;

    root.present()
        .map_err(|e| ChartError::Drawing(e.to_string()))?;
    Ok(path)
}

/// Chart 10: stacked panels of raw daily counts with the trailing 7-day
/// moving average overlaid.
pub fn moving_average_panels(df: &DataFrame, outdir: &Path, size: ChartSize) -> Result<PathBuf> {
    let national = analysis::aggregate_by_date(df)?;
    let dates = national.column("date")?.datetime()?;
    let (base, offsets) = date_offsets(dates)?;
    if national.height() == 0 {
        return Err(ChartError::InvalidData(
            "no national daily data to plot".to_string(),
        ));
    }

    let path = outdir.join("10_moving_average.png");
    let root = BitMapBackend::new(&path, (size.width, size.height)).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| ChartError::DrawingArea(e.to_string()))?;
    let root = root
        .titled("Smoothed national trends", ("sans-serif", 36))
        .map_err(|e| ChartError::DrawingArea(e.to_string()))?;
    let panels = root.split_evenly((2, 1));

    let specs = [
        ("daily_cases", "Daily cases", CASES_BLUE),
        ("daily_deaths", "Daily deaths", DEATHS_RED),
    ];

    for (panel, (column, label, color)) in panels.iter().zip(specs) {
        let values = national.column(column)?.f64()?;
        let raw: Vec<Option<f64>> = (0..national.height()).map(|idx| values.get(idx)).collect();
        let averaged = trailing_mean(&raw, DEFAULT_MOVING_AVERAGE_WINDOW);

        let mut raw_points = Vec::with_capacity(raw.len());
        let mut avg_points = Vec::with_capacity(raw.len());
        for idx in 0..raw.len() {
            if let (Some(x), Some(y)) = (offsets[idx], raw[idx]) {
                raw_points.push((x, y));
            }
            if let (Some(x), Some(y)) = (offsets[idx], averaged[idx]) {
                avg_points.push((x, y));
            }
        }

        let x_max = axis_max(offsets.iter().copied(), 1.0);
        let y_max = axis_max(raw_points.iter().map(|(_, y)| Some(*y)), 1.0) * 1.05;

        let mut chart = ChartBuilder::on(panel)
            .caption(label, ("sans-serif", 26))
            .margin(15)
            .x_label_area_size(50)
            .y_label_area_size(95)
            .build_cartesian_2d(0f64..x_max, 0f64..y_max)
            .map_err(|e| ChartError::ChartConfig(e.to_string()))?;

        chart
            .configure_mesh()
            .x_desc("Date")
            .x_label_formatter(&|x| format_day_offset(base, *x))
            .y_label_formatter(&|y| super::thousands(*y))
            .label_style(("sans-serif", 16))
            .draw()
            .map_err(|e| ChartError::Drawing(e.to_string()))?;

        chart
            .draw_series(LineSeries::new(raw_points, color.mix(0.35)))
            .map_err(|e| ChartError::Drawing(e.to_string()))?
            .label(format!("{label} (raw)"))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.mix(0.35)));

        chart
            .draw_series(LineSeries::new(avg_points, color.stroke_width(3)))
            .map_err(|e| ChartError::Drawing(e.to_string()))?
            .label("7-day moving average")
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .label_font(("sans-serif", 16))
            .position(SeriesLabelPosition::UpperLeft)
            .draw()
            .map_err(|e| ChartError::Drawing(e.to_string()))?;
    }

    root.present()
        .map_err(|e| ChartError::Drawing(e.to_string()))?;
    Ok(path)
}

/// Trailing mean over the previous `window` values; null until the window is
/// full of non-null values. Mirrors the derived-metric definition.
fn trailing_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|idx| {
            if idx + 1 < window {
                return None;
            }
            let window_values = &values[idx + 1 - window..=idx];
            if window_values.iter().all(Option::is_some) {
                Some(window_values.iter().flatten().sum::<f64>() / window as f64)
            } else {
                None
            }
        })
        .collect()
}
