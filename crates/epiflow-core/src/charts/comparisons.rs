//! Categorical comparison charts: weekday/weekend and day-of-week panels.

use std::path::{Path, PathBuf};

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use polars::prelude::*;

use crate::analysis;

use super::{
    ChartError, ChartSize, Result, CASES_BLUE, DAY_NAMES, DEATHS_PURPLE, DEATHS_RED, WARN_ORANGE,
};

/// Chart 5: mean daily cases and deaths, weekdays vs weekends, side by side.
pub fn weekday_weekend(df: &DataFrame, outdir: &Path, size: ChartSize) -> Result<PathBuf> {
    let means = analysis::weekday_weekend_means(df)?;
    let flags = means.column("is_weekend")?.f64()?;
    let cases = means.column("daily_cases")?.f64()?;
    let deaths = means.column("daily_deaths")?.f64()?;

    let mut case_bars: Vec<(String, f64, RGBColor)> = Vec::new();
    let mut death_bars: Vec<(String, f64, RGBColor)> = Vec::new();
    for idx in 0..means.height() {
        let Some(flag) = flags.get(idx) else { continue };
        let label = if flag == 1.0 { "Weekend" } else { "Weekday" };
        if let Some(value) = cases.get(idx) {
            let color = if flag == 1.0 { DEATHS_RED } else { CASES_BLUE };
            case_bars.push((label.to_string(), value, color));
        }
        if let Some(value) = deaths.get(idx) {
            let color = if flag == 1.0 { WARN_ORANGE } else { DEATHS_PURPLE };
            death_bars.push((label.to_string(), value, color));
        }
    }
    if case_bars.is_empty() {
        return Err(ChartError::InvalidData(
            "no weekday/weekend means to plot".to_string(),
        ));
    }

    let path = outdir.join("05_weekday_weekend.png");
    let root = BitMapBackend::new(&path, (size.width, size.height)).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| ChartError::DrawingArea(e.to_string()))?;
    let root = root
        .titled("Weekdays vs weekends", ("sans-serif", 36))
        .map_err(|e| ChartError::DrawingArea(e.to_string()))?;
    let panels = root.split_evenly((1, 2));

    bar_panel(
        &panels[0],
        "Mean daily cases",
        &case_bars,
        &|v| format!("{v:.1}"),
    )?;
    bar_panel(
        &panels[1],
        "Mean daily deaths",
        &death_bars,
        &|v| format!("{v:.2}"),
    )?;

    root.present()
        .map_err(|e| ChartError::Drawing(e.to_string()))?;
    Ok(path)
}

/// Chart 9: mean daily cases and deaths per day of week, Monday first,
/// weekend bars in a distinct color.
pub fn day_of_week(df: &DataFrame, outdir: &Path, size: ChartSize) -> Result<PathBuf> {
    let means = analysis::day_of_week_means(df)?;
    let days = means.column("day_of_week")?.f64()?;
    let cases = means.column("daily_cases")?.f64()?;
    let deaths = means.column("daily_deaths")?.f64()?;

    // Index means by the data's 0 = Sunday codes, then emit Monday..Sunday.
    let mut case_by_day = [None; 7];
    let mut death_by_day = [None; 7];
    for idx in 0..means.height() {
        let Some(code) = days.get(idx) else { continue };
        let code = code as usize;
        if code > 6 {
            continue;
        }
        case_by_day[code] = cases.get(idx);
        death_by_day[code] = deaths.get(idx);
    }

    let mut case_bars: Vec<(String, f64, RGBColor)> = Vec::new();
    let mut death_bars: Vec<(String, f64, RGBColor)> = Vec::new();
    for offset in 0..7usize {
        let code = (offset + 1) % 7; // Monday (1) through Sunday (0)
        let weekend = code == 0 || code == 6;
        if let Some(value) = case_by_day[code] {
            let color = if weekend { DEATHS_RED } else { CASES_BLUE };
            case_bars.push((DAY_NAMES[code].to_string(), value, color));
        }
        if let Some(value) = death_by_day[code] {
            let color = if weekend { WARN_ORANGE } else { DEATHS_PURPLE };
            death_bars.push((DAY_NAMES[code].to_string(), value, color));
        }
    }
    if case_bars.is_empty() {
        return Err(ChartError::InvalidData(
            "no day-of-week means to plot".to_string(),
        ));
    }

    let path = outdir.join("09_day_of_week.png");
    let root = BitMapBackend::new(&path, (size.width, size.height)).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| ChartError::DrawingArea(e.to_string()))?;
    let root = root
        .titled("Daily counts by day of week", ("sans-serif", 36))
        .map_err(|e| ChartError::DrawingArea(e.to_string()))?;
    let panels = root.split_evenly((2, 1));

    bar_panel(
        &panels[0],
        "Mean daily cases",
        &case_bars,
        &|v| format!("{v:.1}"),
    )?;
    bar_panel(
        &panels[1],
        "Mean daily deaths",
        &death_bars,
        &|v| format!("{v:.2}"),
    )?;

    root.present()
        .map_err(|e| ChartError::Drawing(e.to_string()))?;
    Ok(path)
}

/// Vertical bars with the category label under each bar and the value above.
/// The y range dips below zero to leave room for the category labels.
fn bar_panel(
    area: &DrawingArea<BitMapBackend, Shift>,
    title: &str,
    bars: &[(String, f64, RGBColor)],
    value_fmt: &dyn Fn(f64) -> String,
) -> Result<()> {
    if bars.is_empty() {
        return Err(ChartError::InvalidData(format!("no bars for '{title}'")));
    }

    let n = bars.len();
    let y_max = bars.iter().map(|(_, v, _)| *v).fold(1.0, f64::max) * 1.2;
    let y_min = -y_max * 0.12;

    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 26))
        .margin(15)
        .x_label_area_size(10)
        .y_label_area_size(70)
        .build_cartesian_2d(0f64..n as f64, y_min..y_max)
        .map_err(|e| ChartError::ChartConfig(e.to_string()))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(0)
        .label_style(("sans-serif", 16))
        .draw()
        .map_err(|e| ChartError::Drawing(e.to_string()))?;

    // Baseline at zero; bars rise from it, labels hang below it.
    chart
        .draw_series(std::iter::once(PathElement::new(
            vec![(0.0, 0.0), (n as f64, 0.0)],
            BLACK,
        )))
        .map_err(|e| ChartError::Drawing(e.to_string()))?;

    for (idx, (label, value, color)) in bars.iter().enumerate() {
        let x0 = idx as f64 + 0.18;
        let x1 = idx as f64 + 0.82;
        let center = idx as f64 + 0.5;

        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(x0, 0.0), (x1, *value)],
                color.filled(),
            )))
            .map_err(|e| ChartError::Drawing(e.to_string()))?;

        let value_style = TextStyle::from(("sans-serif", 18).into_font())
            .pos(Pos::new(HPos::Center, VPos::Bottom));
        chart
            .draw_series(std::iter::once(Text::new(
                value_fmt(*value),
                (center, *value + y_max * 0.015),
                value_style.color(&BLACK),
            )))
            .map_err(|e| ChartError::Drawing(e.to_string()))?;

        let label_style = TextStyle::from(("sans-serif", 18).into_font())
            .pos(Pos::new(HPos::Center, VPos::Top));
        chart
            .draw_series(std::iter::once(Text::new(
                label.clone(),
                (center, -y_max * 0.02),
                label_style.color(&BLACK),
            )))
            .map_err(|e| ChartError::Drawing(e.to_string()))?;
    }

    Ok(())
}
