//! Ranking charts: horizontal bars for top counties, states and mortality.

use std::path::{Path, PathBuf};

use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use polars::prelude::*;

use crate::analysis;

use super::{thousands, ChartError, ChartSize, Result, CASES_BLUE, DEATHS_RED};

/// Chart 2: top 10 counties by final cumulative cases.
pub fn top_counties(df: &DataFrame, outdir: &Path, size: ChartSize) -> Result<PathBuf> {
    let top = analysis::top_counties(df, "cases", 10)?;
    let counties = top.column("county")?.str()?;
    let states = top.column("state")?.str()?;
    let cases = top.column("cases")?.f64()?;

    let mut entries = Vec::with_capacity(top.height());
    for idx in 0..top.height() {
        if let (Some(county), Some(state), Some(value)) =
            (counties.get(idx), states.get(idx), cases.get(idx))
        {
            entries.push((format!("{} ({})", title_case(county), title_case(state)), value));
        }
    }

    horizontal_bar_chart(
        &outdir.join("02_top_counties_cases.png"),
        "Top 10 counties by cumulative cases",
        "Cumulative cases",
        &entries,
        DEATHS_RED,
        &|v| thousands(v),
        size,
    )
}

/// Chart 6: top 10 states by final cumulative cases.
pub fn top_states(df: &DataFrame, outdir: &Path, size: ChartSize) -> Result<PathBuf> {
    let top = analysis::top_states(df, "cases", 10)?;
    let states = top.column("state")?.str()?;
    let cases = top.column("cases")?.f64()?;

    let mut entries = Vec::with_capacity(top.height());
    for idx in 0..top.height() {
        if let (Some(state), Some(value)) = (states.get(idx), cases.get(idx)) {
            entries.push((title_case(state), value));
        }
    }

    horizontal_bar_chart(
        &outdir.join("06_top_states_cases.png"),
        "Top 10 states by cumulative cases",
        "Cumulative cases",
        &entries,
        CASES_BLUE,
        &|v| thousands(v),
        size,
    )
}

/// Chart 7: top 15 states by mortality rate among states with enough cases
/// for the rate to be meaningful.
pub fn state_mortality(df: &DataFrame, outdir: &Path, size: ChartSize) -> Result<PathBuf> {
    let top = analysis::state_mortality(df, 10_000.0, 15)?;
    let states = top.column("state")?.str()?;
    let rates = top.column("mortality_rate")?.f64()?;

    let mut entries = Vec::with_capacity(top.height());
    for idx in 0..top.height() {
        if let (Some(state), Some(rate)) = (states.get(idx), rates.get(idx)) {
            entries.push((title_case(state), rate));
        }
    }

    horizontal_bar_chart(
        &outdir.join("07_state_mortality.png"),
        "Top 15 states by mortality rate",
        "Mortality rate (%)",
        &entries,
        DEATHS_RED,
        &|v| format!("{v:.2}%"),
        size,
    )
}

/// Ranked horizontal bars, largest at the top, value labels past the bar end
/// and category labels inside the bar start.
fn horizontal_bar_chart(
    path: &Path,
    title: &str,
    x_label: &str,
    entries: &[(String, f64)],
    base_color: RGBColor,
    value_fmt: &dyn Fn(f64) -> String,
    size: ChartSize,
) -> Result<PathBuf> {
    if entries.is_empty() {
        return Err(ChartError::InvalidData(format!(
            "no rows to rank for '{title}'"
        )));
    }

    let n = entries.len();
    let x_max = entries.iter().map(|(_, v)| *v).fold(1.0, f64::max) * 1.18;

    let root = BitMapBackend::new(path, (size.width, size.height)).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| ChartError::DrawingArea(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 36))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(20)
        .build_cartesian_2d(0f64..x_max, 0f64..n as f64)
        .map_err(|e| ChartError::ChartConfig(e.to_string()))?;

    // Percent-scale axes keep a decimal; count-scale axes group digits.
    let axis_fmt = |x: &f64| {
        if x_max <= 200.0 {
            format!("{x:.1}")
        } else {
            thousands(*x)
        }
    };
    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(0)
        .x_desc(x_label)
        .x_label_formatter(&axis_fmt)
        .label_style(("sans-serif", 18))
        .draw()
        .map_err(|e| ChartError::Drawing(e.to_string()))?;

    for (rank, (label, value)) in entries.iter().enumerate() {
        // rank 0 renders at the top of the axis
        let y0 = (n - 1 - rank) as f64 + 0.15;
        let y1 = (n - 1 - rank) as f64 + 0.85;
        let t = 1.0 - rank as f64 / n as f64;

        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(0.0, y0), (*value, y1)],
                ramp(base_color, t).filled(),
            )))
            .map_err(|e| ChartError::Drawing(e.to_string()))?;

        let label_style = TextStyle::from(("sans-serif", 18).into_font())
            .pos(Pos::new(HPos::Left, VPos::Center));
        chart
            .draw_series(std::iter::once(Text::new(
                label.clone(),
                (x_max * 0.01, (y0 + y1) / 2.0),
                label_style.color(&BLACK),
            )))
            .map_err(|e| ChartError::Drawing(e.to_string()))?;

        let value_style = TextStyle::from(("sans-serif", 18).into_font())
            .pos(Pos::new(HPos::Left, VPos::Center));
        chart
            .draw_series(std::iter::once(Text::new(
                value_fmt(*value),
                (*value + x_max * 0.012, (y0 + y1) / 2.0),
                value_style.color(&BLACK),
            )))
            .map_err(|e| ChartError::Drawing(e.to_string()))?;
    }

    root.present()
        .map_err(|e| ChartError::Drawing(e.to_string()))?;
    Ok(path.to_path_buf())
}

/// Shade of `color` scaled by rank weight `t` in [0, 1]; higher is stronger.
fn ramp(color: RGBColor, t: f64) -> RGBColor {
    let f = 0.35 + 0.65 * t.clamp(0.0, 1.0);
    let channel = |c: u8| (255.0 - (255.0 - c as f64) * f).round() as u8;
    RGBColor(channel(color.0), channel(color.1), channel(color.2))
}

fn title_case(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
