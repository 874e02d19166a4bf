//! Relationship charts: scatter with trend, mobility correlations, heatmap.

use std::path::{Path, PathBuf};

use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use polars::prelude::*;

use crate::{analysis, stats};

use super::{
    variable_label, ChartError, ChartSize, Result, DROP_GREEN, MOBILITY_SERIES, WARN_ORANGE,
};

/// Chart 3: daily cases vs daily deaths with a least-squares trend line.
/// Values above the 99th percentile on either axis are trimmed for
/// readability, as in the source figures.
pub fn cases_vs_deaths(df: &DataFrame, outdir: &Path, size: ChartSize) -> Result<PathBuf> {
    let cases = df.column("daily_cases")?.f64()?;
    let deaths = df.column("daily_deaths")?.f64()?;

    let mut points: Vec<(f64, f64)> = Vec::new();
    for idx in 0..df.height() {
        if let (Some(x), Some(y)) = (cases.get(idx), deaths.get(idx)) {
            if x >= 0.0 && y >= 0.0 {
                points.push((x, y));
            }
        }
    }
    if points.len() < 2 {
        return Err(ChartError::InvalidData(
            "not enough complete case/death pairs".to_string(),
        ));
    }

    let mut xs: Vec<f64> = points.iter().map(|(x, _)| *x).collect();
    let mut ys: Vec<f64> = points.iter().map(|(_, y)| *y).collect();
    xs.sort_by(|a, b| a.total_cmp(b));
    ys.sort_by(|a, b| a.total_cmp(b));
    let x_cap = stats::quantile(&xs, 0.99);
    let y_cap = stats::quantile(&ys, 0.99);
    points.retain(|(x, y)| *x <= x_cap && *y <= y_cap);
    if points.len() < 2 {
        return Err(ChartError::InvalidData(
            "all points trimmed by the percentile cap".to_string(),
        ));
    }

    let (slope, intercept) = stats::linear_fit(&points).ok_or_else(|| {
        ChartError::InvalidData("degenerate case/death distribution".to_string())
    })?;

    let x_max = x_cap.max(1.0) * 1.02;
    let y_max = y_cap.max(1.0) * 1.05;

    let path = outdir.join("03_cases_vs_deaths.png");
    let root = BitMapBackend::new(&path, (size.width, size.height)).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| ChartError::DrawingArea(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Daily cases vs daily deaths", ("sans-serif", 36))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d(0f64..x_max, 0f64..y_max)
        .map_err(|e| ChartError::ChartConfig(e.to_string()))?;

    chart
        .configure_mesh()
        .x_desc("Daily cases")
        .y_desc("Daily deaths")
        .x_label_formatter(&|x| super::thousands(*x))
        .label_style(("sans-serif", 18))
        .draw()
        .map_err(|e| ChartError::Drawing(e.to_string()))?;

    chart
        .draw_series(
            points
                .iter()
                .map(|(x, y)| Circle::new((*x, *y), 2, super::CASES_BLUE.mix(0.35).filled())),
        )
        .map_err(|e| ChartError::Drawing(e.to_string()))?;

    let trend = [
        (0.0, intercept.max(0.0)),
        (x_max, slope * x_max + intercept),
    ];
    chart
        .draw_series(std::iter::once(PathElement::new(
            trend.to_vec(),
            super::DEATHS_RED.stroke_width(2),
        )))
        .map_err(|e| ChartError::Drawing(e.to_string()))?
        .label(format!("Trend: y = {slope:.4}x + {intercept:.2}"))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], super::DEATHS_RED));

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

/// Chart 4: Pearson correlation of each mobility category with daily cases.
/// Negative bars green (more movement, fewer cases), positive orange.
pub fn mobility_correlation(df: &DataFrame, outdir: &Path, size: ChartSize) -> Result<PathBuf> {
    let cases = df.column("daily_cases")?.f64()?;
    let case_values: Vec<Option<f64>> = (0..df.height()).map(|idx| cases.get(idx)).collect();

    let mut bars: Vec<(&str, f64)> = Vec::new();
    for &(code, label, _) in MOBILITY_SERIES.iter() {
        let Ok(column) = df.column(code) else { continue };
        let values = column.f64()?;
        let mobility: Vec<Option<f64>> = (0..df.height()).map(|idx| values.get(idx)).collect();
        if let Some(r) = stats::pearson(&mobility, &case_values) {
            bars.push((label, r));
        }
    }
    if bars.is_empty() {
        return Err(ChartError::InvalidData(
            "no mobility correlations could be computed".to_string(),
        ));
    }

    let magnitude = bars.iter().map(|(_, r)| r.abs()).fold(0.2, f64::max) * 1.35;
    let n = bars.len();

    let path = outdir.join("04_mobility_correlation.png");
    let root = BitMapBackend::new(&path, (size.width, size.height)).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| ChartError::DrawingArea(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            "Mobility change vs daily cases (correlation)",
            ("sans-serif", 36),
        )
        .margin(20)
        .x_label_area_size(10)
        .y_label_area_size(80)
        .build_cartesian_2d(0f64..n as f64, -magnitude..magnitude)
        .map_err(|e| ChartError::ChartConfig(e.to_string()))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(0)
        .y_desc("Correlation with daily cases")
        .label_style(("sans-serif", 18))
        .draw()
        .map_err(|e| ChartError::Drawing(e.to_string()))?;

    chart
        .draw_series(std::iter::once(PathElement::new(
            vec![(0.0, 0.0), (n as f64, 0.0)],
            BLACK,
        )))
        .map_err(|e| ChartError::Drawing(e.to_string()))?;

    for (idx, (label, r)) in bars.iter().enumerate() {
        let x0 = idx as f64 + 0.18;
        let x1 = idx as f64 + 0.82;
        let center = idx as f64 + 0.5;
        let color = if *r < 0.0 { DROP_GREEN } else { WARN_ORANGE };

        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(x0, 0.0), (x1, *r)],
                color.filled(),
            )))
            .map_err(|e| ChartError::Drawing(e.to_string()))?;

        let (value_anchor, value_y) = if *r >= 0.0 {
            (VPos::Bottom, *r + magnitude * 0.02)
        } else {
            (VPos::Top, *r - magnitude * 0.02)
        };
        let value_style = TextStyle::from(("sans-serif", 18).into_font())
            .pos(Pos::new(HPos::Center, value_anchor));
        chart
            .draw_series(std::iter::once(Text::new(
                format!("{r:.3}"),
                (center, value_y),
                value_style.color(&BLACK),
            )))
            .map_err(|e| ChartError::Drawing(e.to_string()))?;

        let (label_anchor, label_y) = if *r >= 0.0 {
            (VPos::Top, -magnitude * 0.03)
        } else {
            (VPos::Bottom, magnitude * 0.03)
        };
        let label_style = TextStyle::from(("sans-serif", 17).into_font())
            .pos(Pos::new(HPos::Center, label_anchor));
        chart
            .draw_series(std::iter::once(Text::new(
                label.to_string(),
                (center, label_y),
                label_style.color(&BLACK),
            )))
            .map_err(|e| ChartError::Drawing(e.to_string()))?;
    }

    root.present()
        .map_err(|e| ChartError::Drawing(e.to_string()))?;
    Ok(path)
}

/// Chart 11: annotated correlation heatmap over the full variable set,
/// diverging blue-white-red pinned to [-1, 1].
pub fn correlation_heatmap(df: &DataFrame, outdir: &Path, size: ChartSize) -> Result<PathBuf> {
    let columns = analysis::correlation_columns(df);
    if columns.len() < 2 {
        return Err(ChartError::InvalidData(
            "fewer than two numeric variables for the heatmap".to_string(),
        ));
    }
    let matrix = analysis::correlation_matrix(df, &columns)?;
    let n = columns.len();

    let path = outdir.join("11_correlation_heatmap.png");
    let root = BitMapBackend::new(&path, (size.width, size.height)).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| ChartError::DrawingArea(e.to_string()))?;

    // Leave room on the left and bottom for hand-placed variable labels.
    let label_span = n as f64 * 0.42;
    let mut chart = ChartBuilder::on(&root)
        .caption("Correlation of case counts and mobility", ("sans-serif", 36))
        .margin(20)
        .build_cartesian_2d(-label_span..n as f64, -label_span..n as f64)
        .map_err(|e| ChartError::ChartConfig(e.to_string()))?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(0)
        .y_labels(0)
        .draw()
        .map_err(|e| ChartError::Drawing(e.to_string()))?;

    for (j, name) in columns.iter().enumerate() {
        let values = matrix.column(name.as_str())?.f64()?;
        for i in 0..n {
            // Row 0 renders at the top.
            let y = (n - 1 - i) as f64;
            let x = j as f64;
            let r = values.get(i);

            chart
                .draw_series(std::iter::once(Rectangle::new(
                    [(x, y), (x + 1.0, y + 1.0)],
                    diverging_color(r).filled(),
                )))
                .map_err(|e| ChartError::Drawing(e.to_string()))?;
            chart
                .draw_series(std::iter::once(Rectangle::new(
                    [(x, y), (x + 1.0, y + 1.0)],
                    WHITE.stroke_width(1),
                )))
                .map_err(|e| ChartError::Drawing(e.to_string()))?;

            let text = match r {
                Some(r) => format!("{r:.2}"),
                None => "-".to_string(),
            };
            let strong = r.map_or(false, |r| r.abs() > 0.55);
            let ink = if strong { WHITE } else { BLACK };
            let cell_style = TextStyle::from(("sans-serif", 15).into_font())
                .pos(Pos::new(HPos::Center, VPos::Center));
            chart
                .draw_series(std::iter::once(Text::new(
                    text,
                    (x + 0.5, y + 0.5),
                    cell_style.color(&ink),
                )))
                .map_err(|e| ChartError::Drawing(e.to_string()))?;
        }
    }

    for (i, name) in columns.iter().enumerate() {
        let label = variable_label(name);

        let row_style = TextStyle::from(("sans-serif", 16).into_font())
            .pos(Pos::new(HPos::Right, VPos::Center));
        chart
            .draw_series(std::iter::once(Text::new(
                label.clone(),
                (-0.15, (n - 1 - i) as f64 + 0.5),
                row_style.color(&BLACK),
            )))
            .map_err(|e| ChartError::Drawing(e.to_string()))?;

        let column_style = TextStyle::from(("sans-serif", 16).into_font())
            .pos(Pos::new(HPos::Right, VPos::Center))
            .transform(FontTransform::Rotate270);
        chart
            .draw_series(std::iter::once(Text::new(
                label,
                (i as f64 + 0.5, -0.15),
                column_style.color(&BLACK),
            )))
            .map_err(|e| ChartError::Drawing(e.to_string()))?;
    }

    root.present()
        .map_err(|e| ChartError::Drawing(e.to_string()))?;
    Ok(path)
}

/// Diverging blue-white-red scale pinned to [-1, 1]; null cells are grey.
fn diverging_color(r: Option<f64>) -> RGBColor {
    let Some(r) = r else {
        return RGBColor(189, 195, 199);
    };
    let r = r.clamp(-1.0, 1.0);
    let lerp = |from: u8, to: u8, t: f64| (from as f64 + (to as f64 - from as f64) * t) as u8;
    if r < 0.0 {
        let t = -r;
        RGBColor(
            lerp(255, 59, t),
            lerp(255, 76, t),
            lerp(255, 192, t),
        )
    } else {
        RGBColor(
            lerp(255, 180, r),
            lerp(255, 4, r),
            lerp(255, 38, r),
        )
    }
}
