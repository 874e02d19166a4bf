//! Run-to-completion orchestration: clean, transform, load, analyze, render.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use polars::prelude::DataFrame;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::charts::{self, ChartFailure, ChartSize};
use crate::cleaning::{self, CleanSummary};
use crate::config::PipelineConfig;
use crate::outputs::{OutputMetadata, OutputWriter};
use crate::{analysis, transform};

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub skip_charts: bool,
    pub skip_intermediate: bool,
}

#[derive(Debug, Serialize)]
pub struct PipelineRunSummary {
    pub run_id: Uuid,
    pub input: PathBuf,
    pub cleaning: CleanSummary,
    pub rows_transformed: usize,
    pub derived_columns: Vec<String>,
    pub artifacts: Vec<PathBuf>,
    pub charts_written: usize,
    pub chart_failures: Vec<ChartFailure>,
    pub duration_secs: f64,
}

/// Executes the full batch pipeline described by `config`.
pub fn run_full_pipeline(
    config: &PipelineConfig,
    options: RunOptions,
) -> Result<PipelineRunSummary> {
    config.validate()?;
    let started = Instant::now();
    let run_id = Uuid::new_v4();
    let input = &config.paths.input;

    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset");
    let cleaned_name = format!("{stem}_cleaned.csv");
    let transformed_name = format!("{stem}_transformed.csv");

    let writer = OutputWriter::new(&config.paths.output_dir)?;
    let mut artifacts: Vec<PathBuf> = Vec::new();

    // Stage 1+2: chunked extraction and cleaning, streamed to disk.
    info!(run_id = %run_id, input = %input.display(), "pipeline started");
    let cleaned_path = writer.dir().join(&cleaned_name);
    let cleaning_summary = cleaning::clean_csv(input, &cleaned_path, config.cleaning.chunk_size)
        .with_context(|| format!("failed to clean {}", input.display()))?;
    artifacts.push(cleaned_path.clone());

    // Stage 3: derived metrics over the cleaned frame.
    let cleaned = epiflow_reader::read_dataframe(&cleaned_path, config.cleaning.chunk_size)
        .context("failed to load cleaned data")?;
    let (transformed, derived_columns) = apply_transforms(&cleaned, config)?;
    info!(
        rows = transformed.height(),
        derived = derived_columns.len(),
        "transformations applied"
    );

    // Stage 4: multi-format load with metadata side-file and backup.
    artifacts.push(writer.write_csv(&transformed, &transformed_name)?);
    artifacts.push(writer.write_parquet(&transformed, &transformed_name.replace(".csv", ".parquet"))?);
    artifacts.push(writer.write_json(&transformed, &transformed_name.replace(".csv", ".json"))?);

    let derived_refs: Vec<&str> = derived_columns.iter().map(String::as_str).collect();
    let metadata = OutputMetadata::describe(
        &transformed,
        &transformed_name,
        "Case/mobility dataset with derived metrics",
        &derived_refs,
    );
    artifacts.push(writer.write_metadata(&transformed_name, &metadata)?);
    artifacts.push(writer.create_backup(&cleaned_name)?);

    // Stage 5: analysis aggregates.
    if !options.skip_intermediate {
        let national = analysis::aggregate_by_date(&transformed)?;
        artifacts.push(writer.write_csv(&national, "national_daily.csv")?);

        let top_states =
            analysis::top_states(&transformed, "cases", config.transform.top_n_states)?;
        artifacts.push(writer.write_csv(&top_states, "top_states.csv")?);

        let top_counties =
            analysis::top_counties(&transformed, "cases", config.transform.top_n_counties)?;
        artifacts.push(writer.write_csv(&top_counties, "top_counties.csv")?);
    }

    // Stage 6: chart rendering; per-chart failures are collected, not fatal.
    let mut charts_written = 0usize;
    let mut chart_failures = Vec::new();
    if !options.skip_charts {
        let report = charts::render_all(
            &transformed,
            &config.paths.figures_dir,
            ChartSize {
                width: config.charts.width,
                height: config.charts.height,
            },
        )?;
        charts_written = report.written.len();
        chart_failures = report.failures;
        artifacts.extend(report.written);
    }

    let summary = PipelineRunSummary {
        run_id,
        input: input.clone(),
        cleaning: cleaning_summary,
        rows_transformed: transformed.height(),
        derived_columns,
        artifacts,
        charts_written,
        chart_failures,
        duration_secs: started.elapsed().as_secs_f64(),
    };
    info!(
        run_id = %run_id,
        rows = summary.rows_transformed,
        artifacts = summary.artifacts.len(),
        duration_secs = summary.duration_secs,
        "pipeline finished"
    );
    Ok(summary)
}

/// The standard derived-metric set: 7-day moving averages on both daily
/// series, mortality rate, growth rate on daily cases, calendar features.
pub fn apply_transforms(
    df: &DataFrame,
    config: &PipelineConfig,
) -> Result<(DataFrame, Vec<String>)> {
    let window = config.transform.moving_average_window;
    let before: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();

    let df = transform::moving_average(df, "daily_cases", window)?;
    let df = transform::moving_average(&df, "daily_deaths", window)?;
    let df = transform::mortality_rate(&df)?;
    let df = transform::growth_rate(&df, "daily_cases")?;
    let df = transform::add_time_features(&df)?;

    let derived: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .filter(|name| !before.contains(name))
        .collect();
    Ok((df, derived))
}
