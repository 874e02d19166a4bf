use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use comfy_table::Table;
use tracing::info;
use tracing_subscriber::EnvFilter;

use epiflow_core::charts::{self, ChartSize};
use epiflow_core::cleaning;
use epiflow_core::config::PipelineConfig;
use epiflow_core::outputs::{OutputMetadata, OutputWriter};
use epiflow_core::analysis;
use epiflow_core::pipeline::{self, RunOptions};

#[derive(Parser, Debug)]
#[command(author, version, about = "Batch case/mobility data pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline: clean, transform, load, analyze, render
    Run(RunArgs),
    /// Clean a raw CSV (normalize, de-duplicate, drop empty rows)
    Clean(CleanArgs),
    /// Apply derived metrics to a cleaned CSV and write all output formats
    Transform(TransformArgs),
    /// Render the chart set from a cleaned or transformed CSV
    Charts(ChartsArgs),
    /// Print summary statistics for a cleaned or transformed CSV
    Stats(StatsArgs),
    /// Print file facts without loading the data
    Info(InfoArgs),
    /// Print the resolved configuration as TOML
    ShowConfig(ConfigArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Raw input CSV (overrides the config file)
    #[arg(long)]
    input: Option<PathBuf>,
    /// Artifact directory (overrides the config file)
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Skip chart rendering
    #[arg(long)]
    skip_charts: bool,
    /// Skip the per-aggregate CSV artifacts
    #[arg(long)]
    skip_intermediate: bool,
}

#[derive(Args, Debug)]
struct CleanArgs {
    /// Raw input CSV
    #[arg(long)]
    input: PathBuf,
    /// Cleaned output CSV (defaults to <output_dir>/<stem>_cleaned.csv)
    #[arg(long)]
    output: Option<PathBuf>,
    /// Rows per processing chunk
    #[arg(long)]
    chunk_size: Option<usize>,
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct TransformArgs {
    /// Cleaned input CSV
    #[arg(long)]
    input: PathBuf,
    /// Artifact directory
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ChartsArgs {
    /// Cleaned or transformed input CSV
    #[arg(long, required_unless_present = "list")]
    input: Option<PathBuf>,
    /// Directory for the rendered figures
    #[arg(long)]
    figures_dir: Option<PathBuf>,
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// List the chart registry instead of rendering
    #[arg(long)]
    list: bool,
}

#[derive(Args, Debug)]
struct StatsArgs {
    /// Cleaned or transformed input CSV
    #[arg(long)]
    input: PathBuf,
}

#[derive(Args, Debug)]
struct InfoArgs {
    /// Input CSV
    #[arg(long)]
    input: PathBuf,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run(args),
        Command::Clean(args) => clean(args),
        Command::Transform(args) => transform_cmd(args),
        Command::Charts(args) => charts_cmd(args),
        Command::Stats(args) => stats(args),
        Command::Info(args) => info_cmd(args),
        Command::ShowConfig(args) => show_config(args),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig> {
    PipelineConfig::load(path.map(PathBuf::as_path)).context("failed to load configuration")
}

fn run(args: RunArgs) -> Result<()> {
    let mut config = load_config(args.config.as_ref())?;
    if let Some(input) = args.input {
        config.paths.input = input;
    }
    if let Some(output_dir) = args.output_dir {
        config.paths.figures_dir = output_dir.join("figures");
        config.paths.output_dir = output_dir;
    }

    let summary = pipeline::run_full_pipeline(
        &config,
        RunOptions {
            skip_charts: args.skip_charts,
            skip_intermediate: args.skip_intermediate,
        },
    )?;

    println!("Run {} finished in {:.1}s", summary.run_id, summary.duration_secs);
    println!(
        "  rows: {} read, {} cleaned ({} duplicates, {} empty), {} transformed",
        summary.cleaning.rows_read,
        summary.cleaning.rows_written,
        summary.cleaning.duplicate_rows,
        summary.cleaning.empty_rows,
        summary.rows_transformed,
    );
    println!(
        "  derived columns: {}",
        summary.derived_columns.join(", ")
    );
    println!(
        "  artifacts: {} written, charts: {} rendered, {} failed",
        summary.artifacts.len(),
        summary.charts_written,
        summary.chart_failures.len(),
    );
    for failure in &summary.chart_failures {
        println!("    chart {} failed: {}", failure.code, failure.message);
    }
    Ok(())
}

fn clean(args: CleanArgs) -> Result<()> {
    let config = load_config(args.config.as_ref())?;
    let chunk_size = args.chunk_size.unwrap_or(config.cleaning.chunk_size);
    let output = args.output.unwrap_or_else(|| {
        let stem = args
            .input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("dataset");
        config.paths.output_dir.join(format!("{stem}_cleaned.csv"))
    });

    let summary = cleaning::clean_csv(&args.input, &output, chunk_size)
        .with_context(|| format!("failed to clean {}", args.input.display()))?;
    println!(
        "{} rows in, {} rows out ({} duplicates, {} empty) -> {}",
        summary.rows_read,
        summary.rows_written,
        summary.duplicate_rows,
        summary.empty_rows,
        output.display(),
    );
    Ok(())
}

fn transform_cmd(args: TransformArgs) -> Result<()> {
    let mut config = load_config(args.config.as_ref())?;
    if let Some(output_dir) = args.output_dir {
        config.paths.output_dir = output_dir;
    }

    let df = epiflow_reader::read_dataframe(&args.input, config.cleaning.chunk_size)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let (transformed, derived) = pipeline::apply_transforms(&df, &config)?;

    let stem = args
        .input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset");
    let name = format!("{stem}_transformed.csv");

    let writer = OutputWriter::new(&config.paths.output_dir)?;
    writer.write_csv(&transformed, &name)?;
    writer.write_parquet(&transformed, &name.replace(".csv", ".parquet"))?;
    writer.write_json(&transformed, &name.replace(".csv", ".json"))?;
    let derived_refs: Vec<&str> = derived.iter().map(String::as_str).collect();
    let metadata = OutputMetadata::describe(
        &transformed,
        &name,
        "Case/mobility dataset with derived metrics",
        &derived_refs,
    );
    writer.write_metadata(&name, &metadata)?;

    println!(
        "{} rows transformed, {} derived columns -> {}",
        transformed.height(),
        derived.len(),
        config.paths.output_dir.display(),
    );
    Ok(())
}

fn charts_cmd(args: ChartsArgs) -> Result<()> {
    if args.list {
        let mut table = Table::new();
        table.set_header(vec!["code", "file", "description"]);
        for descriptor in charts::all_chart_descriptors() {
            table.add_row(vec![
                descriptor.code,
                descriptor.file_name,
                descriptor.description,
            ]);
        }
        println!("{table}");
        return Ok(());
    }

    let config = load_config(args.config.as_ref())?;
    let input = args.input.context("--input is required when rendering")?;
    let figures_dir = args.figures_dir.unwrap_or(config.paths.figures_dir.clone());

    let df = epiflow_reader::read_dataframe(&input, config.cleaning.chunk_size)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let report = charts::render_all(
        &df,
        &figures_dir,
        ChartSize {
            width: config.charts.width,
            height: config.charts.height,
        },
    )?;

    println!(
        "{} charts rendered into {} ({} failed)",
        report.written.len(),
        figures_dir.display(),
        report.failures.len(),
    );
    for failure in &report.failures {
        println!("  chart {} failed: {}", failure.code, failure.message);
    }
    Ok(())
}

fn stats(args: StatsArgs) -> Result<()> {
    let df = epiflow_reader::read_dataframe(&args.input, epiflow_reader::DEFAULT_CHUNK_SIZE)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let summary = analysis::summary_statistics(&df)?;

    let statistics = summary.column("statistic")?.str()?;
    let variables: Vec<String> = summary
        .get_column_names()
        .iter()
        .skip(1)
        .map(|name| name.to_string())
        .collect();

    let mut table = Table::new();
    let mut header = vec!["statistic".to_string()];
    header.extend(variables.iter().cloned());
    table.set_header(header);

    for row in 0..summary.height() {
        let mut cells = vec![statistics.get(row).unwrap_or("").to_string()];
        for name in &variables {
            let values = summary.column(name.as_str())?.f64()?;
            let cell = match values.get(row) {
                Some(v) if v.is_finite() => format!("{v:.3}"),
                _ => "-".to_string(),
            };
            cells.push(cell);
        }
        table.add_row(cells);
    }
    println!("{table}");

    // National totals: final cumulative count per state, summed.
    let by_state = analysis::aggregate_by_state(&df)?;
    let cases = by_state.column("cases")?.f64()?.sum().unwrap_or(0.0);
    let deaths = by_state.column("deaths")?.f64()?.sum().unwrap_or(0.0);

    let mut totals = Table::new();
    totals.set_header(vec!["metric", "value"]);
    totals.add_row(vec!["states".to_string(), by_state.height().to_string()]);
    totals.add_row(vec!["cumulative cases".to_string(), format!("{cases:.0}")]);
    totals.add_row(vec!["cumulative deaths".to_string(), format!("{deaths:.0}")]);
    if cases > 0.0 {
        totals.add_row(vec![
            "mortality rate".to_string(),
            format!("{:.2}%", deaths / cases * 100.0),
        ]);
    }
    println!("{totals}");

    if let Some(range) = epiflow_core::outputs::date_range(&df) {
        println!("{} rows from {} to {}", df.height(), range.start, range.end);
    } else {
        println!("{} rows", df.height());
    }
    Ok(())
}

fn info_cmd(args: InfoArgs) -> Result<()> {
    let info = epiflow_reader::file_info(&args.input)
        .with_context(|| format!("failed to inspect {}", args.input.display()))?;
    info!(path = %info.path.display(), "inspected input file");
    println!("path:    {}", info.path.display());
    println!("size:    {:.2} MB", info.size_bytes as f64 / (1024.0 * 1024.0));
    println!("rows:    {}", info.total_rows);
    println!("columns: {}", info.columns.len());
    for column in &info.columns {
        println!("  - {column}");
    }
    Ok(())
}

fn show_config(args: ConfigArgs) -> Result<()> {
    let config = load_config(args.config.as_ref())?;
    let rendered = toml::to_string_pretty(&config).context("failed to render configuration")?;
    println!("{rendered}");
    Ok(())
}
