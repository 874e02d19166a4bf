use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use polars::io::parquet::write::{ParquetCompression, ParquetWriter, StatisticsOptions};
use polars::prelude::*;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

/// Writes pipeline artifacts into a single output directory.
pub struct OutputWriter {
    output_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

/// Side-file metadata describing a written dataset.
#[derive(Debug, Clone, Serialize)]
pub struct OutputMetadata {
    pub run_id: Uuid,
    pub source_file: String,
    pub description: String,
    pub created_at: String,
    pub total_rows: usize,
    pub total_columns: usize,
    pub columns: Vec<String>,
    pub date_range: Option<DateRange>,
    pub transformations_applied: Vec<String>,
}

impl OutputMetadata {
    pub fn describe(
        df: &DataFrame,
        source_file: &str,
        description: &str,
        transformations: &[&str],
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            source_file: source_file.to_string(),
            description: description.to_string(),
            created_at: Utc::now().to_rfc3339(),
            total_rows: df.height(),
            total_columns: df.width(),
            columns: df
                .get_column_names()
                .iter()
                .map(|name| name.to_string())
                .collect(),
            date_range: date_range(df),
            transformations_applied: transformations.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl OutputWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)
            .with_context(|| format!("failed to create {}", output_dir.display()))?;
        Ok(Self { output_dir })
    }

    pub fn dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn write_csv(&self, df: &DataFrame, name: &str) -> Result<PathBuf> {
        let path = self.target(name, "csv");
        let mut file = File::create(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        let mut out = df.clone();
        CsvWriter::new(&mut file)
            .finish(&mut out)
            .context("failed to write CSV")?;
        self.log_written(&path)?;
        Ok(path)
    }

    /// Record-oriented JSON (one array of row objects).
    pub fn write_json(&self, df: &DataFrame, name: &str) -> Result<PathBuf> {
        self.write_json_format(df, name, JsonFormat::Json)
    }

    /// Newline-delimited JSON, one object per row.
    pub fn write_json_lines(&self, df: &DataFrame, name: &str) -> Result<PathBuf> {
        self.write_json_format(df, name, JsonFormat::JsonLines)
    }

    fn write_json_format(&self, df: &DataFrame, name: &str, format: JsonFormat) -> Result<PathBuf> {
        let path = self.target(name, "json");
        let mut file = File::create(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        let mut out = df.clone();
        JsonWriter::new(&mut file)
            .with_json_format(format)
            .finish(&mut out)
            .context("failed to write JSON")?;
        self.log_written(&path)?;
        Ok(path)
    }

    pub fn write_parquet(&self, df: &DataFrame, name: &str) -> Result<PathBuf> {
        let path = self.target(name, "parquet");
        let mut file = File::create(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        let mut out = df.clone();
        ParquetWriter::new(&mut file)
            .with_compression(ParquetCompression::Zstd(None))
            .with_statistics(StatisticsOptions::default())
            .finish(&mut out)
            .context("failed to write parquet")?;
        self.log_written(&path)?;
        Ok(path)
    }

    /// Copies `name` to `{stem}_backup_{timestamp}{ext}` next to the original.
    pub fn create_backup(&self, name: &str) -> Result<PathBuf> {
        let source = self.output_dir.join(name);
        if !source.exists() {
            return Err(anyhow!("cannot back up missing file {}", source.display()));
        }

        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow!("invalid file name {}", source.display()))?;
        let extension = source
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let backup = self
            .output_dir
            .join(format!("{stem}_backup_{timestamp}{extension}"));

        std::fs::copy(&source, &backup)
            .with_context(|| format!("failed to copy {} to backup", source.display()))?;
        self.log_written(&backup)?;
        Ok(backup)
    }

    /// Writes `{stem}_metadata.json` next to the dataset it describes.
    pub fn write_metadata(&self, name: &str, metadata: &OutputMetadata) -> Result<PathBuf> {
        let stem = Path::new(name)
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow!("invalid file name {name}"))?;
        let path = self.output_dir.join(format!("{stem}_metadata.json"));

        let bytes = serde_json::to_vec_pretty(metadata).context("failed to serialize metadata")?;
        std::fs::write(&path, bytes)
            .with_context(|| format!("failed to write {}", path.display()))?;
        self.log_written(&path)?;
        Ok(path)
    }

    pub fn list_files(&self, extension: Option<&str>) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.output_dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if let Some(wanted) = extension {
                let wanted = wanted.trim_start_matches('.');
                if path.extension().and_then(|e| e.to_str()) != Some(wanted) {
                    continue;
                }
            }
            files.push(path);
        }
        files.sort();
        Ok(files)
    }

    fn target(&self, name: &str, extension: &str) -> PathBuf {
        let mut path = self.output_dir.join(name);
        if path.extension().and_then(|e| e.to_str()) != Some(extension) {
            path.set_extension(extension);
        }
        path
    }

    fn log_written(&self, path: &Path) -> Result<()> {
        let size = std::fs::metadata(path)?.len();
        info!(file = %path.display(), size_bytes = size, "artifact written");
        Ok(())
    }
}

/// Min/max of the `date` column formatted as `%Y-%m-%d`, when present.
pub fn date_range(df: &DataFrame) -> Option<DateRange> {
    let dates = df.column("date").ok()?.datetime().ok()?;
    let start = format_date(dates.min()?)?;
    let end = format_date(dates.max()?)?;
    Some(DateRange { start, end })
}

fn format_date(micros: i64) -> Option<String> {
    chrono::DateTime::from_timestamp_micros(micros)
        .map(|dt| dt.date_naive().format("%Y-%m-%d").to_string())
}
