//! Pipeline configuration, loaded from TOML with every field defaulted so a
//! missing or empty file is valid.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub cleaning: CleaningConfig,
    pub transform: TransformConfig,
    pub charts: ChartsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub figures_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("data/integrated.csv"),
            output_dir: PathBuf::from("output"),
            figures_dir: PathBuf::from("output/figures"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    pub chunk_size: usize,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            chunk_size: epiflow_reader::DEFAULT_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub moving_average_window: usize,
    pub top_n_states: usize,
    pub top_n_counties: usize,
    pub top_n_mortality: usize,
    pub mortality_min_cases: f64,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            moving_average_window: 7,
            top_n_states: 10,
            top_n_counties: 10,
            top_n_mortality: 15,
            mortality_min_cases: 10_000.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartsConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for ChartsConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 800,
        }
    }
}

impl PipelineConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads from `path` when given, otherwise returns validated defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_path(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.cleaning.chunk_size == 0 {
            return Err(PipelineError::Validation(
                "cleaning.chunk_size must be at least 1".to_string(),
            ));
        }
        if self.transform.moving_average_window < 2 {
            return Err(PipelineError::Validation(
                "transform.moving_average_window must be at least 2".to_string(),
            ));
        }
        for (name, value) in [
            ("transform.top_n_states", self.transform.top_n_states),
            ("transform.top_n_counties", self.transform.top_n_counties),
            ("transform.top_n_mortality", self.transform.top_n_mortality),
        ] {
            if value == 0 {
                return Err(PipelineError::Validation(format!(
                    "{name} must be at least 1"
                )));
            }
        }
        if self.charts.width == 0 || self.charts.height == 0 {
            return Err(PipelineError::Validation(
                "charts.width and charts.height must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
