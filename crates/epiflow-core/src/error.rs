use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("reader error: {0}")]
    Reader(#[from] epiflow_reader::ReaderError),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("chart rendering failed: {0}")]
    Chart(#[from] crate::charts::ChartError),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("data processing error: {0}")]
    Processing(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
