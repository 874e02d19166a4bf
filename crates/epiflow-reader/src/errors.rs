use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("header mismatch: {reason}")]
    SchemaMismatch { reason: String },

    #[error("missing required column '{column}'")]
    MissingColumn { column: String },

    #[error("data row {line_index} invalid in column '{column}': {message}")]
    DataRow {
        line_index: usize,
        column: String,
        message: String,
    },

    #[error("file did not contain any data rows")]
    EmptyData,

    #[error("failed to build chunk dataframe: {0}")]
    Polars(#[from] polars::error::PolarsError),
}
