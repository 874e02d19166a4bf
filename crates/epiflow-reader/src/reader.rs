use std::fs::File;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use serde::Serialize;

use crate::errors::ReaderError;
use crate::schema::{
    classify_header, clean_optional_str, parse_date_micros, parse_optional_f64, ColumnRole,
};

/// Basic facts about an input file, gathered in a single streaming pass.
#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub total_rows: usize,
    pub columns: Vec<String>,
}

/// Streams a case/mobility CSV as fixed-size typed DataFrame chunks.
///
/// The header is validated once at open; every chunk except the last holds
/// exactly `chunk_size` rows, and the concatenation of all chunks is the
/// file's data rows in order.
pub struct ChunkedCsvReader {
    records: csv::StringRecordsIntoIter<File>,
    columns: Vec<String>,
    roles: Vec<ColumnRole>,
    chunk_size: usize,
    line_index: usize,
    rows_yielded: usize,
    finished: bool,
}

impl ChunkedCsvReader {
    pub fn open(path: impl AsRef<Path>, chunk_size: usize) -> Result<Self, ReaderError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(false)
            .from_reader(file);

        let mut records = reader.into_records();
        let header = records.next().ok_or(ReaderError::SchemaMismatch {
            reason: format!("{} is empty", path.display()),
        })??;
        let (columns, roles) = classify_header(&header)?;

        Ok(Self {
            records,
            columns,
            roles,
            chunk_size: chunk_size.max(1),
            line_index: 1,
            rows_yielded: 0,
            finished: false,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_chunk(&mut self) -> Result<Option<DataFrame>, ReaderError> {
        let mut builders: Vec<ColumnData> = self
            .roles
            .iter()
            .map(|role| ColumnData::new(*role, self.chunk_size))
            .collect();

        let mut rows = 0usize;
        while rows < self.chunk_size {
            let Some(record) = self.records.next() else {
                break;
            };
            let record = record?;
            self.line_index += 1;

            if record.len() != self.columns.len() {
                return Err(ReaderError::DataRow {
                    line_index: self.line_index,
                    column: String::new(),
                    message: format!(
                        "expected {} columns but found {}",
                        self.columns.len(),
                        record.len()
                    ),
                });
            }

            for (idx, builder) in builders.iter_mut().enumerate() {
                let value = record.get(idx).unwrap_or("");
                builder.push(value, self.line_index, &self.columns[idx])?;
            }
            rows += 1;
        }

        if rows == 0 {
            if self.rows_yielded == 0 {
                return Err(ReaderError::EmptyData);
            }
            return Ok(None);
        }

        self.rows_yielded += rows;

        let mut series: Vec<Column> = Vec::with_capacity(builders.len());
        for (builder, name) in builders.into_iter().zip(&self.columns) {
            series.push(builder.into_column(name)?);
        }
        Ok(Some(DataFrame::new(series)?))
    }
}

impl Iterator for ChunkedCsvReader {
    type Item = Result<DataFrame, ReaderError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_chunk() {
            Ok(Some(df)) => Some(Ok(df)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

enum ColumnData {
    Date(Vec<Option<i64>>),
    Categorical(Vec<Option<String>>),
    Numeric(Vec<Option<f64>>),
}

impl ColumnData {
    fn new(role: ColumnRole, capacity: usize) -> Self {
        match role {
            ColumnRole::Date => Self::Date(Vec::with_capacity(capacity)),
            ColumnRole::Categorical => Self::Categorical(Vec::with_capacity(capacity)),
            ColumnRole::Numeric => Self::Numeric(Vec::with_capacity(capacity)),
        }
    }

    fn push(&mut self, value: &str, line_index: usize, column: &str) -> Result<(), ReaderError> {
        match self {
            Self::Date(values) => values.push(parse_date_micros(value)),
            Self::Categorical(values) => values.push(clean_optional_str(value)),
            Self::Numeric(values) => values.push(parse_optional_f64(value, line_index, column)?),
        }
        Ok(())
    }

    fn into_column(self, name: &str) -> Result<Column, ReaderError> {
        let column = match self {
            Self::Date(values) => Series::new(name.into(), values)
                .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?
                .into(),
            Self::Categorical(values) => {
                let utf8: Vec<Option<&str>> = values.iter().map(|v| v.as_deref()).collect();
                Series::new(name.into(), utf8).into()
            }
            Self::Numeric(values) => Series::new(name.into(), values).into(),
        };
        Ok(column)
    }
}

/// Reads the whole file through the chunk iterator and vstacks the result.
pub fn read_dataframe(path: impl AsRef<Path>, chunk_size: usize) -> Result<DataFrame, ReaderError> {
    let reader = ChunkedCsvReader::open(path, chunk_size)?;
    let mut combined: Option<DataFrame> = None;
    for chunk in reader {
        let chunk = chunk?;
        match combined.as_mut() {
            None => combined = Some(chunk),
            Some(df) => {
                df.vstack_mut(&chunk)?;
            }
        }
    }
    combined.ok_or(ReaderError::EmptyData)
}

/// Reads only the first `n` data rows.
pub fn read_head(path: impl AsRef<Path>, n: usize) -> Result<DataFrame, ReaderError> {
    let mut reader = ChunkedCsvReader::open(path, n)?;
    match reader.next() {
        Some(chunk) => chunk,
        None => Err(ReaderError::EmptyData),
    }
}

/// Gathers file facts without materializing the data.
pub fn file_info(path: impl AsRef<Path>) -> Result<FileInfo, ReaderError> {
    let path = path.as_ref();
    let size_bytes = std::fs::metadata(path)?.len();

    let file = File::open(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(file);
    let mut records = reader.records();

    let header = records.next().ok_or(ReaderError::SchemaMismatch {
        reason: format!("{} is empty", path.display()),
    })??;
    let (columns, _) = classify_header(&header)?;

    let mut total_rows = 0usize;
    for record in records {
        record?;
        total_rows += 1;
    }

    Ok(FileInfo {
        path: path.to_path_buf(),
        size_bytes,
        total_rows,
        columns,
    })
}
