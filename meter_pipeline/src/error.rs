use chrono::NaiveDateTime;
use polars::prelude::PolarsError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Frame operation failed: {0}")]
    Polars(#[from] PolarsError),
    #[error("Column '{column}' not found in {path}")]
    MissingColumn { path: PathBuf, column: String },
    #[error("Unparseable timestamp in {path} at row {row}: '{value}'")]
    UnparseableTimestamp {
        path: PathBuf,
        row: usize,
        value: String,
    },
    #[error("Household '{household_id}' appears more than once in {path}")]
    DuplicateHousehold { path: PathBuf, household_id: String },
    #[error("No {table} rows left after selecting year {year}")]
    EmptySelection { table: String, year: i32 },
    #[error("{count} missing values remain after imputation (households: {households:?})")]
    ResidualNulls { count: usize, households: Vec<String> },
    #[error("Unexpected gap of {delta_minutes} minutes after {after}")]
    UnexpectedGap {
        after: NaiveDateTime,
        delta_minutes: i64,
    },
    #[error("Merged frame has a null {column} at row {row}")]
    NullInMergedFrame { row: usize, column: &'static str },
    #[error("No input files match '{pattern}'")]
    NoInputFiles { pattern: String },
    #[error("Invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),
    #[error("Weather coverage for {year} is incomplete: expected {expected} hourly rows, found {actual}")]
    IncompleteCoverage {
        year: i32,
        expected: usize,
        actual: usize,
    },
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
