//! Error type shared by the table store and the resampler.

use chrono::NaiveDate;
use thiserror::Error;

use crate::structs::Field;

pub type Result<T> = std::result::Result<T, ChartingError>;

#[derive(Error, Debug)]
pub enum ChartingError {
    /// Structurally invalid input data.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("invalid date range: {start} is after {end}")]
    Range { start: NaiveDate, end: NaiveDate },

    #[error("no dates to partition")]
    EmptyInput,

    #[error("aggregation rule references missing field: {0}")]
    MissingField(Field),

    #[error("relabelled date {label} overlaps the neighbouring period ({neighbour})")]
    Overlap { label: NaiveDate, neighbour: NaiveDate },

    /// Raised when period derivation disagrees with the view it was derived from.
    /// Never a data problem.
    #[error("internal consistency violation: {0}")]
    InternalConsistency(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl ChartingError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        ChartingError::MalformedInput(msg.into())
    }
}
