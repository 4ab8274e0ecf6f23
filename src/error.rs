//! Error types for loading and aggregating transaction tables.

use std::fmt;

/// Failure raised while loading or aggregating a table.
///
/// Every variant aborts the aggregation: no partial summary is produced.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("required column '{column}' is missing from the input")]
    MissingColumn { column: String },

    #[error("no valid dates in {source_desc} (expected format {format})")]
    DateParse { source_desc: String, format: String },

    #[error("the input file contains no data rows")]
    EmptyInput,

    #[error("not enough data to compute {metric}: {reason}")]
    InsufficientData { metric: String, reason: String },

    #[error("invalid value '{value}' in column '{column}' at row {row}")]
    InvalidValue {
        column: String,
        row: usize,
        value: String,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Tag identifying the kind of an [`AnalysisError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MissingColumn,
    DateParse,
    EmptyInput,
    InsufficientData,
    InvalidValue,
    Csv,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::MissingColumn => write!(f, "MissingColumnError"),
            ErrorKind::DateParse => write!(f, "DateParseError"),
            ErrorKind::EmptyInput => write!(f, "EmptyInputError"),
            ErrorKind::InsufficientData => write!(f, "InsufficientDataError"),
            ErrorKind::InvalidValue => write!(f, "InvalidValueError"),
            ErrorKind::Csv => write!(f, "CsvError"),
            ErrorKind::Io => write!(f, "IoError"),
        }
    }
}

impl AnalysisError {
    /// Returns the kind tag of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::MissingColumn { .. } => ErrorKind::MissingColumn,
            AnalysisError::DateParse { .. } => ErrorKind::DateParse,
            AnalysisError::EmptyInput => ErrorKind::EmptyInput,
            AnalysisError::InsufficientData { .. } => ErrorKind::InsufficientData,
            AnalysisError::InvalidValue { .. } => ErrorKind::InvalidValue,
            AnalysisError::Csv(_) => ErrorKind::Csv,
            AnalysisError::Io(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn missing_column(column: &str) -> Self {
        AnalysisError::MissingColumn {
            column: column.to_string(),
        }
    }

    pub(crate) fn insufficient(metric: &str, reason: &str) -> Self {
        AnalysisError::InsufficientData {
            metric: metric.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
