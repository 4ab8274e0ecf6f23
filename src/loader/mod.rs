//! CSV loading and typed column access.
//!
//! The loader reads an entire transaction file into an immutable [`Table`].
//! Cells are kept as text; typed views (numbers, dates) are produced on
//! demand by the aggregator so every metric validates only the columns it
//! actually reads.

use crate::error::{AnalysisError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

/// Where the purchase date is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateSource {
    /// A single column holding the full date.
    Column(String),
    /// A "day/month" column joined with a year column.
    Parts { day_month: String, year: String },
}

impl DateSource {
    /// Columns this source reads.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            DateSource::Column(name) => vec![name.as_str()],
            DateSource::Parts { day_month, year } => vec![day_month.as_str(), year.as_str()],
        }
    }

    /// Human-readable description for error messages.
    pub fn describe(&self) -> String {
        match self {
            DateSource::Column(name) => format!("column '{}'", name),
            DateSource::Parts { day_month, year } => {
                format!("columns '{}' + '{}'", day_month, year)
            }
        }
    }
}

/// An in-memory table of transaction rows.
#[derive(Debug, Clone)]
pub struct Table {
    headers: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Build a table from headers and rows of cells.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let mut index = HashMap::new();
        for (i, name) in headers.iter().enumerate() {
            // First occurrence wins for duplicated headers
            index.entry(name.clone()).or_insert(i);
        }
        Self {
            headers,
            index,
            rows,
        }
    }

    /// Read a table from any CSV source.
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    #[cfg(test)]
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Self::read_csv(reader, None)
    }

    fn read_csv<R: Read>(reader: R, progress: Option<&ProgressBar>) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = rdr
            .byte_headers()?
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let name = String::from_utf8_lossy(h).into_owned();
                if i == 0 {
                    name.trim_start_matches('\u{feff}').to_string()
                } else {
                    name
                }
            })
            .collect();

        let mut rows = Vec::new();
        for record in rdr.byte_records() {
            let record = record?;
            let row: Vec<String> = record
                .iter()
                .map(|cell| String::from_utf8_lossy(cell).into_owned())
                .collect();
            rows.push(row);

            if let Some(pb) = progress {
                pb.inc(1);
            }
        }

        debug!("Read {} columns and {} rows", headers.len(), rows.len());
        Ok(Self::new(headers, rows))
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names in file order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Whether a column exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Fail with the first column in `names` that is absent.
    pub fn require<'a, I>(&self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        for name in names {
            if !self.has_column(name) {
                return Err(AnalysisError::missing_column(name));
            }
        }
        Ok(())
    }

    fn column_index(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| AnalysisError::missing_column(name))
    }

    /// Text cells of a column. Short rows yield empty strings.
    pub fn text(&self, name: &str) -> Result<Vec<&str>> {
        let idx = self.column_index(name)?;
        Ok(self
            .rows
            .iter()
            .map(|row| row.get(idx).map(String::as_str).unwrap_or(""))
            .collect())
    }

    /// Text cells of a column that must be filled on every row.
    pub fn required_text(&self, name: &str) -> Result<Vec<&str>> {
        let values = self.text(name)?;
        if let Some(row) = values.iter().position(|v| v.is_empty()) {
            return Err(AnalysisError::InvalidValue {
                column: name.to_string(),
                row: row + 1,
                value: String::new(),
            });
        }
        Ok(values)
    }

    /// Numeric cells of a column. Blank cells become `None`.
    pub fn numeric(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let values = self.text(name)?;
        values
            .iter()
            .enumerate()
            .map(|(row, raw)| parse_number(raw).map_err(|_| invalid(name, row, raw)))
            .collect()
    }

    /// Numeric cells of a column that must be filled on every row.
    pub fn required_numeric(&self, name: &str) -> Result<Vec<f64>> {
        let values = self.text(name)?;
        values
            .iter()
            .enumerate()
            .map(|(row, raw)| match parse_number(raw) {
                Ok(Some(v)) => Ok(v),
                _ => Err(invalid(name, row, raw)),
            })
            .collect()
    }

    /// Parse the purchase date of every row.
    ///
    /// Rows with unparseable dates yield `None`. Fails with
    /// [`AnalysisError::DateParse`] when no row has a valid date.
    pub fn dates(&self, source: &DateSource, format: &str) -> Result<Vec<Option<NaiveDate>>> {
        let texts: Vec<String> = match source {
            DateSource::Column(name) => self.text(name)?.into_iter().map(String::from).collect(),
            DateSource::Parts { day_month, year } => {
                let day_months = self.text(day_month)?;
                let years = self.text(year)?;
                day_months
                    .iter()
                    .zip(years.iter())
                    .map(|(dm, y)| compose_date(dm, y))
                    .collect()
            }
        };

        let parsed: Vec<Option<NaiveDate>> =
            texts.iter().map(|t| parse_date(t, format)).collect();

        let invalid_count = parsed.iter().filter(|d| d.is_none()).count();
        if invalid_count == parsed.len() {
            return Err(AnalysisError::DateParse {
                source_desc: source.describe(),
                format: format.to_string(),
            });
        }
        if invalid_count > 0 {
            warn!(
                "{} of {} rows have an invalid date in {}; they are left out of date-based metrics",
                invalid_count,
                parsed.len(),
                source.describe()
            );
        }

        Ok(parsed)
    }
}

fn invalid(column: &str, row: usize, raw: &str) -> AnalysisError {
    AnalysisError::InvalidValue {
        column: column.to_string(),
        row: row + 1,
        value: raw.to_string(),
    }
}

/// Parse a numeric cell. Blank cells are `Ok(None)`.
fn parse_number(raw: &str) -> std::result::Result<Option<f64>, std::num::ParseFloatError> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    let value: f64 = raw.parse()?;
    Ok(if value.is_finite() { Some(value) } else { None })
}

/// Join a "day/month" fragment with a year.
fn compose_date(day_month: &str, year: &str) -> String {
    let year = year.trim();
    // Years read through spreadsheets often come back as "2024.0"
    let year = year.strip_suffix(".0").unwrap_or(year);
    format!("{}/{}", day_month.trim(), year)
}

/// Parse a date, accepting a datetime in the same format and keeping its date.
fn parse_date(text: &str, format: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(text, format)
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(text, format)
                .ok()
                .map(|dt| dt.date())
        })
}

/// Load a CSV file from disk.
pub fn load_csv(path: &Path, show_progress: bool) -> anyhow::Result<Table> {
    use anyhow::Context;

    info!("Loading transactions from: {}", path.display());

    let file = File::open(path)
        .map_err(AnalysisError::from)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let progress_bar = if show_progress {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {pos} rows read")
        {
            pb.set_style(style);
        }
        Some(pb)
    } else {
        None
    };

    let table = Table::read_csv(file, progress_bar.as_ref())
        .with_context(|| format!("Failed to read CSV file: {}", path.display()))?;

    if let Some(pb) = progress_bar {
        pb.finish_and_clear();
    }

    info!(
        "Loaded {} rows with {} columns",
        table.len(),
        table.headers().len()
    );

    Ok(table)
}
