//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// SalesAnalyser - summary statistics for transaction CSV files
///
/// Load a CSV of purchases, compute totals, averages, breakdowns and
/// busiest days, and write a Markdown/JSON/CSV report plus chart series.
///
/// Examples:
///   salesanalyser --input sales.csv
///   salesanalyser --input sales.csv --format csv --output results.csv
///   salesanalyser --input sales.csv --profile extended --chart daily-sales
///   salesanalyser --input sales.csv --date-columns Day_Month,Year
///   salesanalyser --input sales.csv --custom-chart bar:Region:Purchase_Amount
///   salesanalyser --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// CSV file with one transaction per row
    #[arg(short, long, value_name = "FILE", required_unless_present = "init_config")]
    pub input: Option<PathBuf>,

    /// Output file path for the report
    ///
    /// Default: from config or sales_analysis_results.md
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json, csv)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .salesanalyser.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Metric set to compute (basic, extended)
    ///
    /// The extended set also needs order, product, tax, price, rating,
    /// channel, delivery, source and time-of-day columns.
    #[arg(short, long, value_name = "PROFILE", env = "SALESANALYSER_PROFILE")]
    pub profile: Option<Profile>,

    /// chrono format string used to parse purchase dates
    #[arg(long, value_name = "FMT")]
    pub date_format: Option<String>,

    /// Build the date from a day-month column and a year column
    ///
    /// Example: --date-columns Day_Month,Year
    #[arg(long, value_name = "DAYMONTH,YEAR", value_delimiter = ',')]
    pub date_columns: Option<Vec<String>>,

    /// Predefined chart series to export (repeatable)
    #[arg(long, value_name = "CHART")]
    pub chart: Vec<ChartName>,

    /// Custom chart over arbitrary columns (repeatable)
    ///
    /// Syntax: KIND:X[:Y[:COLOR]], e.g. bar:Region:Purchase_Amount
    #[arg(long, value_name = "SPEC")]
    pub custom_chart: Vec<String>,

    /// File to write chart series to (JSON)
    ///
    /// Default: the report path with a .charts.json extension
    #[arg(long, value_name = "FILE")]
    pub chart_output: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: load and validate the file without computing metrics
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .salesanalyser.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
    /// CSV with Metric,Value columns
    Csv,
}

impl OutputFormat {
    /// Default file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }
}

/// Which metrics to compute.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Core sales metrics
    #[default]
    Basic,
    /// Core metrics plus orders, products, tax, ratings, spikes and outliers
    Extended,
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Profile::Basic => write!(f, "basic"),
            Profile::Extended => write!(f, "extended"),
        }
    }
}

/// Predefined charts selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ChartName {
    DailySales,
    SalesByCategory,
    PaymentMethods,
    SalesByRegion,
    GenderSplit,
    PurchaseAmounts,
    CategoryRegion,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Validate the input file
        match self.input {
            Some(ref path) => {
                if !path.exists() {
                    return Err(format!("Input file does not exist: {}", path.display()));
                }
                if !path.is_file() {
                    return Err(format!("Input path is not a file: {}", path.display()));
                }
            }
            None => return Err("An input file is required (--input)".to_string()),
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref fmt) = self.date_format {
            if fmt.trim().is_empty() {
                return Err("Date format must not be empty".to_string());
            }
        }

        if let Some(ref cols) = self.date_columns {
            if cols.len() != 2 || cols.iter().any(|c| c.trim().is_empty()) {
                return Err(
                    "--date-columns expects exactly two column names: DAYMONTH,YEAR".to_string(),
                );
            }
        }

        for spec in &self.custom_chart {
            crate::charts::CustomChart::parse(spec)?;
        }

        Ok(())
    }

    /// Whether any chart series were requested.
    pub fn wants_charts(&self) -> bool {
        !self.chart.is_empty() || !self.custom_chart.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args(input: PathBuf) -> Args {
        Args {
            input: Some(input),
            output: None,
            format: None,
            config: None,
            profile: None,
            date_format: None,
            date_columns: None,
            chart: Vec::new(),
            custom_chart: Vec::new(),
            chart_output: None,
            verbose: false,
            quiet: false,
            dry_run: false,
            init_config: false,
        }
    }

    fn existing_file() -> tempfile::NamedTempFile {
        tempfile::NamedTempFile::new().unwrap()
    }

    #[test]
    fn test_validation_missing_input() {
        let args = make_args(PathBuf::from("/definitely/not/here.csv"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_ok() {
        let file = existing_file();
        let args = make_args(file.path().to_path_buf());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let file = existing_file();
        let mut args = make_args(file.path().to_path_buf());
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_bad_custom_chart() {
        let file = existing_file();
        let mut args = make_args(file.path().to_path_buf());
        args.custom_chart = vec!["donut:Region".to_string()];
        assert!(args.validate().is_err());

        args.custom_chart = vec!["bar:Region:Purchase_Amount".to_string()];
        assert!(args.validate().is_ok());
        assert!(args.wants_charts());
    }

    #[test]
    fn test_init_config_skips_validation() {
        let mut args = make_args(PathBuf::from("missing.csv"));
        args.init_config = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_parse_from_command_line() {
        let args = Args::try_parse_from([
            "salesanalyser",
            "--input",
            "sales.csv",
            "--format",
            "csv",
            "--profile",
            "extended",
            "--date-columns",
            "Day_Month,Year",
            "--chart",
            "daily-sales",
        ])
        .unwrap();
        assert_eq!(args.format, Some(OutputFormat::Csv));
        assert_eq!(args.profile, Some(Profile::Extended));
        assert_eq!(
            args.date_columns,
            Some(vec!["Day_Month".to_string(), "Year".to_string()])
        );
        assert_eq!(args.chart, vec![ChartName::DailySales]);
    }
}
