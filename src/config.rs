//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.salesanalyser.toml` files.

use crate::cli::{OutputFormat, Profile};
use crate::loader::DateSource;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".salesanalyser.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Input column names.
    #[serde(default)]
    pub columns: ColumnsConfig,

    /// Purchase date parsing.
    #[serde(default)]
    pub date: DateConfig,

    /// Metric and chart settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Default report format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            format: OutputFormat::default(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "sales_analysis_results.md".to_string()
}

/// Column names expected in the input file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnsConfig {
    pub customer_id: String,
    pub order_id: String,
    pub product_id: String,
    pub purchase_amount: String,
    pub quantity: String,
    pub shipping_cost: String,
    pub tax_amount: String,
    pub unit_price: String,
    pub customer_age: String,
    pub customer_rating: String,
    pub product_category: String,
    pub payment_method: String,
    pub region: String,
    pub customer_gender: String,
    pub discount_applied: String,
    pub customer_loyalty: String,
    pub return_status: String,
    pub order_channel: String,
    pub delivery_method: String,
    pub purchase_source: String,
    pub transaction_time: String,
    pub date: String,
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            customer_id: "Customer_ID".to_string(),
            order_id: "Order_ID".to_string(),
            product_id: "Product_ID".to_string(),
            purchase_amount: "Purchase_Amount".to_string(),
            quantity: "Quantity".to_string(),
            shipping_cost: "Shipping_Cost".to_string(),
            tax_amount: "Tax_Amount".to_string(),
            unit_price: "Unit_Price".to_string(),
            customer_age: "Customer_Age".to_string(),
            customer_rating: "Customer_Rating".to_string(),
            product_category: "Product_Category".to_string(),
            payment_method: "Payment_Method".to_string(),
            region: "Region".to_string(),
            customer_gender: "Customer_Gender".to_string(),
            discount_applied: "Discount_Applied".to_string(),
            customer_loyalty: "Customer_Loyalty".to_string(),
            return_status: "Return_Status".to_string(),
            order_channel: "Order_Channel".to_string(),
            delivery_method: "Delivery_Method".to_string(),
            purchase_source: "Purchase_Source".to_string(),
            transaction_time: "Transaction_Time".to_string(),
            date: "Date".to_string(),
        }
    }
}

/// Purchase date settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateConfig {
    /// chrono format string applied to the (composed) date text.
    #[serde(default = "default_date_format")]
    pub format: String,

    /// Column holding "day/month" fragments. Used together with `year_column`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_month_column: Option<String>,

    /// Column holding the year.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_column: Option<String>,
}

impl Default for DateConfig {
    fn default() -> Self {
        Self {
            format: default_date_format(),
            day_month_column: None,
            year_column: None,
        }
    }
}

fn default_date_format() -> String {
    "%d/%m/%Y".to_string()
}

/// Metric computation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Metric set to compute.
    #[serde(default)]
    pub profile: Profile,

    /// A day is a spike when its total exceeds this multiple of the mean daily total.
    #[serde(default = "default_spike_multiplier")]
    pub spike_multiplier: f64,

    /// Purchases above this percentile (0.0 - 1.0) are outliers.
    #[serde(default = "default_outlier_percentile")]
    pub outlier_percentile: f64,

    /// Number of named slices in the category pie chart.
    #[serde(default = "default_top_categories")]
    pub top_categories: usize,

    /// Number of bins in histogram charts.
    #[serde(default = "default_histogram_bins")]
    pub histogram_bins: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            profile: Profile::default(),
            spike_multiplier: default_spike_multiplier(),
            outlier_percentile: default_outlier_percentile(),
            top_categories: default_top_categories(),
            histogram_bins: default_histogram_bins(),
        }
    }
}

fn default_spike_multiplier() -> f64 {
    1.2
}

fn default_outlier_percentile() -> f64 {
    0.95
}

fn default_top_categories() -> usize {
    5
}

fn default_histogram_bins() -> usize {
    10
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Prefix for money values.
    #[serde(default = "default_currency")]
    pub currency_symbol: String,

    /// Include chart tables in Markdown reports.
    #[serde(default = "default_true")]
    pub include_charts: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            currency_symbol: default_currency(),
            include_charts: true,
        }
    }
}

fn default_currency() -> String {
    "$".to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.analysis.outlier_percentile) {
            anyhow::bail!("analysis.outlier_percentile must be between 0.0 and 1.0");
        }
        if self.analysis.spike_multiplier <= 0.0 {
            anyhow::bail!("analysis.spike_multiplier must be positive");
        }
        if self.analysis.histogram_bins == 0 {
            anyhow::bail!("analysis.histogram_bins must be at least 1");
        }
        if self.date.day_month_column.is_some() != self.date.year_column.is_some() {
            anyhow::bail!("date.day_month_column and date.year_column must be set together");
        }
        Ok(())
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(format) = args.format {
            self.general.format = format;
        }
        if let Some(profile) = args.profile {
            self.analysis.profile = profile;
        }

        // Date settings
        if let Some(ref fmt) = args.date_format {
            self.date.format = fmt.clone();
        }
        if let Some([day_month, year]) = args.date_columns.as_deref() {
            self.date.day_month_column = Some(day_month.clone());
            self.date.year_column = Some(year.clone());
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Log level after merging: `quiet` wins, then `general.verbose`.
    pub fn log_level(&self, quiet: bool) -> tracing::Level {
        if quiet {
            tracing::Level::ERROR
        } else if self.general.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Where the purchase date comes from.
    pub fn date_source(&self) -> DateSource {
        match (&self.date.day_month_column, &self.date.year_column) {
            (Some(day_month), Some(year)) => DateSource::Parts {
                day_month: day_month.clone(),
                year: year.clone(),
            },
            _ => DateSource::Column(self.columns.date.clone()),
        }
    }

    /// Report path, swapping in the format's extension when the output was
    /// left at the default name.
    pub fn output_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.general.output);
        if self.general.output == default_output() {
            path.with_extension(self.general.format.extension())
        } else {
            path
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
