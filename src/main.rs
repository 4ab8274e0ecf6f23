//! SalesAnalyser - summary statistics for transaction CSV files
//!
//! A CLI tool that loads a table of purchases, reduces it to an ordered
//! list of sales metrics and writes them as Markdown, JSON or CSV,
//! optionally alongside chart series.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Invalid arguments, unreadable input or failed analysis

mod analysis;
mod charts;
mod cli;
mod config;
mod error;
mod loader;
mod models;
mod report;

use analysis::{Aggregator, AggregatorOptions};
use anyhow::{Context, Result};
use charts::ChartSettings;
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use error::AnalysisError;
use models::{Report, ReportMetadata};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration before logging so the file can raise verbosity
    let (mut config, config_source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(config.log_level(args.quiet));

    info!("SalesAnalyser v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: {}", config_source);
    debug!("Arguments: {:?}", args);

    if let Err(e) = run_analysis(args, config) {
        error!("Analysis failed: {:#}", e);
        eprintln!("\n❌ Error: {}", describe_error(&e));
        std::process::exit(1);
    }

    Ok(())
}

/// Prefix the message with the analysis error kind when there is one.
fn describe_error(e: &anyhow::Error) -> String {
    match e.chain().find_map(|cause| cause.downcast_ref::<AnalysisError>()) {
        Some(analysis_error) => format!("{}: {}", analysis_error.kind(), analysis_error),
        None => format!("{:#}", e),
    }
}

/// Handle --init-config: generate a default .salesanalyser.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to rename columns, change the date format, and more.");
    Ok(())
}

/// Initialize logging at the given level.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete analysis workflow.
fn run_analysis(args: Args, config: Config) -> Result<()> {
    let start_time = Instant::now();

    let input = args
        .input
        .clone()
        .context("An input file is required")?;

    let options = AggregatorOptions::from(&config);

    // Handle --dry-run: load and validate, then exit
    if args.dry_run {
        return handle_dry_run(&input, options);
    }

    // Step 1: Load the table
    if !args.quiet {
        println!("📥 Loading transactions: {}", input.display());
    }
    let table = loader::load_csv(&input, !args.quiet)?;

    // Step 2: Aggregate
    if !args.quiet {
        println!("🔬 Computing {} metrics...", config.analysis.profile);
    }
    let mut aggregator = Aggregator::new(&table, options);
    let analysis = aggregator.analyse()?;

    // Step 3: Chart series reuse the aggregator cache
    let requests = if args.wants_charts() {
        charts::requests_from_args(&args).map_err(anyhow::Error::msg)?
    } else {
        Vec::new()
    };
    let settings = ChartSettings::from(&config.analysis);
    let mut chart_data = Vec::with_capacity(requests.len());
    for request in &requests {
        let chart = charts::build_chart(&mut aggregator, request, &settings)?;
        debug!("Built chart '{}' with {} points", chart.title, chart.series.len());
        chart_data.push(chart);
    }

    // Step 4: Build the report
    let duration = start_time.elapsed().as_secs_f64();
    let metadata = ReportMetadata {
        input_file: input.display().to_string(),
        analysis_date: Utc::now(),
        profile: config.analysis.profile.to_string(),
        rows: table.len(),
        columns: table.headers().len(),
        duration_seconds: duration,
    };

    let report = Report {
        metadata,
        analysis,
        charts: chart_data,
    };

    // Step 5: Generate and save the report
    let output = match config.general.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => {
            report::generate_markdown_report(&report, config.report.include_charts)
        }
        OutputFormat::Csv => report::generate_csv_report(&report.analysis.summary)?,
    };

    let output_path = config.output_path();
    report::write_output(&output_path, &output)?;
    info!("Report written to {}", output_path.display());

    let chart_path = if report.charts.is_empty() {
        None
    } else {
        let path = args
            .chart_output
            .clone()
            .unwrap_or_else(|| default_chart_path(&output_path));
        report::write_output(&path, &report::generate_charts_json(&report.charts)?)?;
        info!("Chart series written to {}", path.display());
        Some(path)
    };

    // Print summary
    if !args.quiet {
        println!("\n📊 Sales Analysis Results:");
        for metric in report.analysis.summary.iter() {
            println!("   {}", metric);
        }
        println!("   Duration: {:.2}s", duration);
        println!(
            "\n✅ Analysis complete! Report saved to: {}",
            output_path.display()
        );
        if let Some(path) = chart_path {
            println!("   Chart series saved to: {}", path.display());
        }
    }

    Ok(())
}

/// Chart series land next to the report unless a path was given.
fn default_chart_path(report_path: &Path) -> PathBuf {
    report_path.with_extension("charts.json")
}

/// Handle --dry-run: load the file, validate it, print what would be analysed.
fn handle_dry_run(input: &Path, options: AggregatorOptions) -> Result<()> {
    println!("\n🔍 Dry run: checking {} (no report written)...\n", input.display());

    let table = loader::load_csv(input, false)?;

    println!("   Rows: {}", table.len());
    println!("   Columns ({}):", table.headers().len());
    for header in table.headers() {
        println!("     📄 {}", header);
    }

    let required = options.required_columns().len();
    let date_source = options.date_source.describe();
    let dated_rows = Aggregator::new(&table, options).validate()?;

    println!(
        "\n   Date source: {} ({} of {} rows dated)",
        date_source,
        dated_rows,
        table.len()
    );
    println!(
        "\n✅ Dry run complete. All {} required columns present.",
        required
    );
    Ok(())
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is set up, so it returns where the configuration
/// came from instead of logging it.
fn load_config(args: &Args) -> Result<(Config, String)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, config_path.display().to_string()));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, CONFIG_FILE_NAME.to_string())),
        Ok(None) => Ok((Config::default(), "defaults".to_string())),
        Err(e) => {
            eprintln!("⚠️  Failed to load {}: {:#}", CONFIG_FILE_NAME, e);
            Ok((Config::default(), "defaults".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_chart_path() {
        let path = default_chart_path(Path::new("out/sales_analysis_results.md"));
        assert_eq!(path, PathBuf::from("out/sales_analysis_results.charts.json"));
    }

    #[test]
    fn test_describe_error_uses_kind() {
        let err = anyhow::Error::new(AnalysisError::EmptyInput).context("Failed to analyse");
        let message = describe_error(&err);
        assert!(message.starts_with("EmptyInputError: "));
    }

    #[test]
    fn test_describe_error_without_kind() {
        let err = anyhow::anyhow!("plain failure");
        assert_eq!(describe_error(&err), "plain failure");
    }
}
