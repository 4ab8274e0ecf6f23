//! Report generation.
//!
//! This module renders an analysis as Markdown, JSON or a two-column CSV.
//! All three are serializations of the same ordered metric list.

use crate::analysis::format_count;
use crate::charts::{ChartData, Series};
use crate::models::{Breakdown, ChartAggregates, Report, ReportMetadata, Summary};
use anyhow::{Context, Result};
use std::path::Path;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report, include_charts: bool) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# Sales Analysis Report\n\n");

    // Metadata section
    output.push_str(&generate_metadata_section(&report.metadata));

    // Table of contents
    output.push_str(&generate_table_of_contents(report, include_charts));

    // Metric summary
    output.push_str(&generate_summary_section(&report.analysis.summary));

    // Breakdowns behind the default charts
    if include_charts {
        output.push_str(&generate_aggregates_section(&report.analysis.charts));
        output.push_str(&generate_charts_section(&report.charts));
    }

    // Footer
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Input File:** `{}`\n", metadata.input_file));
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Profile:** {}\n", metadata.profile));
    section.push_str(&format!("- **Rows:** {}\n", metadata.rows));
    section.push_str(&format!("- **Columns:** {}\n", metadata.columns));
    section.push_str(&format!(
        "- **Analysis Duration:** {:.2}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the table of contents.
fn generate_table_of_contents(report: &Report, include_charts: bool) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");
    toc.push_str("- [Sales Analysis Results](#sales-analysis-results)\n");

    if include_charts {
        toc.push_str("- [Breakdowns](#breakdowns)\n");
        if !report.charts.is_empty() {
            toc.push_str("- [Charts](#charts)\n");
            for chart in &report.charts {
                toc.push_str(&format!("  - [{}](#{})\n", chart.title, anchor(&chart.title)));
            }
        }
    }

    toc.push('\n');

    toc
}

fn anchor(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '-')
        .collect::<String>()
        .replace(' ', "-")
}

/// Generate the metric table.
fn generate_summary_section(summary: &Summary) -> String {
    let mut section = String::new();

    section.push_str("## Sales Analysis Results\n\n");
    section.push_str("| Metric | Value |\n");
    section.push_str("|:---|:---|\n");

    for metric in summary.iter() {
        section.push_str(&format!(
            "| **{}** | {} |\n",
            escape_cell(&metric.name),
            escape_cell(&metric.value)
        ));
    }
    section.push('\n');

    section
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

/// Generate breakdown tables from the shared aggregates.
fn generate_aggregates_section(aggregates: &ChartAggregates) -> String {
    let mut section = String::new();

    section.push_str("## Breakdowns\n\n");

    section.push_str(&breakdown_table(
        "Sales by Product Category",
        "Category",
        &aggregates.sales_by_category.sorted_desc(),
        true,
    ));
    section.push_str(&breakdown_table(
        "Sales by Region",
        "Region",
        &aggregates.sales_by_region.sorted_desc(),
        true,
    ));
    section.push_str(&breakdown_table(
        "Purchases by Payment Method",
        "Payment Method",
        &aggregates.payment_methods,
        false,
    ));
    section.push_str(&breakdown_table(
        "Purchases by Gender",
        "Gender",
        &aggregates.genders,
        false,
    ));

    if !aggregates.daily_sales.is_empty() {
        section.push_str("### Daily Sales\n\n");
        section.push_str("| Date | Sales |\n");
        section.push_str("|:---|---:|\n");
        for day in &aggregates.daily_sales {
            section.push_str(&format!(
                "| {} | {:.2} |\n",
                day.date.format("%Y-%m-%d"),
                day.total
            ));
        }
        section.push('\n');
    }

    section
}

fn breakdown_table(title: &str, label: &str, breakdown: &Breakdown, money: bool) -> String {
    if breakdown.is_empty() {
        return String::new();
    }

    let mut table = String::new();
    let value_header = if money { "Sales" } else { "Count" };

    table.push_str(&format!("### {}\n\n", title));
    table.push_str(&format!("| {} | {} |\n", label, value_header));
    table.push_str("|:---|---:|\n");

    for entry in &breakdown.entries {
        let value = if money {
            format!("{:.2}", entry.value)
        } else {
            format_count(entry.value)
        };
        table.push_str(&format!("| {} | {} |\n", escape_cell(&entry.label), value));
    }
    table.push('\n');

    table
}

/// Generate the requested chart series.
fn generate_charts_section(charts: &[ChartData]) -> String {
    if charts.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Charts\n\n");

    for chart in charts {
        section.push_str(&format!("### {}\n\n", chart.title));
        section.push_str(&format!(
            "*Kind: {} | X: {} | Y: {} | Points: {}*\n\n",
            chart.kind,
            chart.x_label,
            chart.y_label,
            chart.series.len()
        ));

        match chart.series {
            Series::Categories(ref points) => {
                section.push_str(&format!("| {} | {} |\n", chart.x_label, chart.y_label));
                section.push_str("|:---|---:|\n");
                for point in points {
                    section.push_str(&format!(
                        "| {} | {} |\n",
                        escape_cell(&point.label),
                        format_count(point.value)
                    ));
                }
            }
            Series::Bins(ref bins) => {
                section.push_str("| Range | Count |\n");
                section.push_str("|:---|---:|\n");
                for bin in bins {
                    section.push_str(&format!(
                        "| {:.2} - {:.2} | {} |\n",
                        bin.lower, bin.upper, bin.count
                    ));
                }
            }
            Series::Hierarchy(ref nodes) => {
                for node in nodes {
                    section.push_str(&format!(
                        "- **{}**: {}\n",
                        node.label,
                        format_count(node.value)
                    ));
                    for child in &node.children {
                        section.push_str(&format!(
                            "  - {}: {}\n",
                            child.label,
                            format_count(child.value)
                        ));
                    }
                }
            }
            Series::Points(ref points) => {
                section.push_str(&format!(
                    "{} points; see the JSON chart export for coordinates.\n",
                    points.len()
                ));
            }
        }
        section.push('\n');
    }

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str("*Report generated by SalesAnalyser*\n");

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Generate a `Metric,Value` CSV of the summary.
pub fn generate_csv_report(summary: &Summary) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());

    wtr.write_record(["Metric", "Value"])?;
    for metric in summary.iter() {
        wtr.write_record([metric.name.as_str(), metric.value.as_str()])?;
    }

    let bytes = wtr.into_inner().context("Failed to flush CSV output")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

/// Serialize chart series as JSON.
pub fn generate_charts_json(charts: &[ChartData]) -> Result<String> {
    serde_json::to_string_pretty(charts).map_err(Into::into)
}

/// Write text content to a file.
pub fn write_output(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write {}", path.display()))
}
