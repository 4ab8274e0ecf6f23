//! Chart series preparation.
//!
//! A [`ChartRequest`] names either one of the predefined charts or a custom
//! chart over arbitrary columns. Requests resolve into plain [`ChartData`]
//! that a renderer can draw; drawing itself happens elsewhere. Grouped sums
//! and counts come from the aggregator's cache.

use crate::analysis::{stats, Aggregator};
use crate::cli::ChartName;
use crate::error::{AnalysisError, Result};
use crate::models::{Breakdown, BreakdownEntry};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Kind of chart a series is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Bar,
    Pie,
    Scatter,
    Histogram,
    Sunburst,
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChartKind::Line => write!(f, "line"),
            ChartKind::Bar => write!(f, "bar"),
            ChartKind::Pie => write!(f, "pie"),
            ChartKind::Scatter => write!(f, "scatter"),
            ChartKind::Histogram => write!(f, "histogram"),
            ChartKind::Sunburst => write!(f, "sunburst"),
        }
    }
}

impl FromStr for ChartKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "line" => Ok(ChartKind::Line),
            "bar" => Ok(ChartKind::Bar),
            "pie" => Ok(ChartKind::Pie),
            "scatter" => Ok(ChartKind::Scatter),
            "histogram" | "hist" => Ok(ChartKind::Histogram),
            "sunburst" => Ok(ChartKind::Sunburst),
            other => Err(format!("Unknown chart kind: {}", other)),
        }
    }
}

/// Charts with fixed columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredefinedChart {
    /// Sales per day (line).
    DailySales,
    /// Top categories by sales plus "Other" (pie).
    SalesByCategory,
    /// Purchases per payment method (bar).
    PaymentMethods,
    /// Sales per region (bar).
    SalesByRegion,
    /// Purchases per gender (pie).
    GenderSplit,
    /// Distribution of purchase amounts (histogram).
    PurchaseAmounts,
    /// Sales per category, then region (sunburst).
    CategoryRegion,
}

impl From<ChartName> for PredefinedChart {
    fn from(name: ChartName) -> Self {
        match name {
            ChartName::DailySales => PredefinedChart::DailySales,
            ChartName::SalesByCategory => PredefinedChart::SalesByCategory,
            ChartName::PaymentMethods => PredefinedChart::PaymentMethods,
            ChartName::SalesByRegion => PredefinedChart::SalesByRegion,
            ChartName::GenderSplit => PredefinedChart::GenderSplit,
            ChartName::PurchaseAmounts => PredefinedChart::PurchaseAmounts,
            ChartName::CategoryRegion => PredefinedChart::CategoryRegion,
        }
    }
}

/// A chart over user-chosen columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomChart {
    pub kind: ChartKind,
    /// Grouping column, or the numeric x axis for scatter/histogram.
    pub x: String,
    /// Numeric value column. Without it, rows are counted.
    pub y: Option<String>,
    /// Secondary grouping column (inner ring, stacked series, point groups).
    pub color: Option<String>,
}

impl CustomChart {
    /// Parse `KIND:X[:Y[:COLOR]]`. An empty `Y` means "count rows".
    pub fn parse(spec: &str) -> std::result::Result<Self, String> {
        let parts: Vec<&str> = spec.split(':').map(str::trim).collect();
        if parts.len() < 2 || parts.len() > 4 {
            return Err(format!(
                "Invalid custom chart '{}': expected KIND:X[:Y[:COLOR]]",
                spec
            ));
        }

        let kind: ChartKind = parts[0].parse()?;
        let x = parts[1];
        if x.is_empty() {
            return Err(format!("Invalid custom chart '{}': X column is empty", spec));
        }
        let non_empty = |s: Option<&&str>| s.filter(|v| !v.is_empty()).map(|v| v.to_string());
        let y = non_empty(parts.get(2));
        let color = non_empty(parts.get(3));

        if kind == ChartKind::Scatter && y.is_none() {
            return Err(format!("Scatter chart '{}' needs a Y column", spec));
        }
        if kind == ChartKind::Sunburst && color.is_none() {
            return Err(format!(
                "Sunburst chart '{}' needs a COLOR column for the inner ring",
                spec
            ));
        }

        Ok(Self {
            kind,
            x: x.to_string(),
            y,
            color,
        })
    }
}

/// What to chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChartRequest {
    Predefined(PredefinedChart),
    Custom(CustomChart),
}

/// Tunables for chart preparation.
#[derive(Debug, Clone, Copy)]
pub struct ChartSettings {
    pub top_categories: usize,
    pub histogram_bins: usize,
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self {
            top_categories: 5,
            histogram_bins: 10,
        }
    }
}

impl From<&crate::config::AnalysisConfig> for ChartSettings {
    fn from(config: &crate::config::AnalysisConfig) -> Self {
        Self {
            top_categories: config.top_categories,
            histogram_bins: config.histogram_bins,
        }
    }
}

/// One scatter point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterPoint {
    pub x: f64,
    pub y: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

/// One histogram bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// An outer group and its inner breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub label: String,
    pub value: f64,
    pub children: Vec<BreakdownEntry>,
}

/// Data points of a chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Series {
    Categories(Vec<BreakdownEntry>),
    Points(Vec<ScatterPoint>),
    Bins(Vec<Bin>),
    Hierarchy(Vec<Node>),
}

impl Series {
    /// Number of top-level points.
    pub fn len(&self) -> usize {
        match self {
            Series::Categories(v) => v.len(),
            Series::Points(v) => v.len(),
            Series::Bins(v) => v.len(),
            Series::Hierarchy(v) => v.len(),
        }
    }
}

/// A chart ready for a renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub title: String,
    pub kind: ChartKind,
    pub x_label: String,
    pub y_label: String,
    pub series: Series,
}

/// Resolve a chart request against the aggregator.
pub fn build_chart(
    agg: &mut Aggregator<'_>,
    request: &ChartRequest,
    settings: &ChartSettings,
) -> Result<ChartData> {
    let chart = match request {
        ChartRequest::Predefined(chart) => build_predefined(agg, *chart, settings)?,
        ChartRequest::Custom(chart) => build_custom(agg, chart, settings)?,
    };
    debug!(
        "Prepared {} chart '{}' with {} points",
        chart.kind,
        chart.title,
        chart.series.len()
    );
    Ok(chart)
}

fn build_predefined(
    agg: &mut Aggregator<'_>,
    chart: PredefinedChart,
    settings: &ChartSettings,
) -> Result<ChartData> {
    let c = agg.options().columns.clone();

    let data = match chart {
        PredefinedChart::DailySales => {
            let daily = agg.daily_totals()?;
            ChartData {
                title: "Sales Over Time".to_string(),
                kind: ChartKind::Line,
                x_label: "Date".to_string(),
                y_label: "Sales".to_string(),
                series: Series::Categories(
                    daily
                        .iter()
                        .map(|d| BreakdownEntry {
                            label: d.date.format("%Y-%m-%d").to_string(),
                            value: d.total,
                        })
                        .collect(),
                ),
            }
        }
        PredefinedChart::SalesByCategory => {
            let sums = agg.sum_by(&c.product_category, &c.purchase_amount)?;
            ChartData {
                title: format!("Top {} Product Categories by Sales", settings.top_categories),
                kind: ChartKind::Pie,
                x_label: "Product Category".to_string(),
                y_label: "Sales".to_string(),
                series: Series::Categories(sums.top_n_with_other(settings.top_categories).entries),
            }
        }
        PredefinedChart::PaymentMethods => ChartData {
            title: "Purchases by Payment Method".to_string(),
            kind: ChartKind::Bar,
            x_label: "Payment Method".to_string(),
            y_label: "Number of Purchases".to_string(),
            series: Series::Categories(agg.count_by(&c.payment_method)?.entries),
        },
        PredefinedChart::SalesByRegion => ChartData {
            title: "Sales by Region".to_string(),
            kind: ChartKind::Bar,
            x_label: "Region".to_string(),
            y_label: "Sales".to_string(),
            series: Series::Categories(
                agg.sum_by(&c.region, &c.purchase_amount)?
                    .sorted_desc()
                    .entries,
            ),
        },
        PredefinedChart::GenderSplit => ChartData {
            title: "Purchases by Gender".to_string(),
            kind: ChartKind::Pie,
            x_label: "Gender".to_string(),
            y_label: "Number of Purchases".to_string(),
            series: Series::Categories(agg.count_by(&c.customer_gender)?.entries),
        },
        PredefinedChart::PurchaseAmounts => {
            let amounts = agg.table().required_numeric(&c.purchase_amount)?;
            ChartData {
                title: "Distribution of Purchase Amounts".to_string(),
                kind: ChartKind::Histogram,
                x_label: "Purchase Amount".to_string(),
                y_label: "Number of Purchases".to_string(),
                series: bins(&amounts, settings.histogram_bins),
            }
        }
        PredefinedChart::CategoryRegion => ChartData {
            title: "Sales by Category and Region".to_string(),
            kind: ChartKind::Sunburst,
            x_label: "Product Category".to_string(),
            y_label: "Sales".to_string(),
            series: hierarchy(agg, &c.product_category, &c.region, Some(&c.purchase_amount))?,
        },
    };

    Ok(data)
}

fn build_custom(
    agg: &mut Aggregator<'_>,
    chart: &CustomChart,
    settings: &ChartSettings,
) -> Result<ChartData> {
    let y_label = chart.y.clone().unwrap_or_else(|| "Count".to_string());
    let title = match chart.y {
        Some(ref y) => format!("{} by {}", y, chart.x),
        None => format!("Rows by {}", chart.x),
    };

    let series = match chart.kind {
        ChartKind::Scatter => {
            let y = chart
                .y
                .as_deref()
                .ok_or_else(|| AnalysisError::insufficient("scatter chart", "no Y column"))?;
            scatter(agg, &chart.x, y, chart.color.as_deref())?
        }
        ChartKind::Histogram => {
            let values: Vec<f64> = agg.table().numeric(&chart.x)?.into_iter().flatten().collect();
            if values.is_empty() {
                return Err(AnalysisError::insufficient(
                    "histogram",
                    &format!("column '{}' has no numeric values", chart.x),
                ));
            }
            bins(&values, settings.histogram_bins)
        }
        ChartKind::Sunburst => {
            let inner = chart
                .color
                .as_deref()
                .ok_or_else(|| AnalysisError::insufficient("sunburst chart", "no COLOR column"))?;
            hierarchy(agg, &chart.x, inner, chart.y.as_deref())?
        }
        ChartKind::Line | ChartKind::Bar | ChartKind::Pie => match chart.color {
            Some(ref color) => hierarchy(agg, &chart.x, color, chart.y.as_deref())?,
            None => {
                let breakdown = match chart.y {
                    Some(ref y) => agg.sum_by(&chart.x, y)?,
                    None => agg.count_by(&chart.x)?,
                };
                Series::Categories(breakdown.entries)
            }
        },
    };

    let y_label = if chart.kind == ChartKind::Histogram {
        "Count".to_string()
    } else {
        y_label
    };

    Ok(ChartData {
        title,
        kind: chart.kind,
        x_label: chart.x.clone(),
        y_label,
        series,
    })
}

fn bins(values: &[f64], bins: usize) -> Series {
    Series::Bins(
        stats::histogram(values, bins)
            .into_iter()
            .map(|(lower, upper, count)| Bin {
                lower,
                upper,
                count,
            })
            .collect(),
    )
}

fn scatter(agg: &Aggregator<'_>, x: &str, y: &str, group: Option<&str>) -> Result<Series> {
    let table = agg.table();
    let xs = table.numeric(x)?;
    let ys = table.numeric(y)?;
    let groups = match group {
        Some(col) => Some(table.text(col)?),
        None => None,
    };

    let points = xs
        .iter()
        .zip(ys.iter())
        .enumerate()
        .filter_map(|(row, (x, y))| match (x, y) {
            (Some(x), Some(y)) => Some(ScatterPoint {
                x: *x,
                y: *y,
                group: groups.as_ref().map(|g| g[row].to_string()),
            }),
            _ => None,
        })
        .collect();

    Ok(Series::Points(points))
}

/// Two-level grouping: `outer` then `inner`, summing `value` or counting rows.
fn hierarchy(
    agg: &mut Aggregator<'_>,
    outer: &str,
    inner: &str,
    value: Option<&str>,
) -> Result<Series> {
    let table = agg.table();
    let outer_keys = table.text(outer)?;
    let inner_keys = table.text(inner)?;
    let values: Vec<Option<f64>> = match value {
        Some(col) => table.numeric(col)?,
        None => vec![Some(1.0); table.len()],
    };

    // Outer totals come from the shared cache
    let totals = match value {
        Some(col) => agg.sum_by(outer, col)?,
        None => agg.count_by(outer)?,
    };

    let mut children: HashMap<&str, (Vec<&str>, Vec<Option<f64>>)> = HashMap::new();
    for ((o, i), v) in outer_keys.iter().zip(inner_keys.iter()).zip(values.iter()) {
        let entry = children.entry(*o).or_default();
        entry.0.push(*i);
        entry.1.push(*v);
    }

    let nodes = totals
        .sorted_desc()
        .entries
        .into_iter()
        .map(|total| {
            let inner = children
                .get(total.label.as_str())
                .map(|(keys, vals)| stats::group_sum(keys, vals))
                .unwrap_or_else(Breakdown::default);
            Node {
                label: total.label,
                value: total.value,
                children: inner.sorted_desc().entries,
            }
        })
        .collect();

    Ok(Series::Hierarchy(nodes))
}

/// Requests named on the command line, predefined first.
pub fn requests_from_args(args: &crate::cli::Args) -> std::result::Result<Vec<ChartRequest>, String> {
    let mut requests: Vec<ChartRequest> = args
        .chart
        .iter()
        .map(|name| ChartRequest::Predefined((*name).into()))
        .collect();

    for spec in &args.custom_chart {
        requests.push(ChartRequest::Custom(CustomChart::parse(spec)?));
    }

    Ok(requests)
}
