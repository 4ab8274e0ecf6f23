//! Data models for the sales analyser.
//!
//! This module contains the core data structures shared by the aggregator,
//! the chart builder and the report generator.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single named, formatted result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// Display name, e.g. "Total Sales".
    pub name: String,
    /// Formatted value, e.g. "$60.00".
    pub value: String,
}

impl Metric {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.value)
    }
}

/// Ordered list of metrics produced by one aggregation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub metrics: Vec<Metric>,
}

impl Summary {
    pub(crate) fn push(&mut self, name: &str, value: impl Into<String>) {
        self.metrics.push(Metric::new(name, value));
    }

    /// Look up a metric value by name.
    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.metrics
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.value.as_str())
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Metric> {
        self.metrics.iter()
    }
}

/// One group of a breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownEntry {
    pub label: String,
    pub value: f64,
}

/// Counts or sums of rows grouped by one categorical column.
///
/// Entries keep the order they were built in; callers choose between
/// first-encountered order and [`Breakdown::sorted_desc`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Breakdown {
    pub entries: Vec<BreakdownEntry>,
}

impl Breakdown {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all entry values.
    pub fn total(&self) -> f64 {
        self.entries.iter().map(|e| e.value).sum()
    }

    /// Value for a label, 0 when the label never occurs.
    #[cfg(test)]
    pub fn value_of(&self, label: &str) -> f64 {
        self.entries
            .iter()
            .find(|e| e.label == label)
            .map(|e| e.value)
            .unwrap_or(0.0)
    }

    /// First entry holding the maximum value.
    pub fn max_entry(&self) -> Option<&BreakdownEntry> {
        let mut best: Option<&BreakdownEntry> = None;
        for entry in &self.entries {
            match best {
                Some(b) if entry.value <= b.value => {}
                _ => best = Some(entry),
            }
        }
        best
    }

    /// Copy ordered by descending value; equal values keep their order.
    pub fn sorted_desc(&self) -> Breakdown {
        let mut entries = self.entries.clone();
        entries.sort_by(|a, b| {
            b.value
                .partial_cmp(&a.value)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Breakdown { entries }
    }

    /// Keep the `n` largest entries and fold the rest into an "Other" entry
    /// when the remainder is positive.
    pub fn top_n_with_other(&self, n: usize) -> Breakdown {
        let sorted = self.sorted_desc();
        let mut entries: Vec<BreakdownEntry> = sorted.entries.iter().take(n).cloned().collect();
        let kept: f64 = entries.iter().map(|e| e.value).sum();
        let other = sorted.total() - kept;
        if other > 0.0 {
            entries.push(BreakdownEntry {
                label: "Other".to_string(),
                value: other,
            });
        }
        Breakdown { entries }
    }
}

/// Summed purchase amount for one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub total: f64,
}

/// The row holding the largest purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopSpender {
    /// Data row index (0-based).
    pub row: usize,
    pub customer_id: String,
    pub amount: f64,
    pub date: Option<NaiveDate>,
}

/// Customer with the most rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequentCustomer {
    pub customer_id: String,
    pub purchases: usize,
}

/// A purchase above the outlier threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outlier {
    pub row: usize,
    pub customer_id: String,
    pub amount: f64,
}

/// Raw values behind the basic metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Figures {
    pub total_sales: f64,
    pub average_spend: f64,
    pub unique_customers: usize,
    pub sales_per_customer: f64,
    pub top_spender: TopSpender,
    pub total_items: f64,
    pub popular_category: String,
    pub payment_breakdown: Breakdown,
    pub top_region: String,
    pub discount_usage_pct: f64,
    pub average_age: f64,
    pub gender_breakdown: Breakdown,
    pub loyalty_pct: f64,
    pub average_shipping: f64,
    pub return_rate_pct: f64,
    pub busiest_day: DailyTotal,
    pub frequent_customer: FrequentCustomer,
    pub average_items: f64,
    pub top_payment_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extended: Option<ExtendedFigures>,
}

/// Raw values behind the extended metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedFigures {
    pub order_count: usize,
    pub total_tax: f64,
    pub unique_products: usize,
    pub average_unit_price: f64,
    pub average_rating: f64,
    pub channel_breakdown: Breakdown,
    pub delivery_breakdown: Breakdown,
    pub source_breakdown: Breakdown,
    pub busiest_time: String,
    pub mean_daily_total: f64,
    pub spikes: Vec<DailyTotal>,
    pub outlier_threshold: f64,
    pub outliers: Vec<Outlier>,
}

/// Grouped aggregates reused by the chart builder and the report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartAggregates {
    pub daily_sales: Vec<DailyTotal>,
    pub sales_by_category: Breakdown,
    pub sales_by_region: Breakdown,
    pub payment_methods: Breakdown,
    pub genders: Breakdown,
}

/// Everything one aggregation call produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub summary: Summary,
    pub figures: Figures,
    pub charts: ChartAggregates,
}

/// Metadata about the analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Path of the analysed file.
    pub input_file: String,
    /// Date and time of the analysis.
    pub analysis_date: DateTime<Utc>,
    /// Metric profile used.
    pub profile: String,
    /// Number of data rows.
    pub rows: usize,
    /// Number of columns.
    pub columns: usize,
    /// Duration of the analysis in seconds.
    pub duration_seconds: f64,
}

/// The complete analysis report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub analysis: Analysis,
    /// Chart series requested on the command line.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub charts: Vec<crate::charts::ChartData>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breakdown(pairs: &[(&str, f64)]) -> Breakdown {
        Breakdown {
            entries: pairs
                .iter()
                .map(|(l, v)| BreakdownEntry {
                    label: l.to_string(),
                    value: *v,
                })
                .collect(),
        }
    }

    #[test]
    fn test_summary_lookup() {
        let mut summary = Summary::default();
        summary.push("Total Sales", "$60.00");
        summary.push("Busiest Day", "2024-01-01 ($60.00)");

        assert_eq!(summary.len(), 2);
        assert_eq!(summary.get("Total Sales"), Some("$60.00"));
        assert_eq!(summary.get("Missing"), None);
        assert_eq!(summary.metrics[1].to_string(), "Busiest Day: 2024-01-01 ($60.00)");
    }

    #[test]
    fn test_max_entry_first_wins() {
        let b = breakdown(&[("North", 10.0), ("South", 30.0), ("East", 30.0)]);
        assert_eq!(b.max_entry().map(|e| e.label.as_str()), Some("South"));
        assert!(Breakdown::default().max_entry().is_none());
    }

    #[test]
    fn test_sorted_desc_is_stable() {
        let b = breakdown(&[("Cash", 1.0), ("Card", 2.0), ("Wallet", 1.0)]);
        let sorted = b.sorted_desc();
        let labels: Vec<_> = sorted.entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["Card", "Cash", "Wallet"]);
    }

    #[test]
    fn test_value_of_absent_label_is_zero() {
        let b = breakdown(&[("No", 3.0)]);
        assert_eq!(b.value_of("Yes"), 0.0);
        assert_eq!(b.value_of("No"), 3.0);
    }

    #[test]
    fn test_top_n_with_other() {
        let b = breakdown(&[("A", 5.0), ("B", 1.0), ("C", 3.0), ("D", 2.0)]);
        let top = b.top_n_with_other(2);
        let labels: Vec<_> = top.entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["A", "C", "Other"]);
        assert_eq!(top.value_of("Other"), 3.0);
        assert_eq!(top.total(), b.total());

        // No remainder, no "Other" slice
        let all = b.top_n_with_other(10);
        assert_eq!(all.len(), 4);
    }
}
