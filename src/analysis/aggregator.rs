//! Sales aggregation and summary statistics.
//!
//! The [`Aggregator`] reduces a [`Table`] into an ordered list of metrics.
//! Grouped aggregates are memoized per dimension so the chart builder can
//! reuse them without recomputing.

use crate::analysis::stats;
use crate::cli::Profile;
use crate::config::{ColumnsConfig, Config};
use crate::error::{AnalysisError, Result};
use crate::loader::{DateSource, Table};
use crate::models::{
    Analysis, Breakdown, ChartAggregates, DailyTotal, ExtendedFigures, Figures, FrequentCustomer,
    Outlier, Summary, TopSpender,
};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Settings the aggregator needs from the configuration.
#[derive(Debug, Clone)]
pub struct AggregatorOptions {
    pub columns: ColumnsConfig,
    pub date_source: DateSource,
    pub date_format: String,
    pub profile: Profile,
    pub spike_multiplier: f64,
    pub outlier_percentile: f64,
    pub currency_symbol: String,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for AggregatorOptions {
    fn from(config: &Config) -> Self {
        Self {
            columns: config.columns.clone(),
            date_source: config.date_source(),
            date_format: config.date.format.clone(),
            profile: config.analysis.profile,
            spike_multiplier: config.analysis.spike_multiplier,
            outlier_percentile: config.analysis.outlier_percentile,
            currency_symbol: config.report.currency_symbol.clone(),
        }
    }
}

impl AggregatorOptions {
    /// Every column the selected profile reads.
    pub fn required_columns(&self) -> Vec<&str> {
        let c = &self.columns;
        let mut columns = vec![
            c.customer_id.as_str(),
            c.purchase_amount.as_str(),
            c.quantity.as_str(),
            c.product_category.as_str(),
            c.payment_method.as_str(),
            c.region.as_str(),
            c.discount_applied.as_str(),
            c.customer_age.as_str(),
            c.customer_gender.as_str(),
            c.customer_loyalty.as_str(),
            c.shipping_cost.as_str(),
            c.return_status.as_str(),
        ];

        if self.profile == Profile::Extended {
            columns.extend([
                c.order_id.as_str(),
                c.product_id.as_str(),
                c.tax_amount.as_str(),
                c.unit_price.as_str(),
                c.customer_rating.as_str(),
                c.order_channel.as_str(),
                c.delivery_method.as_str(),
                c.purchase_source.as_str(),
                c.transaction_time.as_str(),
            ]);
        }

        columns.extend(self.date_source.columns());
        columns
    }
}

/// Key of a memoized grouped aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum GroupKey {
    /// Sum of a numeric column grouped by a categorical column.
    Sum { by: String, of: String },
    /// Row count per value of a column, descending.
    Count { by: String },
}

/// Grouped aggregates computed at most once per aggregator.
#[derive(Debug, Default)]
struct AggregateCache {
    groups: HashMap<GroupKey, Breakdown>,
    dates: Option<Vec<Option<NaiveDate>>>,
    daily: Option<Vec<DailyTotal>>,
}

/// Computes summary metrics over a transaction table.
pub struct Aggregator<'a> {
    table: &'a Table,
    options: AggregatorOptions,
    cache: AggregateCache,
}

impl<'a> Aggregator<'a> {
    /// Create an aggregator over a table.
    pub fn new(table: &'a Table, options: AggregatorOptions) -> Self {
        Self {
            table,
            options,
            cache: AggregateCache::default(),
        }
    }

    /// The table being aggregated.
    pub fn table(&self) -> &'a Table {
        self.table
    }

    pub fn options(&self) -> &AggregatorOptions {
        &self.options
    }

    /// Sum of `of` grouped by `by`, in first-encountered group order.
    pub fn sum_by(&mut self, by: &str, of: &str) -> Result<Breakdown> {
        let key = GroupKey::Sum {
            by: by.to_string(),
            of: of.to_string(),
        };
        if let Some(hit) = self.cache.groups.get(&key) {
            return Ok(hit.clone());
        }

        let keys = self.table.text(by)?;
        let values = self.table.numeric(of)?;
        let breakdown = stats::group_sum(&keys, &values);
        debug!("Grouped {} by {}: {} groups", of, by, breakdown.len());

        self.cache.groups.insert(key, breakdown.clone());
        Ok(breakdown)
    }

    /// Row count per value of `by`, descending.
    pub fn count_by(&mut self, by: &str) -> Result<Breakdown> {
        let key = GroupKey::Count { by: by.to_string() };
        if let Some(hit) = self.cache.groups.get(&key) {
            return Ok(hit.clone());
        }

        let values = self.table.text(by)?;
        let breakdown = stats::value_counts(&values);
        debug!("Counted {}: {} distinct values", by, breakdown.len());

        self.cache.groups.insert(key, breakdown.clone());
        Ok(breakdown)
    }

    /// Parsed purchase date per row.
    pub fn dates(&mut self) -> Result<Vec<Option<NaiveDate>>> {
        if let Some(ref dates) = self.cache.dates {
            return Ok(dates.clone());
        }
        let dates = self
            .table
            .dates(&self.options.date_source, &self.options.date_format)?;
        self.cache.dates = Some(dates.clone());
        Ok(dates)
    }

    /// Purchase amount summed per day, in chronological order.
    pub fn daily_totals(&mut self) -> Result<Vec<DailyTotal>> {
        if let Some(ref daily) = self.cache.daily {
            return Ok(daily.clone());
        }

        let dates = self.dates()?;
        let amounts = self.table.numeric(&self.options.columns.purchase_amount)?;

        let mut per_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for (date, amount) in dates.iter().zip(amounts.iter()) {
            if let Some(date) = date {
                *per_day.entry(*date).or_insert(0.0) += amount.unwrap_or(0.0);
            }
        }

        let daily: Vec<DailyTotal> = per_day
            .into_iter()
            .map(|(date, total)| DailyTotal { date, total })
            .collect();
        debug!("Computed totals for {} days", daily.len());

        self.cache.daily = Some(daily.clone());
        Ok(daily)
    }

    /// Check the table can be aggregated: it has rows, every column the
    /// profile reads, and at least one valid purchase date.
    ///
    /// Returns the number of rows with a valid date.
    pub fn validate(&mut self) -> Result<usize> {
        if self.table.is_empty() {
            return Err(AnalysisError::EmptyInput);
        }
        self.table.require(self.options.required_columns())?;
        Ok(self.dates()?.iter().flatten().count())
    }

    /// Run the full aggregation.
    ///
    /// Validation happens before any metric is produced; an error means no
    /// summary at all.
    pub fn analyse(&mut self) -> Result<Analysis> {
        self.validate()?;

        let figures = self.compute_figures()?;
        let summary = summarize(&figures, &self.options.currency_symbol);
        let charts = self.chart_aggregates()?;

        info!("Computed {} metrics over {} rows", summary.len(), self.table.len());

        Ok(Analysis {
            summary,
            figures,
            charts,
        })
    }

    fn compute_figures(&mut self) -> Result<Figures> {
        let c = self.options.columns.clone();
        let table = self.table;

        let customers = table.required_text(&c.customer_id)?;
        let amounts = table.required_numeric(&c.purchase_amount)?;
        let quantities = table.numeric(&c.quantity)?;

        let total_sales: f64 = amounts.iter().sum();
        let average_spend = stats::mean(&amounts)
            .ok_or_else(|| AnalysisError::insufficient("Average Spend per Purchase", "no rows"))?;

        let unique_customers = stats::count_distinct(&customers);
        if unique_customers == 0 {
            return Err(AnalysisError::insufficient(
                "Average Sales per Customer",
                "no customers",
            ));
        }
        let sales_per_customer = total_sales / unique_customers as f64;

        let dates = self.dates()?;
        let top_row = stats::first_max_index(&amounts)
            .ok_or_else(|| AnalysisError::insufficient("Top Spender", "no purchases"))?;
        let top_spender = TopSpender {
            row: top_row,
            customer_id: customers[top_row].to_string(),
            amount: amounts[top_row],
            date: dates[top_row],
        };

        let total_items = stats::sum_present(&quantities);
        let average_items = stats::mean_present(&quantities).ok_or_else(|| {
            AnalysisError::insufficient("Average Items per Purchase", "no quantities")
        })?;

        let popular_category = stats::mode(&table.text(&c.product_category)?).ok_or_else(|| {
            AnalysisError::insufficient("Most Popular Product Category", "no categories")
        })?;

        let payment_breakdown = self.count_by(&c.payment_method)?;
        let top_payment_method = payment_breakdown
            .max_entry()
            .map(|e| e.label.clone())
            .ok_or_else(|| {
                AnalysisError::insufficient("Most Used Payment Method", "no payment methods")
            })?;

        let top_region = self
            .sum_by(&c.region, &c.purchase_amount)?
            .max_entry()
            .map(|e| e.label.clone())
            .ok_or_else(|| AnalysisError::insufficient("Region with Highest Sales", "no regions"))?;

        let discount_usage_pct = stats::share_pct(&table.text(&c.discount_applied)?, "Yes");
        let loyalty_pct = stats::share_pct(&table.text(&c.customer_loyalty)?, "Yes");
        let return_rate_pct = stats::share_pct(&table.text(&c.return_status)?, "Yes");

        let average_age = stats::mean_present(&table.numeric(&c.customer_age)?)
            .ok_or_else(|| AnalysisError::insufficient("Average Customer Age", "no ages"))?;
        let average_shipping = stats::mean_present(&table.numeric(&c.shipping_cost)?)
            .ok_or_else(|| {
                AnalysisError::insufficient("Average Shipping Cost", "no shipping costs")
            })?;

        let gender_breakdown = self.count_by(&c.customer_gender)?;

        let daily = self.daily_totals()?;
        let busiest_day = first_max_day(&daily)
            .ok_or_else(|| AnalysisError::insufficient("Busiest Day", "no dated purchases"))?;

        let frequent_customer = self
            .count_by(&c.customer_id)?
            .max_entry()
            .map(|e| FrequentCustomer {
                customer_id: e.label.clone(),
                purchases: e.value as usize,
            })
            .ok_or_else(|| AnalysisError::insufficient("Most Frequent Customer", "no customers"))?;

        let extended = match self.options.profile {
            Profile::Basic => None,
            Profile::Extended => Some(self.compute_extended(&customers, &amounts, &daily)?),
        };

        Ok(Figures {
            total_sales,
            average_spend,
            unique_customers,
            sales_per_customer,
            top_spender,
            total_items,
            popular_category,
            payment_breakdown,
            top_region,
            discount_usage_pct,
            average_age,
            gender_breakdown,
            loyalty_pct,
            average_shipping,
            return_rate_pct,
            busiest_day,
            frequent_customer,
            average_items,
            top_payment_method,
            extended,
        })
    }

    fn compute_extended(
        &mut self,
        customers: &[&str],
        amounts: &[f64],
        daily: &[DailyTotal],
    ) -> Result<ExtendedFigures> {
        let c = self.options.columns.clone();
        let table = self.table;

        let order_count = stats::count_distinct(&table.text(&c.order_id)?);
        let unique_products = stats::count_distinct(&table.text(&c.product_id)?);
        let total_tax = stats::sum_present(&table.numeric(&c.tax_amount)?);

        let average_unit_price = stats::mean_present(&table.numeric(&c.unit_price)?)
            .ok_or_else(|| AnalysisError::insufficient("Average Unit Price", "no unit prices"))?;
        let average_rating = stats::mean_present(&table.numeric(&c.customer_rating)?)
            .ok_or_else(|| AnalysisError::insufficient("Average Customer Rating", "no ratings"))?;

        let channel_breakdown = self.count_by(&c.order_channel)?;
        let delivery_breakdown = self.count_by(&c.delivery_method)?;
        let source_breakdown = self.count_by(&c.purchase_source)?;

        let busiest_time = stats::mode(&table.text(&c.transaction_time)?).ok_or_else(|| {
            AnalysisError::insufficient("Busiest Time of Day", "no transaction times")
        })?;

        let daily_values: Vec<f64> = daily.iter().map(|d| d.total).collect();
        let mean_daily_total = stats::mean(&daily_values)
            .ok_or_else(|| AnalysisError::insufficient("Sales Spikes", "no dated purchases"))?;
        let spike_floor = mean_daily_total * self.options.spike_multiplier;
        let spikes: Vec<DailyTotal> = daily
            .iter()
            .filter(|d| d.total > spike_floor)
            .copied()
            .collect();

        let outlier_threshold = stats::percentile(amounts, self.options.outlier_percentile)
            .ok_or_else(|| AnalysisError::insufficient("Outlier Purchases", "no purchases"))?;
        let outliers: Vec<Outlier> = amounts
            .iter()
            .enumerate()
            .filter(|(_, amount)| **amount > outlier_threshold)
            .map(|(row, amount)| Outlier {
                row,
                customer_id: customers[row].to_string(),
                amount: *amount,
            })
            .collect();

        debug!(
            "Found {} spike days and {} outlier purchases",
            spikes.len(),
            outliers.len()
        );

        Ok(ExtendedFigures {
            order_count,
            total_tax,
            unique_products,
            average_unit_price,
            average_rating,
            channel_breakdown,
            delivery_breakdown,
            source_breakdown,
            busiest_time,
            mean_daily_total,
            spikes,
            outlier_threshold,
            outliers,
        })
    }

    /// Aggregates the default charts draw from. All come from the cache.
    fn chart_aggregates(&mut self) -> Result<ChartAggregates> {
        let c = self.options.columns.clone();
        Ok(ChartAggregates {
            daily_sales: self.daily_totals()?,
            sales_by_category: self.sum_by(&c.product_category, &c.purchase_amount)?,
            sales_by_region: self.sum_by(&c.region, &c.purchase_amount)?,
            payment_methods: self.count_by(&c.payment_method)?,
            genders: self.count_by(&c.customer_gender)?,
        })
    }
}

/// First day holding the maximum total (the earliest, since days are sorted).
fn first_max_day(daily: &[DailyTotal]) -> Option<DailyTotal> {
    let totals: Vec<f64> = daily.iter().map(|d| d.total).collect();
    stats::first_max_index(&totals).map(|i| daily[i])
}

/// Format a money value with a currency prefix.
pub fn format_money(value: f64, symbol: &str) -> String {
    if value < 0.0 {
        format!("-{}{:.2}", symbol, value.abs())
    } else {
        format!("{}{:.2}", symbol, value)
    }
}

/// Format a count that is stored as a float.
pub fn format_count(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

/// Format a breakdown as "label: count, label: count".
pub fn format_breakdown(breakdown: &Breakdown) -> String {
    if breakdown.is_empty() {
        return "None".to_string();
    }
    breakdown
        .sorted_desc()
        .entries
        .iter()
        .map(|e| format!("{}: {}", e.label, format_count(e.value)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "an unknown date".to_string())
}

/// Turn raw figures into the ordered, formatted metric list.
pub fn summarize(figures: &Figures, currency: &str) -> Summary {
    let money = |v: f64| format_money(v, currency);
    let mut summary = Summary::default();

    summary.push("Total Sales", money(figures.total_sales));
    summary.push("Average Spend per Purchase", money(figures.average_spend));
    summary.push(
        "Number of Unique Customers",
        figures.unique_customers.to_string(),
    );
    summary.push(
        "Average Sales per Customer",
        money(figures.sales_per_customer),
    );
    summary.push(
        "Top Spender",
        format!(
            "{} spent {} on {}",
            figures.top_spender.customer_id,
            money(figures.top_spender.amount),
            format_date(figures.top_spender.date)
        ),
    );
    summary.push("Total Items Sold", format_count(figures.total_items));
    summary.push(
        "Most Popular Product Category",
        figures.popular_category.clone(),
    );
    summary.push(
        "Payment Method Breakdown",
        format_breakdown(&figures.payment_breakdown),
    );
    summary.push("Region with Highest Sales", figures.top_region.clone());
    summary.push(
        "Discount Usage (%)",
        format!("{:.1}", figures.discount_usage_pct),
    );
    summary.push(
        "Average Customer Age",
        format!("{:.1}", figures.average_age),
    );
    summary.push(
        "Gender Breakdown",
        format_breakdown(&figures.gender_breakdown),
    );
    summary.push("Loyalty Members (%)", format!("{:.1}", figures.loyalty_pct));
    summary.push("Average Shipping Cost", money(figures.average_shipping));
    summary.push("Return Rate (%)", format!("{:.1}", figures.return_rate_pct));
    summary.push(
        "Busiest Day",
        format!(
            "{} ({})",
            figures.busiest_day.date.format("%Y-%m-%d"),
            money(figures.busiest_day.total)
        ),
    );
    summary.push(
        "Most Frequent Customer",
        format!(
            "{} ({} purchases)",
            figures.frequent_customer.customer_id, figures.frequent_customer.purchases
        ),
    );
    summary.push(
        "Average Items per Purchase",
        format!("{:.2}", figures.average_items),
    );
    summary.push(
        "Most Used Payment Method",
        figures.top_payment_method.clone(),
    );

    if let Some(ref ext) = figures.extended {
        summary.push("Number of Orders", ext.order_count.to_string());
        summary.push("Total Tax", money(ext.total_tax));
        summary.push("Number of Unique Products", ext.unique_products.to_string());
        summary.push("Average Unit Price", money(ext.average_unit_price));
        summary.push(
            "Average Customer Rating",
            format!("{:.2}", ext.average_rating),
        );
        summary.push(
            "Order Channel Breakdown",
            format_breakdown(&ext.channel_breakdown),
        );
        summary.push(
            "Delivery Method Breakdown",
            format_breakdown(&ext.delivery_breakdown),
        );
        summary.push(
            "Purchase Source Breakdown",
            format_breakdown(&ext.source_breakdown),
        );
        summary.push("Busiest Time of Day", ext.busiest_time.clone());

        let spikes = if ext.spikes.is_empty() {
            "None".to_string()
        } else {
            ext.spikes
                .iter()
                .map(|d| format!("{} ({})", d.date.format("%Y-%m-%d"), money(d.total)))
                .collect::<Vec<_>>()
                .join(", ")
        };
        summary.push("Sales Spikes", spikes);

        summary.push(
            "Outlier Purchases",
            format!(
                "{} purchases above {}",
                ext.outliers.len(),
                money(ext.outlier_threshold)
            ),
        );
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Customer_ID,Purchase_Amount,Quantity,Product_Category,Payment_Method,Region,Discount_Applied,Customer_Age,Customer_Gender,Customer_Loyalty,Shipping_Cost,Return_Status,Date";

    fn table(rows: &[&str]) -> Table {
        let csv = format!("{}\n{}\n", HEADER, rows.join("\n"));
        Table::from_reader(csv.as_bytes()).unwrap()
    }

    fn sample() -> Table {
        table(&[
            "C1,10,1,Books,Card,North,Yes,30,F,Yes,2.5,No,01/03/2024",
            "C2,20,2,Toys,Cash,South,No,40,M,No,3.5,Yes,01/03/2024",
            "C1,30,3,Books,Card,South,No,50,F,Yes,4.0,No,02/03/2024",
        ])
    }

    fn analyse(table: &Table) -> Result<Analysis> {
        Aggregator::new(table, AggregatorOptions::default()).analyse()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * b.abs().max(1.0)
    }

    #[test]
    fn test_three_row_scenario() {
        let t = sample();
        let analysis = analyse(&t).unwrap();
        let f = &analysis.figures;

        assert_eq!(f.total_sales, 60.0);
        assert_eq!(f.average_spend, 20.0);
        assert_eq!(f.unique_customers, 2);
        assert_eq!(f.sales_per_customer, 30.0);

        let s = &analysis.summary;
        assert_eq!(s.get("Total Sales"), Some("$60.00"));
        assert_eq!(s.get("Average Spend per Purchase"), Some("$20.00"));
        assert_eq!(s.get("Average Sales per Customer"), Some("$30.00"));
        assert_eq!(s.get("Number of Unique Customers"), Some("2"));
    }

    #[test]
    fn test_metric_order_and_values() {
        let t = sample();
        let analysis = analyse(&t).unwrap();
        let names: Vec<_> = analysis.summary.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Total Sales",
                "Average Spend per Purchase",
                "Number of Unique Customers",
                "Average Sales per Customer",
                "Top Spender",
                "Total Items Sold",
                "Most Popular Product Category",
                "Payment Method Breakdown",
                "Region with Highest Sales",
                "Discount Usage (%)",
                "Average Customer Age",
                "Gender Breakdown",
                "Loyalty Members (%)",
                "Average Shipping Cost",
                "Return Rate (%)",
                "Busiest Day",
                "Most Frequent Customer",
                "Average Items per Purchase",
                "Most Used Payment Method",
            ]
        );

        let s = &analysis.summary;
        assert_eq!(s.get("Top Spender"), Some("C1 spent $30.00 on 2024-03-02"));
        assert_eq!(s.get("Total Items Sold"), Some("6"));
        assert_eq!(s.get("Most Popular Product Category"), Some("Books"));
        assert_eq!(s.get("Payment Method Breakdown"), Some("Card: 2, Cash: 1"));
        assert_eq!(s.get("Region with Highest Sales"), Some("South"));
        assert_eq!(s.get("Discount Usage (%)"), Some("33.3"));
        assert_eq!(s.get("Average Customer Age"), Some("40.0"));
        assert_eq!(s.get("Gender Breakdown"), Some("F: 2, M: 1"));
        assert_eq!(s.get("Loyalty Members (%)"), Some("66.7"));
        assert_eq!(s.get("Average Shipping Cost"), Some("$3.33"));
        assert_eq!(s.get("Return Rate (%)"), Some("33.3"));
        assert_eq!(s.get("Busiest Day"), Some("2024-03-01 ($30.00)"));
        assert_eq!(s.get("Most Frequent Customer"), Some("C1 (2 purchases)"));
        assert_eq!(s.get("Average Items per Purchase"), Some("2.00"));
        assert_eq!(s.get("Most Used Payment Method"), Some("Card"));
    }

    #[test]
    fn test_total_and_per_customer_properties() {
        let t = table(&[
            "A,0.1,1,X,Card,N,No,20,F,No,1,No,01/01/2024",
            "B,0.2,1,X,Card,N,No,20,F,No,1,No,02/01/2024",
            "C,1234.567,1,X,Card,N,No,20,F,No,1,No,03/01/2024",
            "A,99.99,1,X,Card,N,No,20,F,No,1,No,03/01/2024",
        ]);
        let f = analyse(&t).unwrap().figures;

        let expected: f64 = [0.1, 0.2, 1234.567, 99.99].iter().sum();
        assert!(close(f.total_sales, expected));
        assert!(close(
            f.sales_per_customer * f.unique_customers as f64,
            f.total_sales
        ));
    }

    #[test]
    fn test_idempotent() {
        let t = sample();
        let mut agg = Aggregator::new(&t, AggregatorOptions::default());
        let first = agg.analyse().unwrap();
        let second = agg.analyse().unwrap();
        assert_eq!(first, second);

        let fresh = analyse(&t).unwrap();
        assert_eq!(first, fresh);
    }

    #[test]
    fn test_busiest_day_is_maximum() {
        let t = table(&[
            "C1,10,1,A,Card,N,No,20,F,No,1,No,01/01/2024",
            "C2,50,1,A,Card,N,No,20,F,No,1,No,02/01/2024",
            "C3,45,1,A,Card,N,No,20,F,No,1,No,03/01/2024",
            "C4,20,1,A,Card,N,No,20,F,No,1,No,03/01/2024",
        ]);
        let analysis = analyse(&t).unwrap();
        let busiest = analysis.figures.busiest_day;

        assert_eq!(busiest.date, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        assert_eq!(busiest.total, 65.0);
        assert!(analysis
            .charts
            .daily_sales
            .iter()
            .all(|d| d.total <= busiest.total));
    }

    #[test]
    fn test_busiest_day_tie_goes_to_earliest() {
        let t = table(&[
            "C1,10,1,A,Card,N,No,20,F,No,1,No,05/01/2024",
            "C2,10,1,A,Card,N,No,20,F,No,1,No,02/01/2024",
        ]);
        let busiest = analyse(&t).unwrap().figures.busiest_day;
        assert_eq!(busiest.date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }

    #[test]
    fn test_single_row() {
        let t = table(&["C9,42,2,Garden,Cash,East,No,33,F,No,5,No,10/10/2024"]);
        let f = analyse(&t).unwrap().figures;

        assert_eq!(
            f.frequent_customer,
            FrequentCustomer {
                customer_id: "C9".to_string(),
                purchases: 1
            }
        );
        assert_eq!(f.top_spender.row, 0);
        assert_eq!(f.top_spender.customer_id, "C9");
        assert_eq!(f.top_spender.amount, 42.0);
        assert_eq!(f.top_spender.date, NaiveDate::from_ymd_opt(2024, 10, 10));
    }

    #[test]
    fn test_no_discounts_is_zero() {
        let t = table(&[
            "C1,10,1,A,Card,N,No,20,F,No,1,No,01/01/2024",
            "C2,10,1,A,Card,N,No,20,F,No,1,No,01/01/2024",
        ]);
        let analysis = analyse(&t).unwrap();
        assert_eq!(analysis.figures.discount_usage_pct, 0.0);
        assert_eq!(analysis.summary.get("Discount Usage (%)"), Some("0.0"));
        assert!((0.0..=100.0).contains(&analysis.figures.discount_usage_pct));
    }

    #[test]
    fn test_yes_flags_match_exactly() {
        let t = table(&[
            "C1,10,1,A,Card,N,yes,20,F,YES,1,yes,01/01/2024",
            "C2,10,1,A,Card,N,No,20,F,No,1,No,01/01/2024",
        ]);
        let f = analyse(&t).unwrap().figures;
        assert_eq!(f.discount_usage_pct, 0.0);
        assert_eq!(f.loyalty_pct, 0.0);
        assert_eq!(f.return_rate_pct, 0.0);
    }

    #[test]
    fn test_top_spender_first_row_on_tie() {
        let t = table(&[
            "C1,5,1,A,Card,N,No,20,F,No,1,No,01/01/2024",
            "C2,50,1,A,Card,N,No,20,F,No,1,No,02/01/2024",
            "C3,50,1,A,Card,N,No,20,F,No,1,No,03/01/2024",
        ]);
        let f = analyse(&t).unwrap().figures;
        assert_eq!(f.top_spender.customer_id, "C2");
    }

    #[test]
    fn test_empty_input() {
        let t = table(&[]);
        let err = analyse(&t).unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyInput));
    }

    #[test]
    fn test_missing_column() {
        let csv = "Customer_ID,Purchase_Amount\nC1,10\n";
        let t = Table::from_reader(csv.as_bytes()).unwrap();
        let err = analyse(&t).unwrap_err();
        assert!(matches!(err, AnalysisError::MissingColumn { ref column } if column == "Quantity"));
    }

    #[test]
    fn test_unparseable_date_parts() {
        let header = HEADER.replace(",Date", ",Day_Month,Year");
        let csv = format!(
            "{}\n{}\n{}\n",
            header,
            "C1,10,1,A,Card,N,No,20,F,No,1,No,soon,later",
            "C2,10,1,A,Card,N,No,20,F,No,1,No,??,never"
        );
        let t = Table::from_reader(csv.as_bytes()).unwrap();
        let options = AggregatorOptions {
            date_source: DateSource::Parts {
                day_month: "Day_Month".to_string(),
                year: "Year".to_string(),
            },
            ..AggregatorOptions::default()
        };

        let err = Aggregator::new(&t, options).analyse().unwrap_err();
        assert!(matches!(err, AnalysisError::DateParse { .. }));
    }

    #[test]
    fn test_validate_counts_dated_rows() {
        let t = table(&[
            "C1,10,1,A,Card,N,No,20,F,No,1,No,01/01/2024",
            "C2,10,1,A,Card,N,No,20,F,No,1,No,not a date",
        ]);
        let mut aggregator = Aggregator::new(&t, AggregatorOptions::default());
        assert_eq!(aggregator.validate().unwrap(), 1);
    }

    #[test]
    fn test_validate_rejects_empty_and_undated_tables() {
        let empty = table(&[]);
        let err = Aggregator::new(&empty, AggregatorOptions::default())
            .validate()
            .unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyInput));

        let undated = table(&["C1,10,1,A,Card,N,No,20,F,No,1,No,someday"]);
        let err = Aggregator::new(&undated, AggregatorOptions::default())
            .validate()
            .unwrap_err();
        assert!(matches!(err, AnalysisError::DateParse { .. }));
    }

    #[test]
    fn test_date_parts_compose() {
        let header = HEADER.replace(",Date", ",Day_Month,Year");
        let csv = format!(
            "{}\n{}\n",
            header, "C1,10,1,A,Card,N,No,20,F,No,1,No,15/03,2024"
        );
        let t = Table::from_reader(csv.as_bytes()).unwrap();
        let options = AggregatorOptions {
            date_source: DateSource::Parts {
                day_month: "Day_Month".to_string(),
                year: "Year".to_string(),
            },
            ..AggregatorOptions::default()
        };

        let analysis = Aggregator::new(&t, options).analyse().unwrap();
        assert_eq!(
            analysis.summary.get("Busiest Day"),
            Some("2024-03-15 ($10.00)")
        );
    }

    #[test]
    fn test_invalid_amount() {
        let t = table(&["C1,lots,1,A,Card,N,No,20,F,No,1,No,01/01/2024"]);
        let err = analyse(&t).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidValue { ref column, .. } if column == "Purchase_Amount"));
    }

    #[test]
    fn test_missing_customer_id() {
        let t = table(&[",10,1,A,Card,N,No,20,F,No,1,No,01/01/2024"]);
        let err = analyse(&t).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidValue { ref column, .. } if column == "Customer_ID"));
    }

    #[test]
    fn test_all_ages_blank_is_insufficient() {
        let t = table(&["C1,10,1,A,Card,N,No,,F,No,1,No,01/01/2024"]);
        let err = analyse(&t).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData { .. }));
    }

    #[test]
    fn test_cache_is_shared() {
        let t = sample();
        let mut agg = Aggregator::new(&t, AggregatorOptions::default());
        let analysis = agg.analyse().unwrap();

        let by_region = agg.sum_by("Region", "Purchase_Amount").unwrap();
        assert_eq!(by_region, analysis.charts.sales_by_region);
        assert_eq!(agg.cache.groups.len(), 5);
    }

    fn extended_table() -> Table {
        let header = format!(
            "{},Order_ID,Product_ID,Tax_Amount,Unit_Price,Customer_Rating,Order_Channel,Delivery_Method,Purchase_Source,Transaction_Time",
            HEADER
        );
        let rows = [
            "C1,10,1,A,Card,N,Yes,20,F,No,1,No,01/01/2024,O1,P1,1.0,10,4,Online,Standard,Ads,Morning",
            "C2,10,1,A,Card,N,No,20,F,No,1,No,02/01/2024,O2,P2,1.0,10,5,Store,Express,Search,Evening",
            "C3,10,1,A,Card,N,No,20,F,No,1,No,03/01/2024,O3,P1,1.0,10,3,Online,Standard,Ads,Morning",
            "C4,100,1,A,Card,N,No,20,F,No,1,No,04/01/2024,O3,P3,2.0,100,4,Online,Standard,Ads,Night",
        ];
        let csv = format!("{}\n{}\n", header, rows.join("\n"));
        Table::from_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_extended_profile() {
        let t = extended_table();
        let options = AggregatorOptions {
            profile: Profile::Extended,
            ..AggregatorOptions::default()
        };
        let analysis = Aggregator::new(&t, options).analyse().unwrap();
        let ext = analysis.figures.extended.clone().unwrap();

        assert_eq!(ext.order_count, 3);
        assert_eq!(ext.unique_products, 3);
        assert_eq!(ext.total_tax, 5.0);
        assert_eq!(ext.average_unit_price, 32.5);
        assert_eq!(ext.average_rating, 4.0);
        assert_eq!(ext.busiest_time, "Morning");

        // Mean daily total is 32.5; only 100 exceeds 1.2x
        assert_eq!(ext.mean_daily_total, 32.5);
        assert_eq!(ext.spikes.len(), 1);
        assert_eq!(ext.spikes[0].total, 100.0);

        // p95 of [10, 10, 10, 100] = 10 + 0.85 * 90
        assert!(close(ext.outlier_threshold, 86.5));
        assert_eq!(ext.outliers.len(), 1);
        assert_eq!(ext.outliers[0].customer_id, "C4");

        let s = &analysis.summary;
        assert_eq!(s.get("Order Channel Breakdown"), Some("Online: 3, Store: 1"));
        assert_eq!(s.get("Sales Spikes"), Some("2024-01-04 ($100.00)"));
        assert_eq!(s.get("Outlier Purchases"), Some("1 purchases above $86.50"));
        assert_eq!(s.len(), 30);
    }

    #[test]
    fn test_extended_requires_extra_columns() {
        let t = sample();
        let options = AggregatorOptions {
            profile: Profile::Extended,
            ..AggregatorOptions::default()
        };
        let err = Aggregator::new(&t, options).analyse().unwrap_err();
        assert!(matches!(err, AnalysisError::MissingColumn { ref column } if column == "Order_ID"));
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_money(1234.5, "$"), "$1234.50");
        assert_eq!(format_money(-5.0, "$"), "-$5.00");
        assert_eq!(format_count(6.0), "6");
        assert_eq!(format_count(2.5), "2.50");
        assert_eq!(format_breakdown(&Breakdown::default()), "None");
    }
}
