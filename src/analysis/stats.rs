//! Descriptive statistics over column slices.
//!
//! Ordering rules: grouped results keep first-encountered order, and every
//! "pick the largest" helper resolves ties to the first candidate.

use crate::models::{Breakdown, BreakdownEntry};
use std::collections::{HashMap, HashSet};

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Mean of the present values, skipping blanks.
pub fn mean_present(values: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    mean(&present)
}

/// Sum of the present values, skipping blanks.
pub fn sum_present(values: &[Option<f64>]) -> f64 {
    values.iter().flatten().sum()
}

/// Number of distinct non-blank values.
pub fn count_distinct(values: &[&str]) -> usize {
    values
        .iter()
        .filter(|v| !v.is_empty())
        .collect::<HashSet<_>>()
        .len()
}

/// Index of the first maximal value.
pub fn first_max_index(values: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, v) in values.iter().enumerate() {
        match best {
            Some(b) if *v <= values[b] => {}
            _ => best = Some(i),
        }
    }
    best
}

/// Row count per non-blank value, descending; ties keep first-encountered order.
pub fn value_counts(values: &[&str]) -> Breakdown {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();

    for value in values.iter().copied().filter(|v| !v.is_empty()) {
        let count = counts.entry(value).or_insert_with(|| {
            order.push(value);
            0
        });
        *count += 1;
    }

    Breakdown {
        entries: order
            .into_iter()
            .map(|label| BreakdownEntry {
                label: label.to_string(),
                value: counts[label] as f64,
            })
            .collect(),
    }
    .sorted_desc()
}

/// Most common non-blank value; ties resolve to the first one encountered.
pub fn mode(values: &[&str]) -> Option<String> {
    value_counts(values).entries.into_iter().next().map(|e| e.label)
}

/// Sum of `values` per non-blank key, in first-encountered key order.
/// Blank values are skipped.
pub fn group_sum(keys: &[&str], values: &[Option<f64>]) -> Breakdown {
    let mut order: Vec<&str> = Vec::new();
    let mut sums: HashMap<&str, f64> = HashMap::new();

    for (key, value) in keys.iter().copied().zip(values.iter()) {
        if key.is_empty() {
            continue;
        }
        let sum = sums.entry(key).or_insert_with(|| {
            order.push(key);
            0.0
        });
        if let Some(v) = value {
            *sum += v;
        }
    }

    Breakdown {
        entries: order
            .into_iter()
            .map(|label| BreakdownEntry {
                label: label.to_string(),
                value: sums[label],
            })
            .collect(),
    }
}

/// Percentage of rows exactly equal to `target`.
///
/// A target that never occurs gives 0.
pub fn share_pct(values: &[&str], target: &str) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let hits = values
        .iter()
        .filter(|v| **v == target)
        .count();
    hits as f64 / values.len() as f64 * 100.0
}

/// Percentile with linear interpolation between closest ranks.
///
/// `q` is a fraction in `[0, 1]`.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let weight = pos - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// Equal-width histogram of `values` with `bins` buckets.
///
/// Returns `(lower_edge, upper_edge, count)` per bucket; the last bucket
/// includes its upper edge.
pub fn histogram(values: &[f64], bins: usize) -> Vec<(f64, f64, usize)> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if min == max {
        return vec![(min, max, values.len())];
    }

    let width = (max - min) / bins as f64;
    let mut counts = vec![0usize; bins];
    for v in values {
        let idx = (((v - min) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| {
            let lower = min + width * i as f64;
            let upper = if i + 1 == bins { max } else { lower + width };
            (lower, upper, count)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[10.0, 20.0, 30.0]), Some(20.0));
        assert_eq!(mean(&[]), None);
        assert_eq!(mean_present(&[Some(1.0), None, Some(3.0)]), Some(2.0));
        assert_eq!(mean_present(&[None]), None);
        assert_eq!(sum_present(&[Some(1.5), None, Some(2.5)]), 4.0);
    }

    #[test]
    fn test_mode_first_encountered_on_tie() {
        assert_eq!(
            mode(&["Toys", "Books", "Books", "Toys"]),
            Some("Toys".to_string())
        );
        assert_eq!(
            mode(&["Toys", "Books", "Books"]),
            Some("Books".to_string())
        );
        assert_eq!(mode(&["", ""]), None);
    }

    #[test]
    fn test_value_counts() {
        let counts = value_counts(&["Cash", "Card", "Card", "", "Wallet"]);
        let pairs: Vec<_> = counts
            .entries
            .iter()
            .map(|e| (e.label.as_str(), e.value))
            .collect();
        assert_eq!(pairs, vec![("Card", 2.0), ("Cash", 1.0), ("Wallet", 1.0)]);
    }

    #[test]
    fn test_group_sum() {
        let sums = group_sum(
            &["North", "South", "North", ""],
            &[Some(10.0), Some(5.0), None, Some(100.0)],
        );
        assert_eq!(sums.len(), 2);
        assert_eq!(sums.entries[0].label, "North");
        assert_eq!(sums.value_of("North"), 10.0);
        assert_eq!(sums.value_of("South"), 5.0);
    }

    #[test]
    fn test_first_max_index() {
        assert_eq!(first_max_index(&[1.0, 5.0, 5.0, 2.0]), Some(1));
        assert_eq!(first_max_index(&[]), None);
    }

    #[test]
    fn test_count_distinct() {
        assert_eq!(count_distinct(&["C1", "C2", "C1", ""]), 2);
    }

    #[test]
    fn test_share_pct() {
        assert_eq!(share_pct(&["No", "No"], "Yes"), 0.0);
        assert_eq!(share_pct(&["Yes", "No", "Yes", "No"], "Yes"), 50.0);
        // Matching is exact
        assert_eq!(share_pct(&["yes", "YES", "No"], "Yes"), 0.0);
        assert_eq!(share_pct(&[], "Yes"), 0.0);
    }

    #[test]
    fn test_percentile_linear() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&values, 0.5), Some(3.0));
        assert_eq!(percentile(&values, 1.0), Some(5.0));
        // 0.95 * 4 = 3.8 -> 4 + 0.8 * (5 - 4)
        let p95 = percentile(&values, 0.95).unwrap();
        assert!((p95 - 4.8).abs() < 1e-12);
        assert_eq!(percentile(&[7.0], 0.95), Some(7.0));
        assert_eq!(percentile(&[], 0.95), None);
    }

    #[test]
    fn test_histogram() {
        let bins = histogram(&[0.0, 1.0, 2.0, 3.0, 4.0], 2);
        assert_eq!(bins.len(), 2);
        assert_eq!(bins[0].2 + bins[1].2, 5);
        assert_eq!(bins[1].1, 4.0);

        let flat = histogram(&[2.0, 2.0], 5);
        assert_eq!(flat, vec![(2.0, 2.0, 2)]);
        assert!(histogram(&[], 3).is_empty());
    }
}
