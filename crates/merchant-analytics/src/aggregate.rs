//! Group-by reductions and top-N ranking.
//!
//! These are chart-agnostic: every chart of the dashboard is fed by one of
//! the functions here, applied to a dataset or a filtered view.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::schema::Field;
use crate::types::TransactionRecord;

// =============================================================================
// Keys & Measures
// =============================================================================

/// Dimension to group records by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKey {
    Merchant,
    Device,
    Card,
}

impl GroupKey {
    pub fn field(self) -> Field {
        match self {
            GroupKey::Merchant => Field::MerchantName,
            GroupKey::Device => Field::DeviceName,
            GroupKey::Card => Field::MaskedCardNo,
        }
    }

    pub fn key_of(self, record: &TransactionRecord) -> &str {
        match self {
            GroupKey::Merchant => &record.merchant_name,
            GroupKey::Device => &record.device_name,
            GroupKey::Card => &record.masked_card_no,
        }
    }
}

/// Reduced value a group can be ranked by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    /// Sum of occurrences.
    Occurrences,
    /// Sum of non-missing amounts.
    TotalAmount,
    /// Mean of non-missing amounts.
    MeanAmount,
    /// Number of rows.
    RecordCount,
}

// =============================================================================
// Group Aggregation
// =============================================================================

/// Reduced measures of one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupAggregate {
    pub key: String,
    pub occurrences: u64,
    pub total_amount: f64,
    /// `None` when every amount in the group is missing.
    pub mean_amount: Option<f64>,
    pub record_count: usize,
    /// Share of rows flagged as successful, in percent.
    pub success_rate: f64,
}

impl GroupAggregate {
    /// Value of `measure` for ranking; a missing mean ranks below everything.
    pub fn value(&self, measure: Measure) -> f64 {
        match measure {
            Measure::Occurrences => self.occurrences as f64,
            Measure::TotalAmount => self.total_amount,
            Measure::MeanAmount => self.mean_amount.unwrap_or(f64::NEG_INFINITY),
            Measure::RecordCount => self.record_count as f64,
        }
    }
}

#[derive(Default)]
struct Accumulator {
    occurrences: u64,
    amount_sum: f64,
    amount_count: usize,
    record_count: usize,
    successes: usize,
}

impl Accumulator {
    fn push(&mut self, record: &TransactionRecord) {
        self.occurrences = self.occurrences.saturating_add(record.occurrences_or_zero());
        self.record_count += 1;
        self.successes += usize::from(record.success);
        if let Some(amount) = record.total_amount {
            self.amount_sum += amount;
            self.amount_count += 1;
        }
    }

    fn mean_amount(&self) -> Option<f64> {
        (self.amount_count > 0).then(|| self.amount_sum / self.amount_count as f64)
    }

    fn finish(self, key: String) -> GroupAggregate {
        GroupAggregate {
            mean_amount: self.mean_amount(),
            key,
            occurrences: self.occurrences,
            total_amount: self.amount_sum,
            record_count: self.record_count,
            success_rate: if self.record_count == 0 {
                0.0
            } else {
                self.successes as f64 / self.record_count as f64 * 100.0
            },
        }
    }
}

/// Group records by `key` and reduce every measure.
///
/// Groups come out in ascending key order; that order is the tie-breaker for
/// [`top_n`].
pub fn group_by<'a, I>(records: I, key: GroupKey) -> Vec<GroupAggregate>
where
    I: IntoIterator<Item = &'a TransactionRecord>,
{
    let mut groups: BTreeMap<&'a str, Accumulator> = BTreeMap::new();
    for record in records {
        groups.entry(key.key_of(record)).or_default().push(record);
    }
    groups
        .into_iter()
        .map(|(k, acc)| acc.finish(k.to_string()))
        .collect()
}

/// The `n` groups with the largest `measure`, descending.
///
/// The sort is stable, so ties keep their input order, and running it again
/// on its own output returns the same list.
pub fn top_n(mut groups: Vec<GroupAggregate>, measure: Measure, n: usize) -> Vec<GroupAggregate> {
    groups.sort_by(|a, b| b.value(measure).total_cmp(&a.value(measure)));
    groups.truncate(n);
    groups
}

/// [`group_by`] followed by [`top_n`].
pub fn top_groups<'a, I>(records: I, key: GroupKey, measure: Measure, n: usize) -> Vec<GroupAggregate>
where
    I: IntoIterator<Item = &'a TransactionRecord>,
{
    top_n(group_by(records, key), measure, n)
}

// =============================================================================
// Time Dimension
// =============================================================================

/// Totals for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub occurrences: u64,
    pub total_amount: f64,
    pub record_count: usize,
}

/// Per-day totals, ascending by date. Undated rows are skipped.
pub fn daily_totals<'a, I>(records: I) -> Vec<DailyTotal>
where
    I: IntoIterator<Item = &'a TransactionRecord>,
{
    let mut days: BTreeMap<NaiveDate, Accumulator> = BTreeMap::new();
    for record in records {
        if let Some(date) = record.transaction_date {
            days.entry(date).or_default().push(record);
        }
    }
    days.into_iter()
        .map(|(date, acc)| DailyTotal {
            date,
            occurrences: acc.occurrences,
            total_amount: acc.amount_sum,
            record_count: acc.record_count,
        })
        .collect()
}

// =============================================================================
// Two-key Matrix
// =============================================================================

/// A measure laid out over two dimensions (heatmap / sunburst input).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossTab {
    pub row_key: GroupKey,
    pub column_key: GroupKey,
    pub measure: Measure,
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    /// `values[r][c]`; combinations with no rows hold `0`.
    pub values: Vec<Vec<f64>>,
}

impl CrossTab {
    pub fn get(&self, row: &str, column: &str) -> Option<f64> {
        let r = self.rows.iter().position(|k| k == row)?;
        let c = self.columns.iter().position(|k| k == column)?;
        Some(self.values[r][c])
    }
}

/// Reduce `measure` over every (`row_key`, `column_key`) pair.
pub fn cross_tab<'a, I>(records: I, row_key: GroupKey, column_key: GroupKey, measure: Measure) -> CrossTab
where
    I: IntoIterator<Item = &'a TransactionRecord>,
{
    let mut cells: BTreeMap<(&'a str, &'a str), Accumulator> = BTreeMap::new();
    for record in records {
        cells
            .entry((row_key.key_of(record), column_key.key_of(record)))
            .or_default()
            .push(record);
    }

    let row_index = index_keys(cells.keys().map(|(r, _)| *r));
    let column_index = index_keys(cells.keys().map(|(_, c)| *c));

    let mut values = vec![vec![0.0; column_index.len()]; row_index.len()];
    for ((r, c), acc) in cells {
        let (ri, ci) = (row_index[r], column_index[c]);
        let cell = acc.finish(String::new());
        values[ri][ci] = match measure {
            Measure::MeanAmount => cell.mean_amount.unwrap_or(0.0),
            other => cell.value(other),
        };
    }

    CrossTab {
        row_key,
        column_key,
        measure,
        rows: row_index.into_keys().map(str::to_string).collect(),
        columns: column_index.into_keys().map(str::to_string).collect(),
        values,
    }
}

/// Position of each distinct key in ascending order.
fn index_keys<'a>(keys: impl Iterator<Item = &'a str>) -> BTreeMap<&'a str, usize> {
    let mut index: BTreeMap<&str, usize> = keys.map(|k| (k, 0)).collect();
    for (position, slot) in index.values_mut().enumerate() {
        *slot = position;
    }
    index
}

// =============================================================================
// Distributions
// =============================================================================

/// One equal-width histogram bin; `upper` is inclusive only for the last bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Equal-width histogram of the non-missing amounts.
///
/// Empty when no amount is present; a single bin when all amounts are equal.
pub fn amount_histogram<'a, I>(records: I, bins: usize) -> Vec<HistogramBin>
where
    I: IntoIterator<Item = &'a TransactionRecord>,
{
    let amounts: Vec<f64> = records.into_iter().filter_map(|r| r.total_amount).collect();
    let Some(&first) = amounts.first() else {
        return Vec::new();
    };
    let (lo, hi) = amounts
        .iter()
        .fold((first, first), |(lo, hi), &a| (lo.min(a), hi.max(a)));

    if bins == 0 {
        return Vec::new();
    }
    if lo == hi {
        return vec![HistogramBin {
            lower: lo,
            upper: hi,
            count: amounts.len(),
        }];
    }

    let width = (hi - lo) / bins as f64;
    let mut counts = vec![0usize; bins];
    for amount in &amounts {
        let idx = (((amount - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            lower: lo + width * i as f64,
            upper: if i + 1 == bins { hi } else { lo + width * (i + 1) as f64 },
            count,
        })
        .collect()
}

/// Five-number summary of a group's amounts (box plot input).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmountSpread {
    pub key: String,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    pub count: usize,
}

/// Amount spread per group, ascending by key. Groups without any amount are left out.
pub fn amount_spread<'a, I>(records: I, key: GroupKey) -> Vec<AmountSpread>
where
    I: IntoIterator<Item = &'a TransactionRecord>,
{
    let mut groups: BTreeMap<&'a str, Vec<f64>> = BTreeMap::new();
    for record in records {
        if let Some(amount) = record.total_amount {
            groups.entry(key.key_of(record)).or_default().push(amount);
        }
    }

    groups
        .into_iter()
        .map(|(k, mut amounts)| {
            amounts.sort_by(f64::total_cmp);
            AmountSpread {
                key: k.to_string(),
                min: amounts[0],
                q1: quantile(&amounts, 0.25),
                median: quantile(&amounts, 0.5),
                q3: quantile(&amounts, 0.75),
                max: amounts[amounts.len() - 1],
                count: amounts.len(),
            }
        })
        .collect()
}

/// Linear-interpolation quantile of a sorted, non-empty slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = (sorted.len() - 1) as f64 * q;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(merchant: &str, device: &str, card: &str, occ: u64, amount: Option<f64>) -> TransactionRecord {
        TransactionRecord {
            merchant_name: merchant.to_string(),
            device_name: device.to_string(),
            masked_card_no: card.to_string(),
            status: None,
            transaction_date: None,
            occurrences: Some(occ),
            total_amount: amount,
            success: 0,
            location: None,
        }
    }

    fn sample() -> Vec<TransactionRecord> {
        vec![
            record("A", "POS", "C1", 1, Some(100.0)),
            record("B", "WEB", "C2", 1, None),
            record("A", "WEB", "C1", 1, Some(50.0)),
            record("C", "POS", "C3", 7, Some(20.0)),
            record("B", "POS", "C2", 2, Some(150.0)),
        ]
    }

    // ==================== group_by ====================

    #[test]
    fn test_group_by_merchant_sums() {
        let groups = group_by(&sample(), GroupKey::Merchant);
        let keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["A", "B", "C"]);

        let a = &groups[0];
        assert_eq!(a.total_amount, 150.0);
        assert_eq!(a.occurrences, 2);
        assert_eq!(a.mean_amount, Some(75.0));
        assert_eq!(a.record_count, 2);

        let b = &groups[1];
        assert_eq!(b.total_amount, 150.0);
        assert_eq!(b.mean_amount, Some(150.0));
        assert_eq!(b.record_count, 2);
    }

    #[test]
    fn test_group_mean_none_when_all_missing() {
        let records = vec![record("X", "POS", "C9", 1, None)];
        let groups = group_by(&records, GroupKey::Merchant);
        assert_eq!(groups[0].mean_amount, None);
        assert_eq!(groups[0].total_amount, 0.0);
    }

    #[test]
    fn test_group_success_rate() {
        let mut records = sample();
        records[0].success = 1;
        let groups = group_by(&records, GroupKey::Merchant);
        assert_eq!(groups[0].success_rate, 50.0);
        assert_eq!(groups[1].success_rate, 0.0);
    }

    #[test]
    fn test_group_occurrences_saturate() {
        let records = vec![
            record("A", "POS", "C1", u64::MAX, Some(1.0)),
            record("A", "POS", "C2", u64::MAX, Some(2.0)),
        ];
        let groups = group_by(&records, GroupKey::Merchant);
        assert_eq!(groups[0].occurrences, u64::MAX);
        assert_eq!(groups[0].record_count, 2);
    }

    #[test]
    fn test_group_by_empty() {
        let records: Vec<TransactionRecord> = Vec::new();
        assert!(group_by(&records, GroupKey::Card).is_empty());
    }

    // ==================== top_n ====================

    #[test]
    fn test_top_n_descending_and_truncated() {
        let top = top_groups(&sample(), GroupKey::Merchant, Measure::Occurrences, 2);
        let keys: Vec<&str> = top.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["C", "B"]);
    }

    #[test]
    fn test_top_n_ties_keep_group_order() {
        // A and B both total 150.
        let top = top_groups(&sample(), GroupKey::Merchant, Measure::TotalAmount, 3);
        let keys: Vec<&str> = top.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_top_n_is_idempotent() {
        let first = top_groups(&sample(), GroupKey::Card, Measure::TotalAmount, 2);
        let again = top_n(first.clone(), Measure::TotalAmount, 5);
        assert_eq!(first, again);
    }

    #[test]
    fn test_top_n_larger_than_groups() {
        let top = top_groups(&sample(), GroupKey::Device, Measure::RecordCount, 10);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].key, "POS");
    }

    // ==================== daily_totals ====================

    #[test]
    fn test_daily_totals_sorted_and_skip_undated() {
        let mut records = sample();
        records[0].transaction_date = NaiveDate::from_ymd_opt(2024, 5, 2);
        records[2].transaction_date = NaiveDate::from_ymd_opt(2024, 5, 1);
        records[3].transaction_date = NaiveDate::from_ymd_opt(2024, 5, 2);

        let days = daily_totals(&records);
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(days[0].total_amount, 50.0);
        assert_eq!(days[1].occurrences, 8);
        assert_eq!(days[1].total_amount, 120.0);
    }

    // ==================== cross_tab ====================

    #[test]
    fn test_cross_tab_device_by_merchant() {
        let tab = cross_tab(&sample(), GroupKey::Device, GroupKey::Merchant, Measure::Occurrences);
        assert_eq!(tab.rows, vec!["POS", "WEB"]);
        assert_eq!(tab.columns, vec!["A", "B", "C"]);
        assert_eq!(tab.get("POS", "C"), Some(7.0));
        assert_eq!(tab.get("WEB", "C"), Some(0.0));
        assert_eq!(tab.get("WEB", "A"), Some(1.0));
        assert_eq!(tab.get("TAB", "A"), None);
    }

    #[test]
    fn test_cross_tab_sparse_cells() {
        let records = vec![
            record("Zed", "WEB", "C1", 2, Some(10.0)),
            record("Amy", "POS", "C2", 5, Some(20.0)),
            record("Amy", "WEB", "C3", 1, Some(30.0)),
            record("Moe", "ATM", "C4", 4, Some(40.0)),
        ];
        let tab = cross_tab(&records, GroupKey::Merchant, GroupKey::Device, Measure::TotalAmount);

        assert_eq!(tab.rows, vec!["Amy", "Moe", "Zed"]);
        assert_eq!(tab.columns, vec!["ATM", "POS", "WEB"]);
        assert_eq!(
            tab.values,
            vec![
                vec![0.0, 20.0, 30.0],
                vec![40.0, 0.0, 0.0],
                vec![0.0, 0.0, 10.0],
            ]
        );
    }

    // ==================== distributions ====================

    #[test]
    fn test_histogram_counts_every_amount() {
        let bins = amount_histogram(&sample(), 4);
        assert_eq!(bins.len(), 4);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 4);
        assert_eq!(bins[0].lower, 20.0);
        assert_eq!(bins[3].upper, 150.0);
        // 150 lands in the last bin
        assert_eq!(bins[3].count, 1);
    }

    #[test]
    fn test_histogram_degenerate_inputs() {
        let records: Vec<TransactionRecord> = Vec::new();
        assert!(amount_histogram(&records, 5).is_empty());

        let same = vec![
            record("A", "POS", "C1", 1, Some(10.0)),
            record("B", "POS", "C1", 1, Some(10.0)),
        ];
        let bins = amount_histogram(&same, 5);
        assert_eq!(bins.len(), 1);
        assert_eq!(bins[0].count, 2);
    }

    #[test]
    fn test_amount_spread_quartiles() {
        let records: Vec<TransactionRecord> = [1.0, 2.0, 3.0, 4.0, 5.0]
            .iter()
            .map(|&a| record("A", "POS", "C1", 1, Some(a)))
            .collect();
        let spread = amount_spread(&records, GroupKey::Merchant);
        assert_eq!(spread.len(), 1);
        assert_eq!(spread[0].min, 1.0);
        assert_eq!(spread[0].q1, 2.0);
        assert_eq!(spread[0].median, 3.0);
        assert_eq!(spread[0].q3, 4.0);
        assert_eq!(spread[0].max, 5.0);
    }

    #[test]
    fn test_quantile_interpolates() {
        assert_eq!(quantile(&[10.0, 20.0], 0.5), 15.0);
        assert_eq!(quantile(&[7.0], 0.75), 7.0);
    }
}
