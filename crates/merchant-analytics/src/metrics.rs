//! Scalar summary statistics for the metric cards.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::types::TransactionRecord;

/// Headline numbers for a set of records (full dataset or a filtered view).
///
/// Every field is well defined for an empty input: counts and sums are zero,
/// extremes are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    /// Number of rows, including rows with missing measures.
    pub record_count: usize,
    /// Sum of `occurrences`, saturating at `u64::MAX`.
    pub total_transactions: u64,
    /// Sum of non-missing `total_amount`.
    pub total_amount: f64,
    /// `total_amount / total_transactions`, or `0` when there are no transactions.
    pub avg_transaction_value: f64,
    /// Mean of the success flag, in percent. `None` when the upload has no
    /// `status` column.
    pub success_rate: Option<f64>,
    pub distinct_merchants: usize,
    pub distinct_devices: usize,
    pub distinct_cards: usize,
    /// Rows with an amount strictly above the high-value threshold.
    pub high_value_count: usize,
    /// Rows with an amount of exactly zero (anomalies).
    pub zero_amount_count: usize,
    /// Rows whose amount could not be read.
    pub missing_amount_count: usize,
    pub max_amount: Option<f64>,
    pub min_amount: Option<f64>,
    /// Largest single-row `occurrences`.
    pub max_occurrences: Option<u64>,
}

impl MetricSummary {
    /// Compute the summary in one pass.
    ///
    /// `track_success` should be true only when the source has a `status`
    /// column; otherwise the success rate is left out.
    pub fn compute<'a, I>(records: I, high_value_threshold: f64, track_success: bool) -> Self
    where
        I: IntoIterator<Item = &'a TransactionRecord>,
    {
        let mut summary = MetricSummary::default();
        let mut merchants = HashSet::new();
        let mut devices = HashSet::new();
        let mut cards = HashSet::new();
        let mut successes = 0usize;

        for record in records {
            summary.record_count += 1;
            summary.total_transactions = summary
                .total_transactions
                .saturating_add(record.occurrences_or_zero());
            successes += usize::from(record.success);

            merchants.insert(record.merchant_name.as_str());
            devices.insert(record.device_name.as_str());
            cards.insert(record.masked_card_no.as_str());

            if let Some(occ) = record.occurrences {
                summary.max_occurrences = Some(summary.max_occurrences.map_or(occ, |m| m.max(occ)));
            }

            match record.total_amount {
                Some(amount) => {
                    summary.total_amount += amount;
                    if amount > high_value_threshold {
                        summary.high_value_count += 1;
                    }
                    if amount == 0.0 {
                        summary.zero_amount_count += 1;
                    }
                    summary.max_amount = Some(summary.max_amount.map_or(amount, |m| m.max(amount)));
                    summary.min_amount = Some(summary.min_amount.map_or(amount, |m| m.min(amount)));
                }
                None => summary.missing_amount_count += 1,
            }
        }

        summary.distinct_merchants = merchants.len();
        summary.distinct_devices = devices.len();
        summary.distinct_cards = cards.len();
        summary.avg_transaction_value =
            average_transaction_value(summary.total_amount, summary.total_transactions);

        if track_success {
            summary.success_rate = Some(if summary.record_count == 0 {
                0.0
            } else {
                successes as f64 / summary.record_count as f64 * 100.0
            });
        }

        summary
    }

    /// Share of records above the high-value threshold, in percent.
    pub fn high_value_share(&self) -> f64 {
        if self.record_count == 0 {
            0.0
        } else {
            self.high_value_count as f64 / self.record_count as f64 * 100.0
        }
    }
}

/// Average value per transaction, defined as `0` when there are none.
pub fn average_transaction_value(total_amount: f64, total_transactions: u64) -> f64 {
    if total_transactions == 0 {
        0.0
    } else {
        total_amount / total_transactions as f64
    }
}
