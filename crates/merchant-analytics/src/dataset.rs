//! The loaded, immutable dataset of one upload.

use chrono::NaiveDate;
use polars::prelude::DataFrame;

use crate::config::AnalyticsConfig;
use crate::filter::{FilterCriteria, FilteredView};
use crate::metrics::MetricSummary;
use crate::schema::{Field, Schema};
use crate::types::{LoadWarning, TransactionRecord};
use crate::utils::distinct_in_order;

/// An uploaded file after ingestion.
///
/// Holds both the typed [`TransactionRecord`]s used by every computation
/// and the raw text frame used to export rows in their original form.
/// Built by [`load`](crate::ingest::load); never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Dataset {
    frame: DataFrame,
    records: Vec<TransactionRecord>,
    schema: Schema,
    fingerprint: String,
    warnings: Vec<LoadWarning>,
}

impl Dataset {
    pub(crate) fn new(
        frame: DataFrame,
        records: Vec<TransactionRecord>,
        schema: Schema,
        fingerprint: String,
        warnings: Vec<LoadWarning>,
    ) -> Self {
        Self {
            frame,
            records,
            schema,
            fingerprint,
            warnings,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[TransactionRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TransactionRecord> {
        self.records.iter()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Raw uploaded columns, all as text.
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// SHA-256 of the source bytes.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Non-fatal coercion warnings from the load.
    pub fn warnings(&self) -> &[LoadWarning] {
        &self.warnings
    }

    pub fn has_status(&self) -> bool {
        self.schema.has(Field::Status)
    }

    pub fn has_dates(&self) -> bool {
        self.schema.has(Field::TransactionDate)
    }

    /// Metrics over every row.
    pub fn metrics(&self, config: &AnalyticsConfig) -> MetricSummary {
        MetricSummary::compute(
            self.records.iter(),
            config.high_value_threshold,
            self.has_status(),
        )
    }

    /// A view containing every row (the always-true filter).
    pub fn all(&self) -> FilteredView<'_> {
        FilterCriteria::default().apply(self)
    }

    /// Apply `criteria` to this dataset.
    pub fn filter(&self, criteria: &FilterCriteria) -> FilteredView<'_> {
        criteria.apply(self)
    }

    // =========================================================================
    // Filter control options
    // =========================================================================

    /// Distinct merchant names, in first-appearance order.
    pub fn merchant_options(&self) -> Vec<String> {
        distinct_in_order(self.records.iter().map(|r| r.merchant_name.as_str()))
    }

    /// Distinct device names, in first-appearance order.
    pub fn device_options(&self) -> Vec<String> {
        distinct_in_order(self.records.iter().map(|r| r.device_name.as_str()))
    }

    /// Earliest and latest transaction dates, if any row has one.
    pub fn date_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        let mut dates = self.records.iter().filter_map(|r| r.transaction_date);
        let first = dates.next()?;
        Some(dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d))))
    }

    /// Smallest and largest non-missing amounts.
    pub fn amount_bounds(&self) -> Option<(f64, f64)> {
        let mut amounts = self.records.iter().filter_map(|r| r.total_amount);
        let first = amounts.next()?;
        Some(amounts.fold((first, first), |(lo, hi), a| (lo.min(a), hi.max(a))))
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a TransactionRecord;
    type IntoIter = std::slice::Iter<'a, TransactionRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
