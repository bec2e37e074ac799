//! Filter engine: user predicates combined with logical AND.
//!
//! Predicates run in a fixed order (date range, amount range, minimum
//! occurrences, merchant set, device set). An unset predicate matches
//! everything. Range bounds are inclusive; a row whose tested value is
//! missing fails an active range.

use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::AnalyticsConfig;
use crate::dataset::Dataset;
use crate::error::{Result, ResultExt};
use crate::metrics::MetricSummary;
use crate::types::{LoadWarning, TransactionRecord};

/// The user's current filter selection.
///
/// Serializable so a frontend can send it as JSON; every field is optional
/// and defaults to "no restriction".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
    /// Keep only these merchants. Empty means all.
    pub merchants: Vec<String>,
    /// Keep only these devices. Empty means all.
    pub devices: Vec<String>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    pub min_occurrences: Option<u64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merchants<I, S>(mut self, merchants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.merchants = merchants.into_iter().map(Into::into).collect();
        self
    }

    pub fn devices<I, S>(mut self, devices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.devices = devices.into_iter().map(Into::into).collect();
        self
    }

    /// Inclusive `[min, max]` amount range.
    pub fn amount_between(mut self, min: f64, max: f64) -> Self {
        self.min_amount = Some(min);
        self.max_amount = Some(max);
        self
    }

    pub fn min_amount(mut self, min: f64) -> Self {
        self.min_amount = Some(min);
        self
    }

    pub fn max_amount(mut self, max: f64) -> Self {
        self.max_amount = Some(max);
        self
    }

    pub fn min_occurrences(mut self, min: u64) -> Self {
        self.min_occurrences = Some(min);
        self
    }

    /// Inclusive `[start, end]` date range.
    pub fn date_between(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start_date = Some(start);
        self.end_date = Some(end);
        self
    }

    /// True when no predicate is active.
    pub fn is_unrestricted(&self) -> bool {
        *self == Self::default()
    }

    /// Select the rows of `dataset` matching every active predicate.
    pub fn apply<'a>(&self, dataset: &'a Dataset) -> FilteredView<'a> {
        let records = dataset.records();
        let mut indices: Vec<usize> = (0..records.len()).collect();

        if self.start_date.is_some() || self.end_date.is_some() {
            indices.retain(|&i| self.matches_date(&records[i]));
        }
        if self.min_amount.is_some() || self.max_amount.is_some() {
            indices.retain(|&i| self.matches_amount(&records[i]));
        }
        if self.min_occurrences.is_some() {
            indices.retain(|&i| self.matches_occurrences(&records[i]));
        }
        if !self.merchants.is_empty() {
            let wanted: HashSet<&str> = self.merchants.iter().map(String::as_str).collect();
            indices.retain(|&i| wanted.contains(records[i].merchant_name.as_str()));
        }
        if !self.devices.is_empty() {
            let wanted: HashSet<&str> = self.devices.iter().map(String::as_str).collect();
            indices.retain(|&i| wanted.contains(records[i].device_name.as_str()));
        }

        debug!("Filter kept {} of {} rows", indices.len(), records.len());
        FilteredView::new(dataset, indices)
    }

    /// Whether a single record passes every active predicate.
    pub fn matches(&self, record: &TransactionRecord) -> bool {
        self.matches_date(record)
            && self.matches_amount(record)
            && self.matches_occurrences(record)
            && (self.merchants.is_empty() || self.merchants.contains(&record.merchant_name))
            && (self.devices.is_empty() || self.devices.contains(&record.device_name))
    }

    fn matches_date(&self, record: &TransactionRecord) -> bool {
        in_range(record.transaction_date, self.start_date, self.end_date)
    }

    fn matches_amount(&self, record: &TransactionRecord) -> bool {
        in_range(record.total_amount, self.min_amount, self.max_amount)
    }

    fn matches_occurrences(&self, record: &TransactionRecord) -> bool {
        in_range(record.occurrences, self.min_occurrences, None)
    }
}

/// Inclusive range test; no bounds means pass, missing value with bounds means fail.
fn in_range<T: PartialOrd>(value: Option<T>, lower: Option<T>, upper: Option<T>) -> bool {
    if lower.is_none() && upper.is_none() {
        return true;
    }
    let Some(value) = value else {
        return false;
    };
    lower.is_none_or(|lo| value >= lo) && upper.is_none_or(|hi| value <= hi)
}

// =============================================================================
// Filtered View
// =============================================================================

/// Rows of a [`Dataset`] that survived a [`FilterCriteria`].
///
/// Borrowed from the dataset and cheap to rebuild; recompute it whenever the
/// criteria change.
#[derive(Debug, Clone)]
pub struct FilteredView<'a> {
    dataset: &'a Dataset,
    indices: Vec<usize>,
}

impl<'a> FilteredView<'a> {
    fn new(dataset: &'a Dataset, indices: Vec<usize>) -> Self {
        Self { dataset, indices }
    }

    pub fn dataset(&self) -> &'a Dataset {
        self.dataset
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Positions of the kept rows in the dataset.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn records(&self) -> impl Iterator<Item = &'a TransactionRecord> + Clone + '_ {
        let records = self.dataset.records();
        self.indices.iter().map(move |&i| &records[i])
    }

    /// Kept records, largest amount first; missing amounts go last.
    pub fn records_by_amount_desc(&self) -> Vec<&'a TransactionRecord> {
        let mut rows: Vec<&TransactionRecord> = self.records().collect();
        rows.sort_by(|a, b| {
            let a = a.total_amount.unwrap_or(f64::NEG_INFINITY);
            let b = b.total_amount.unwrap_or(f64::NEG_INFINITY);
            b.total_cmp(&a)
        });
        rows
    }

    /// `EmptyResult` when nothing matched, otherwise nothing.
    pub fn warnings(&self) -> Vec<LoadWarning> {
        if self.is_empty() && !self.dataset.is_empty() {
            warn!("Current filter combination matches no rows");
            vec![LoadWarning::EmptyResult]
        } else {
            Vec::new()
        }
    }

    pub fn metrics(&self, config: &AnalyticsConfig) -> MetricSummary {
        MetricSummary::compute(
            self.records(),
            config.high_value_threshold,
            self.dataset.has_status(),
        )
    }

    // =========================================================================
    // Export
    // =========================================================================

    /// The kept rows of the raw uploaded frame.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut mask_values = vec![false; self.dataset.len()];
        for &i in &self.indices {
            mask_values[i] = true;
        }
        let mask = BooleanChunked::from_slice("mask".into(), &mask_values);
        self.dataset
            .frame()
            .filter(&mask)
            .context("Selecting filtered rows")
    }

    /// Write the kept rows as CSV, with the same columns as the upload.
    pub fn write_csv<W: Write>(&self, mut writer: W) -> Result<()> {
        let mut df = self.to_dataframe()?;
        CsvWriter::new(&mut writer)
            .include_header(true)
            .with_separator(b',')
            .with_quote_char(b'"')
            .finish(&mut df)
            .context("Writing filtered CSV")?;
        Ok(())
    }

    /// [`write_csv`](Self::write_csv) to a file.
    pub fn write_csv_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).context(format!("Creating {}", path.display()))?;
        self.write_csv(file)?;
        info!("Filtered data saved: {} ({} rows)", path.display(), self.len());
        Ok(())
    }
}
