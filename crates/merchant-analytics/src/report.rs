//! Dashboard snapshot: everything the presentation layer renders, in one
//! serializable value.
//!
//! The snapshot is chart-agnostic data; what gets drawn from each field is
//! up to the frontend:
//!
//! | field                            | typical chart            |
//! |----------------------------------|--------------------------|
//! | `top_merchants_by_transactions`  | bar                      |
//! | `top_merchants_by_amount`        | pie                      |
//! | `device_usage`                   | treemap                  |
//! | `top_cards` + `card_regression`  | scatter with trendline   |
//! | `device_merchant_matrix`         | heatmap / sunburst       |
//! | `daily_totals`                   | line                     |
//! | `amount_histogram`               | histogram                |
//! | `amount_spread_by_device`        | box                      |
//! | `largest_transactions`           | raw data table           |

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

use crate::aggregate::{
    AmountSpread, CrossTab, DailyTotal, GroupAggregate, GroupKey, HistogramBin, Measure,
    amount_histogram, amount_spread, cross_tab, daily_totals, group_by, top_groups, top_n,
};
use crate::config::AnalyticsConfig;
use crate::dataset::Dataset;
use crate::error::{Result, ResultExt};
use crate::filter::FilterCriteria;
use crate::metrics::MetricSummary;
use crate::regression::{RegressionFit, amount_occurrence_correlation, fit_top_cards};
use crate::types::{LoadWarning, TransactionRecord};

/// One full recomputation of the dashboard for a dataset and a filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardReport {
    /// Local timestamp of the computation.
    pub generated_at: String,
    /// SHA-256 of the uploaded file.
    pub source_fingerprint: String,
    pub criteria: FilterCriteria,

    /// Metric cards over the whole upload.
    pub overall: MetricSummary,
    /// Metric cards over the filtered rows.
    pub filtered: MetricSummary,

    // Merchant dimension
    pub top_merchants_by_transactions: Vec<GroupAggregate>,
    pub top_merchants_by_amount: Vec<GroupAggregate>,

    // Device dimension
    /// Every device, busiest first.
    pub device_usage: Vec<GroupAggregate>,
    pub amount_spread_by_device: Vec<AmountSpread>,
    pub device_merchant_matrix: CrossTab,

    // Card dimension
    pub top_cards: Vec<GroupAggregate>,
    /// `None` when the filtered rows do not support a fit.
    pub card_regression: Option<RegressionFit>,

    // Correlation & distribution
    pub amount_occurrence_correlation: Option<f64>,
    pub amount_histogram: Vec<HistogramBin>,

    // Time dimension
    /// Empty when the upload has no `transaction_date` column.
    pub daily_totals: Vec<DailyTotal>,

    /// Filtered rows with the biggest `total_amount`, at most `top_n`.
    /// Rows without an amount come last.
    pub largest_transactions: Vec<TransactionRecord>,

    /// Load warnings plus any filter warnings.
    pub warnings: Vec<LoadWarning>,
}

impl DashboardReport {
    /// Run the whole pipeline (filter, metrics, aggregations) once.
    pub fn build(
        dataset: &Dataset,
        criteria: &FilterCriteria,
        config: &AnalyticsConfig,
    ) -> Result<Self> {
        let view = criteria.apply(dataset);
        let top = config.top_n;

        // A failed fit only drops the trendline.
        let card_regression = match fit_top_cards(view.records(), config.regression_top_k) {
            Ok(fit) => Some(fit),
            Err(e) => {
                warn!("Skipping card regression: {}", e);
                None
            }
        };

        let mut warnings = dataset.warnings().to_vec();
        warnings.extend(view.warnings());

        let report = DashboardReport {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            source_fingerprint: dataset.fingerprint().to_string(),
            criteria: criteria.clone(),
            overall: dataset.metrics(config),
            filtered: view.metrics(config),
            top_merchants_by_transactions: top_groups(
                view.records(),
                GroupKey::Merchant,
                Measure::Occurrences,
                top,
            ),
            top_merchants_by_amount: top_groups(
                view.records(),
                GroupKey::Merchant,
                Measure::TotalAmount,
                top,
            ),
            device_usage: {
                let devices = group_by(view.records(), GroupKey::Device);
                let n = devices.len();
                top_n(devices, Measure::Occurrences, n)
            },
            amount_spread_by_device: amount_spread(view.records(), GroupKey::Device),
            device_merchant_matrix: cross_tab(
                view.records(),
                GroupKey::Device,
                GroupKey::Merchant,
                Measure::Occurrences,
            ),
            top_cards: top_groups(view.records(), GroupKey::Card, Measure::Occurrences, top),
            card_regression,
            amount_occurrence_correlation: amount_occurrence_correlation(view.records()),
            amount_histogram: amount_histogram(view.records(), config.histogram_bins),
            daily_totals: daily_totals(view.records()),
            largest_transactions: view
                .records_by_amount_desc()
                .into_iter()
                .take(top)
                .cloned()
                .collect(),
            warnings,
        };

        info!(
            "Dashboard computed: {} of {} rows after filters",
            report.filtered.record_count, report.overall.record_count
        );
        Ok(report)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Save the report as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut file = File::create(path).context(format!("Creating {}", path.display()))?;
        file.write_all(self.to_json_pretty()?.as_bytes())?;
        info!("Report saved: {}", path.display());
        Ok(())
    }
}
