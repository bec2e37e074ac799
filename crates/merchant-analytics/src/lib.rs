//! Merchant Transaction Analytics Library
//!
//! Ingestion, filtering, aggregation and export for merchant card-transaction
//! CSV files, built on Polars.
//!
//! # Overview
//!
//! - **Ingestion**: header detection, numeric and date coercion, derived
//!   `success` flag and `location` token
//! - **Metrics**: headline numbers for the full upload and the filtered rows
//! - **Filtering**: merchant/device selections plus amount, occurrence and
//!   date ranges, ANDed together
//! - **Aggregations**: group-by and top-N rankings by merchant, device and
//!   card, daily totals, cross tabs, histograms, box-plot spreads
//! - **Regression**: least-squares fit of frequency against amount over the
//!   busiest cards
//! - **Export**: the filtered rows written back as CSV with the original
//!   columns
//!
//! # Architecture
//!
//! ```text
//!   CSV bytes ──► ingest::load ──► Dataset ──► FilterCriteria::apply ──► FilteredView
//!                     │               │                                    │
//!                     ▼               ▼                                    ▼
//!              Schema::detect    MetricSummary          aggregate::* / regression::*
//!                                                                          │
//!                                                                          ▼
//!                                             DashboardReport ◄────────────┘
//!                                                  ▲
//!   Session (memo keyed by SHA-256) ───────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use merchant_analytics::{AnalyticsConfig, FilterCriteria, Session};
//!
//! let mut session = Session::new(AnalyticsConfig::default());
//! session.upload(&std::fs::read("transactions.csv")?)?;
//!
//! session.set_filters(
//!     FilterCriteria::new()
//!         .merchants(["Shop LAGOS"])
//!         .amount_between(100.0, 10_000.0),
//! );
//!
//! let report = session.report()?;
//! println!("Total amount: {:.2}", report.filtered.total_amount);
//! println!("Top merchant: {:?}", report.top_merchants_by_transactions.first());
//!
//! session.export_filtered(std::fs::File::create("filtered.csv")?)?;
//! ```
//!
//! # Configuration
//!
//! ```rust,ignore
//! use merchant_analytics::AnalyticsConfig;
//!
//! let config = AnalyticsConfig::builder()
//!     .high_value_threshold(10_000.0)   // "high value" is strictly above this
//!     .top_n(5)                         // bars in the top-N charts
//!     .regression_top_k(20)             // cards used for the trendline
//!     .date_formats(["%d/%m/%Y"])
//!     .build()?;
//! ```

pub mod aggregate;
pub mod config;
pub mod dataset;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod metrics;
pub mod regression;
pub mod report;
pub mod schema;
pub mod session;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use aggregate::{
    AmountSpread, CrossTab, DailyTotal, GroupAggregate, GroupKey, HistogramBin, Measure,
    amount_histogram, amount_spread, cross_tab, daily_totals, group_by, top_groups, top_n,
};
pub use config::{AnalyticsConfig, AnalyticsConfigBuilder, ConfigValidationError};
pub use dataset::Dataset;
pub use error::{AnalyticsError, Result as AnalyticsResult, ResultExt};
pub use filter::{FilterCriteria, FilteredView};
pub use ingest::{fingerprint, load, load_file};
pub use metrics::MetricSummary;
pub use regression::{RegressionFit, fit_ols, fit_top_cards, pearson_correlation};
pub use report::DashboardReport;
pub use schema::{Field, FieldRole, Schema};
pub use session::{Session, SessionRegistry};
pub use types::{LoadWarning, TransactionRecord};
