//! Configuration types for the analytics pipeline.
//!
//! Configuration is built with the builder pattern and validated on
//! [`AnalyticsConfigBuilder::build`].

use serde::{Deserialize, Serialize};

/// Records whose amount is strictly above this are counted as high-value.
pub const DEFAULT_HIGH_VALUE_THRESHOLD: f64 = 5000.0;

/// Default number of groups kept by top-N chart aggregations.
pub const DEFAULT_TOP_N: usize = 10;

/// Default number of cards fed to the amount/occurrence regression.
pub const DEFAULT_REGRESSION_TOP_K: usize = 10;

/// Default number of bins for the amount histogram.
pub const DEFAULT_HISTOGRAM_BINS: usize = 20;

/// Date formats tried, in order, for the `transaction_date` column.
///
/// A format containing a time component is parsed as a datetime and
/// truncated to its date.
pub fn default_date_formats() -> Vec<String> {
    vec![
        "%Y-%m-%d".to_string(),
        "%Y-%m-%d %H:%M:%S".to_string(),
        "%Y-%m-%dT%H:%M:%S".to_string(),
        "%Y/%m/%d".to_string(),
        "%d-%m-%Y".to_string(),
    ]
}

/// Configuration for the analytics pipeline.
///
/// Use [`AnalyticsConfig::builder()`] to create a new configuration
/// with a fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use merchant_analytics::AnalyticsConfig;
///
/// let config = AnalyticsConfig::builder()
///     .high_value_threshold(10_000.0)
///     .top_n(5)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Amount above which a record counts as high-value.
    /// Default: 5000.0
    pub high_value_threshold: f64,

    /// Number of groups kept for top-N charts.
    /// Default: 10
    pub top_n: usize,

    /// Number of cards (by occurrences) used for the regression fit.
    /// Default: 10
    pub regression_top_k: usize,

    /// Number of equal-width bins for the amount histogram.
    /// Default: 20
    pub histogram_bins: usize,

    /// `chrono` format strings accepted for `transaction_date`, tried in order.
    pub date_formats: Vec<String>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            high_value_threshold: DEFAULT_HIGH_VALUE_THRESHOLD,
            top_n: DEFAULT_TOP_N,
            regression_top_k: DEFAULT_REGRESSION_TOP_K,
            histogram_bins: DEFAULT_HISTOGRAM_BINS,
            date_formats: default_date_formats(),
        }
    }
}

impl AnalyticsConfig {
    /// Create a new configuration builder.
    pub fn builder() -> AnalyticsConfigBuilder {
        AnalyticsConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !self.high_value_threshold.is_finite() || self.high_value_threshold < 0.0 {
            return Err(ConfigValidationError::InvalidThreshold(
                self.high_value_threshold,
            ));
        }

        if self.top_n == 0 {
            return Err(ConfigValidationError::ZeroCount {
                field: "top_n".to_string(),
            });
        }

        if self.regression_top_k < 2 {
            return Err(ConfigValidationError::RegressionSampleTooSmall(
                self.regression_top_k,
            ));
        }

        if self.histogram_bins == 0 {
            return Err(ConfigValidationError::ZeroCount {
                field: "histogram_bins".to_string(),
            });
        }

        if self.date_formats.is_empty() {
            return Err(ConfigValidationError::NoDateFormats);
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid high-value threshold: {0} (must be a finite, non-negative amount)")]
    InvalidThreshold(f64),

    #[error("Invalid value for '{field}': must be at least 1")]
    ZeroCount { field: String },

    #[error("Invalid regression sample size: {0} (must be at least 2)")]
    RegressionSampleTooSmall(usize),

    #[error("At least one date format is required")]
    NoDateFormats,
}

impl From<ConfigValidationError> for crate::error::AnalyticsError {
    fn from(err: ConfigValidationError) -> Self {
        crate::error::AnalyticsError::InvalidConfig(err.to_string())
    }
}

/// Builder for [`AnalyticsConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct AnalyticsConfigBuilder {
    high_value_threshold: Option<f64>,
    top_n: Option<usize>,
    regression_top_k: Option<usize>,
    histogram_bins: Option<usize>,
    date_formats: Option<Vec<String>>,
}

impl AnalyticsConfigBuilder {
    /// Set the amount above which a record counts as high-value.
    pub fn high_value_threshold(mut self, threshold: f64) -> Self {
        self.high_value_threshold = Some(threshold);
        self
    }

    /// Set how many groups top-N charts keep.
    pub fn top_n(mut self, n: usize) -> Self {
        self.top_n = Some(n);
        self
    }

    /// Set how many cards feed the regression fit.
    pub fn regression_top_k(mut self, k: usize) -> Self {
        self.regression_top_k = Some(k);
        self
    }

    /// Set the number of histogram bins.
    pub fn histogram_bins(mut self, bins: usize) -> Self {
        self.histogram_bins = Some(bins);
        self
    }

    /// Replace the accepted date formats.
    pub fn date_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.date_formats = Some(formats.into_iter().map(Into::into).collect());
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `AnalyticsConfig` or an error if validation fails.
    pub fn build(self) -> Result<AnalyticsConfig, ConfigValidationError> {
        let config = AnalyticsConfig {
            high_value_threshold: self
                .high_value_threshold
                .unwrap_or(DEFAULT_HIGH_VALUE_THRESHOLD),
            top_n: self.top_n.unwrap_or(DEFAULT_TOP_N),
            regression_top_k: self.regression_top_k.unwrap_or(DEFAULT_REGRESSION_TOP_K),
            histogram_bins: self.histogram_bins.unwrap_or(DEFAULT_HISTOGRAM_BINS),
            date_formats: self.date_formats.unwrap_or_else(default_date_formats),
        };

        config.validate()?;
        Ok(config)
    }
}
