//! Error types for the transaction analytics pipeline.
//!
//! Fatal conditions are variants of [`AnalyticsError`], built with `thiserror`.
//! Non-fatal conditions (a non-numeric amount, a filter that matches nothing)
//! are not errors at all: they travel next to the data as
//! [`LoadWarning`](crate::types::LoadWarning) values.
//!
//! Errors are serializable so a frontend can render them directly.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the analytics pipeline.
#[derive(Error, Debug)]
pub enum AnalyticsError {
    /// The uploaded bytes cannot be turned into a dataset: a required column
    /// is absent, the CSV itself is unreadable, or a date cell is unparseable.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// No file has been uploaded in this session yet.
    #[error("No data loaded: please upload a CSV file to proceed")]
    NoDataLoaded,

    /// Not enough samples for a computation that needs several.
    #[error("Insufficient data for {operation}: {reason}")]
    InsufficientData { operation: String, reason: String },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Least-squares fit failed.
    #[error("Regression failed: {0}")]
    Regression(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<AnalyticsError>,
    },
}

impl AnalyticsError {
    /// Shorthand for a [`AnalyticsError::MalformedInput`].
    pub fn malformed(message: impl Into<String>) -> Self {
        AnalyticsError::MalformedInput(message.into())
    }

    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        AnalyticsError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable error code for frontend handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MalformedInput(_) => "MALFORMED_INPUT",
            Self::NoDataLoaded => "NO_DATA_LOADED",
            Self::InsufficientData { .. } => "INSUFFICIENT_DATA",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Regression(_) => "REGRESSION_FAILED",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if the user can fix this by uploading another file or changing
    /// a setting, as opposed to an internal failure.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::MalformedInput(_)
            | Self::NoDataLoaded
            | Self::InsufficientData { .. }
            | Self::InvalidConfig(_) => true,
            Self::WithContext { source, .. } => source.is_recoverable(),
            _ => false,
        }
    }
}

/// Errors are serialized as `{ "code": ..., "message": ... }`.
impl Serialize for AnalyticsError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("AnalyticsError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for analytics operations.
pub type Result<T> = std::result::Result<T, AnalyticsError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| AnalyticsError::Polars(e).with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| AnalyticsError::Io(e).with_context(context))
    }
}
