use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of an uploaded transaction file, after coercion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub merchant_name: String,
    pub device_name: String,
    pub masked_card_no: String,
    /// Present only when the file has a `status` column.
    pub status: Option<String>,
    /// Present only when the file has a `transaction_date` column and the
    /// cell is non-empty.
    pub transaction_date: Option<NaiveDate>,
    /// How many underlying transactions this row summarizes. `None` when the
    /// cell was not a non-negative whole number.
    pub occurrences: Option<u64>,
    /// `None` when the cell was not numeric.
    pub total_amount: Option<f64>,
    /// `1` iff `status` is "success" (case-insensitive), else `0`.
    pub success: u8,
    /// Trailing upper-case token of the merchant name, if any.
    pub location: Option<String>,
}

impl TransactionRecord {
    /// Occurrences with missing treated as zero, for summing.
    pub fn occurrences_or_zero(&self) -> u64 {
        self.occurrences.unwrap_or(0)
    }
}

/// Non-fatal conditions reported alongside data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoadWarning {
    /// A measure cell could not be coerced and was treated as missing.
    MissingValue {
        column: String,
        /// Zero-based data row (header excluded).
        row: usize,
        value: String,
    },
    /// Filtering left no rows; aggregates over the view are zero/empty.
    EmptyResult,
}

impl std::fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadWarning::MissingValue { column, row, value } => write!(
                f,
                "Row {}, column '{}': value '{}' is not numeric, treated as missing",
                row, column, value
            ),
            LoadWarning::EmptyResult => write!(f, "Current filters match no rows"),
        }
    }
}
