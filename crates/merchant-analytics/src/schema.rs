//! Recognized columns of a transaction CSV and the role each one plays.
//!
//! Aggregation code never refers to raw column names; it goes through
//! [`Field`] (and the [`GroupKey`](crate::aggregate::GroupKey) /
//! [`Measure`](crate::aggregate::Measure) enums built on top of it).

use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};

/// How a column participates in the analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldRole {
    /// Categorical grouping key (merchant, device, card).
    Dimension,
    /// Numeric value that gets summed or averaged.
    Measure,
    /// Column that enables extra metrics or filters when present.
    Optional,
}

/// A column the pipeline knows how to interpret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    MerchantName,
    DeviceName,
    MaskedCardNo,
    Occurrences,
    TotalAmount,
    Status,
    TransactionDate,
}

impl Field {
    /// Every recognized field, in canonical order.
    pub const ALL: [Field; 7] = [
        Field::MerchantName,
        Field::DeviceName,
        Field::MaskedCardNo,
        Field::Occurrences,
        Field::TotalAmount,
        Field::Status,
        Field::TransactionDate,
    ];

    /// Column header used in the CSV.
    pub fn column_name(self) -> &'static str {
        match self {
            Field::MerchantName => "merchant_name",
            Field::DeviceName => "device_name",
            Field::MaskedCardNo => "masked_card_no",
            Field::Occurrences => "occurrences",
            Field::TotalAmount => "total_amount",
            Field::Status => "status",
            Field::TransactionDate => "transaction_date",
        }
    }

    pub fn role(self) -> FieldRole {
        match self {
            Field::MerchantName | Field::DeviceName | Field::MaskedCardNo => FieldRole::Dimension,
            Field::Occurrences | Field::TotalAmount => FieldRole::Measure,
            Field::Status | Field::TransactionDate => FieldRole::Optional,
        }
    }

    /// Whether a load must fail when this column is absent.
    pub fn is_required(self) -> bool {
        self.role() != FieldRole::Optional
    }

    /// Look a field up by its (trimmed) column header.
    pub fn from_column_name(name: &str) -> Option<Field> {
        let name = name.trim();
        Field::ALL.into_iter().find(|f| f.column_name() == name)
    }
}

/// Which recognized fields a particular upload carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Raw header of the uploaded file, in file order.
    pub columns: Vec<String>,
    /// Recognized fields that were found.
    pub present: Vec<Field>,
}

impl Schema {
    /// Match a CSV header against the recognized fields.
    ///
    /// Fails with [`AnalyticsError::MalformedInput`] listing every required
    /// column that is missing.
    pub fn detect<S: AsRef<str>>(header: &[S]) -> Result<Schema> {
        let columns: Vec<String> = header.iter().map(|c| c.as_ref().to_string()).collect();
        let present: Vec<Field> = Field::ALL
            .into_iter()
            .filter(|f| columns.iter().any(|c| c.trim() == f.column_name()))
            .collect();

        let missing: Vec<&str> = Field::ALL
            .into_iter()
            .filter(|f| f.is_required() && !present.contains(f))
            .map(Field::column_name)
            .collect();

        if !missing.is_empty() {
            return Err(AnalyticsError::malformed(format!(
                "missing required column(s): {}",
                missing.join(", ")
            )));
        }

        Ok(Schema { columns, present })
    }

    pub fn has(&self, field: Field) -> bool {
        self.present.contains(&field)
    }

    /// Raw header text for a field, as it appeared in the file.
    pub fn header_for(&self, field: Field) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.trim() == field.column_name())
            .map(String::as_str)
    }
}
