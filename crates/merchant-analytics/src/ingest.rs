//! Ingestion & normalization: CSV bytes to a typed [`Dataset`].
//!
//! The file is read with Polars with schema inference disabled, so every
//! column arrives as text exactly as uploaded. That raw frame is kept for
//! export; the typed records are derived from it cell by cell.
//!
//! # Coercion policy
//!
//! - `occurrences` / `total_amount`: a non-empty cell that is not a number
//!   becomes missing and produces a [`LoadWarning::MissingValue`]. The row is
//!   kept.
//! - `transaction_date`: an empty cell is missing, but a non-empty cell that
//!   matches none of the configured formats fails the whole load.

use polars::prelude::*;
use sha2::{Digest, Sha256};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::AnalyticsConfig;
use crate::dataset::Dataset;
use crate::error::{AnalyticsError, Result, ResultExt};
use crate::schema::{Field, Schema};
use crate::types::{LoadWarning, TransactionRecord};
use crate::utils::{extract_location, parse_amount, parse_count, parse_date, success_flag};

/// SHA-256 of the uploaded bytes, hex encoded. Used as the load-cache key.
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Parse uploaded CSV bytes into a [`Dataset`].
///
/// # Errors
///
/// [`AnalyticsError::MalformedInput`] when the bytes are not a CSV, when a
/// required column is missing, or when a date cell cannot be parsed.
pub fn load(bytes: &[u8], config: &AnalyticsConfig) -> Result<Dataset> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(AnalyticsError::malformed("uploaded file is empty"));
    }

    let frame = read_raw_frame(bytes)?;
    let header: Vec<String> = frame
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    let schema = Schema::detect(&header)?;
    debug!("Recognized columns: {:?}", schema.present);

    let (records, warnings) = normalize(&frame, &schema, config)?;

    if !warnings.is_empty() {
        warn!(
            "{} non-numeric measure value(s) treated as missing",
            warnings.len()
        );
    }
    info!(
        "Loaded {} rows, {} columns (status: {}, dates: {})",
        records.len(),
        header.len(),
        schema.has(Field::Status),
        schema.has(Field::TransactionDate)
    );

    Ok(Dataset::new(
        frame,
        records,
        schema,
        fingerprint(bytes),
        warnings,
    ))
}

/// Read a CSV file from disk and [`load`] it.
pub fn load_file(path: impl AsRef<Path>, config: &AnalyticsConfig) -> Result<Dataset> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).context(format!("Reading {}", path.display()))?;
    load(&bytes, config)
}

/// Read every column as text.
fn read_raw_frame(bytes: &[u8]) -> Result<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        // Zero rows of inference: all columns stay String.
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(Cursor::new(bytes.to_vec()))
        .finish()
        .map_err(|e| AnalyticsError::malformed(format!("unreadable CSV: {}", e)))
}

/// Text cells of one column, `None` for nulls.
fn text_cells<'a>(frame: &'a DataFrame, header: &str) -> Result<Vec<Option<&'a str>>> {
    let column = frame
        .column(header)
        .context(format!("Reading column '{}'", header))?;
    let text = column
        .str()
        .context(format!("Column '{}' is not text", header))?;
    Ok(text.into_iter().collect())
}

/// Cells for a field, or a column of nulls when the field is absent.
fn field_cells<'a>(
    frame: &'a DataFrame,
    schema: &Schema,
    field: Field,
) -> Result<Vec<Option<&'a str>>> {
    match schema.header_for(field) {
        Some(header) => text_cells(frame, header),
        None => Ok(vec![None; frame.height()]),
    }
}

fn normalize(
    frame: &DataFrame,
    schema: &Schema,
    config: &AnalyticsConfig,
) -> Result<(Vec<TransactionRecord>, Vec<LoadWarning>)> {
    let merchants = field_cells(frame, schema, Field::MerchantName)?;
    let devices = field_cells(frame, schema, Field::DeviceName)?;
    let cards = field_cells(frame, schema, Field::MaskedCardNo)?;
    let occurrences = field_cells(frame, schema, Field::Occurrences)?;
    let amounts = field_cells(frame, schema, Field::TotalAmount)?;
    let statuses = field_cells(frame, schema, Field::Status)?;
    let dates = field_cells(frame, schema, Field::TransactionDate)?;

    let mut records = Vec::with_capacity(frame.height());
    let mut warnings = Vec::new();

    for row in 0..frame.height() {
        let merchant_name = merchants[row].unwrap_or_default().to_string();
        let status = statuses[row].map(str::to_string);

        let transaction_date = match dates[row].map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Some(parse_date(raw, &config.date_formats).ok_or_else(|| {
                AnalyticsError::malformed(format!(
                    "row {}: cannot parse {} '{}'",
                    row,
                    Field::TransactionDate.column_name(),
                    raw
                ))
            })?),
            None => None,
        };

        let record = TransactionRecord {
            location: extract_location(&merchant_name),
            success: success_flag(status.as_deref()),
            device_name: devices[row].unwrap_or_default().to_string(),
            masked_card_no: cards[row].unwrap_or_default().to_string(),
            occurrences: coerce(
                occurrences[row],
                parse_count,
                Field::Occurrences,
                row,
                &mut warnings,
            ),
            total_amount: coerce(
                amounts[row],
                parse_amount,
                Field::TotalAmount,
                row,
                &mut warnings,
            ),
            merchant_name,
            status,
            transaction_date,
        };
        records.push(record);
    }

    Ok((records, warnings))
}

/// Apply a numeric parser, recording a warning for non-empty failures.
fn coerce<T>(
    cell: Option<&str>,
    parse: fn(&str) -> Option<T>,
    field: Field,
    row: usize,
    warnings: &mut Vec<LoadWarning>,
) -> Option<T> {
    let raw = cell?;
    let parsed = parse(raw);
    if parsed.is_none() && !raw.trim().is_empty() {
        debug!(
            "Row {}: '{}' in {} is not numeric",
            row,
            raw,
            field.column_name()
        );
        warnings.push(LoadWarning::MissingValue {
            column: field.column_name().to_string(),
            row,
            value: raw.to_string(),
        });
    }
    parsed
}
