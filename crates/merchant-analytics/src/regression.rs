//! Amount vs. frequency relationship of the busiest cards.
//!
//! The fit itself is delegated to `linfa-linear`'s ordinary least squares;
//! this module only prepares the samples and scores the result.

use linfa::Dataset as LinfaDataset;
use linfa::traits::Fit;
use linfa_linear::LinearRegression;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregate::{GroupKey, Measure, top_groups};
use crate::error::{AnalyticsError, Result};
use crate::types::TransactionRecord;

/// `occurrences = intercept + slope * total_amount`, fitted over card totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionFit {
    pub slope: f64,
    pub intercept: f64,
    /// Coefficient of determination of the fit.
    pub r_squared: f64,
    pub n_samples: usize,
    /// Cards used as samples, busiest first.
    pub cards: Vec<String>,
}

impl RegressionFit {
    pub fn predict(&self, total_amount: f64) -> f64 {
        self.intercept + self.slope * total_amount
    }
}

/// Fit occurrences against amount over the top `k` cards by occurrences.
///
/// # Errors
///
/// [`AnalyticsError::InsufficientData`] when fewer than two cards are
/// available or every card has the same total amount.
pub fn fit_top_cards<'a, I>(records: I, k: usize) -> Result<RegressionFit>
where
    I: IntoIterator<Item = &'a TransactionRecord>,
{
    let cards = top_groups(records, GroupKey::Card, Measure::Occurrences, k);
    let xs: Vec<f64> = cards.iter().map(|g| g.total_amount).collect();
    let ys: Vec<f64> = cards.iter().map(|g| g.occurrences as f64).collect();

    let (slope, intercept, r_squared) = fit_ols(&xs, &ys)?;
    debug!(
        "Card regression over {} cards: slope={:.6}, intercept={:.4}, r2={:.4}",
        cards.len(),
        slope,
        intercept,
        r_squared
    );

    Ok(RegressionFit {
        slope,
        intercept,
        r_squared,
        n_samples: cards.len(),
        cards: cards.into_iter().map(|g| g.key).collect(),
    })
}

/// One-predictor OLS. Returns `(slope, intercept, r_squared)`.
pub fn fit_ols(xs: &[f64], ys: &[f64]) -> Result<(f64, f64, f64)> {
    if xs.len() != ys.len() {
        return Err(AnalyticsError::Regression(format!(
            "{} predictors but {} targets",
            xs.len(),
            ys.len()
        )));
    }
    if xs.len() < 2 {
        return Err(insufficient(format!("{} sample(s), need at least 2", xs.len())));
    }
    if xs.iter().all(|&x| x == xs[0]) {
        return Err(insufficient("every sample has the same total amount".to_string()));
    }

    let mean_x = xs.iter().sum::<f64>() / xs.len() as f64;
    let spread_x: f64 = xs.iter().map(|x| (x - mean_x).powi(2)).sum();
    if !spread_x.is_finite() {
        return Err(AnalyticsError::Regression(
            "amounts too large to fit".to_string(),
        ));
    }

    let records = Array2::from_shape_vec((xs.len(), 1), xs.to_vec())
        .map_err(|e| AnalyticsError::Regression(e.to_string()))?;
    let targets = Array1::from(ys.to_vec());
    let dataset = LinfaDataset::new(records, targets);

    let model = LinearRegression::new()
        .fit(&dataset)
        .map_err(|e| AnalyticsError::Regression(e.to_string()))?;

    let slope = model.params()[0];
    let intercept = model.intercept();
    if !slope.is_finite() || !intercept.is_finite() {
        return Err(AnalyticsError::Regression(
            "fit produced non-finite coefficients".to_string(),
        ));
    }

    let r_squared = coefficient_of_determination(xs, ys, slope, intercept);
    if !r_squared.is_finite() {
        return Err(AnalyticsError::Regression(
            "fit produced a non-finite R²".to_string(),
        ));
    }
    Ok((slope, intercept, r_squared))
}

fn coefficient_of_determination(xs: &[f64], ys: &[f64], slope: f64, intercept: f64) -> f64 {
    let mean_y = ys.iter().sum::<f64>() / ys.len() as f64;
    let ss_tot: f64 = ys.iter().map(|y| (y - mean_y).powi(2)).sum();
    let ss_res: f64 = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (y - (intercept + slope * x)).powi(2))
        .sum();

    if ss_tot == 0.0 {
        // Constant target: the flat line explains it completely.
        return if ss_res < 1e-12 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

fn insufficient(reason: String) -> AnalyticsError {
    AnalyticsError::InsufficientData {
        operation: "card regression".to_string(),
        reason,
    }
}

/// Pearson correlation between amount and occurrences across records.
///
/// Only rows where both values are present take part. `None` with fewer than
/// two such rows or when either side has zero variance.
pub fn amount_occurrence_correlation<'a, I>(records: I) -> Option<f64>
where
    I: IntoIterator<Item = &'a TransactionRecord>,
{
    let (xs, ys): (Vec<f64>, Vec<f64>) = records
        .into_iter()
        .filter_map(|r| Some((r.total_amount?, r.occurrences? as f64)))
        .unzip();
    pearson_correlation(&xs, &ys)
}

/// Pearson correlation coefficient of two equally long samples.
pub fn pearson_correlation(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    // Zero spread leaves r undefined; an overflowed one would bias it to 0.
    let usable = |v: f64| v > 0.0 && v.is_finite();
    if !usable(var_x) || !usable(var_y) {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt())).filter(|r| r.is_finite())
}
