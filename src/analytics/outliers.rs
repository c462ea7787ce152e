//! On-demand outlier detection
//!
//! Two independent methods over one sensor field:
//!
//! - **IQR**: fences at `Q1 - k*IQR` and `Q3 + k*IQR`; a value is flagged
//!   when it lies strictly outside them.
//! - **Z-score**: population mean/std; a value is flagged when `|z| > z`.
//!   Undefined for a population with zero spread.
//!
//! Thresholds are always computed over the whole non-null population of the
//! field. Pagination only slices the list of flagged rows. Rows whose value
//! is absent are never flagged.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use super::stats::{non_null_values, percentile, sort_ascending, Moments};
use crate::error::{AnalyticsError, Result};
use crate::store::Page;
use crate::types::{Measurement, Observation};

/// Default IQR fence multiplier.
pub const DEFAULT_K: f64 = 1.5;

/// Default z-score threshold.
pub const DEFAULT_Z: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlierMethod {
    #[default]
    Iqr,
    Zscore,
}

impl fmt::Display for OutlierMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutlierMethod::Iqr => write!(f, "iqr"),
            OutlierMethod::Zscore => write!(f, "zscore"),
        }
    }
}

impl FromStr for OutlierMethod {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "iqr" => Ok(OutlierMethod::Iqr),
            "zscore" => Ok(OutlierMethod::Zscore),
            _ => Err(AnalyticsError::Validation(
                "method must be 'iqr' or 'zscore'".to_string(),
            )),
        }
    }
}

/// One detection request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierRequest {
    pub field: Measurement,
    pub method: OutlierMethod,
    /// IQR fence multiplier.
    pub k: f64,
    /// Absolute z-score a value must exceed to be flagged.
    pub z_threshold: f64,
}

impl OutlierRequest {
    pub fn new(field: Measurement, method: OutlierMethod) -> Self {
        Self {
            field,
            method,
            k: DEFAULT_K,
            z_threshold: DEFAULT_Z,
        }
    }

    pub fn with_k(mut self, k: f64) -> Self {
        self.k = k;
        self
    }

    pub fn with_z_threshold(mut self, z: f64) -> Self {
        self.z_threshold = z;
        self
    }
}

/// Bounds actually used for flagging.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Thresholds {
    Iqr { lower: f64, upper: f64 },
    ZScore { z: f64, mean: f64, std: f64 },
}

#[derive(Debug, Clone, Serialize)]
pub struct OutlierReport {
    pub field: Measurement,
    pub method: OutlierMethod,
    pub thresholds: Thresholds,
    /// Total flagged rows, before pagination.
    pub count: usize,
    /// Requested page of flagged rows.
    pub items: Vec<Observation>,
}

/// Flag outliers of `request.field` across `rows` and return one page of them.
pub fn detect(rows: &[Observation], request: &OutlierRequest, page: Page) -> Result<OutlierReport> {
    if rows.is_empty() {
        return Err(AnalyticsError::EmptyData(
            "No data available for the requested field".to_string(),
        ));
    }

    let column = request.field.column();
    let values = non_null_values(rows, column);
    if values.is_empty() {
        return Err(AnalyticsError::EmptyData(
            "No numeric values present for the field".to_string(),
        ));
    }

    let thresholds = match request.method {
        OutlierMethod::Iqr => iqr_fences(values, request.k),
        OutlierMethod::Zscore => zscore_bounds(&values, request.z_threshold)?,
    };

    let flagged: Vec<&Observation> = rows
        .iter()
        .filter(|o| is_flagged(&thresholds, o.value(column)))
        .collect();

    debug!(
        field = %request.field,
        method = %request.method,
        flagged = flagged.len(),
        population = rows.len(),
        "outlier detection"
    );

    Ok(OutlierReport {
        field: request.field,
        method: request.method,
        thresholds,
        count: flagged.len(),
        items: page.slice(&flagged).iter().map(|o| (*o).clone()).collect(),
    })
}

fn iqr_fences(values: Vec<f64>, k: f64) -> Thresholds {
    let sorted = sort_ascending(values);
    let q1 = percentile(&sorted, 0.25);
    let q3 = percentile(&sorted, 0.75);
    let iqr = q3 - q1;
    Thresholds::Iqr {
        lower: q1 - k * iqr,
        upper: q3 + k * iqr,
    }
}

fn zscore_bounds(values: &[f64], z: f64) -> Result<Thresholds> {
    let moments = Moments::of(values).ok_or_else(|| {
        AnalyticsError::EmptyData("No numeric values present for the field".to_string())
    })?;
    if !moments.has_spread() {
        return Err(AnalyticsError::Computation(
            "Std deviation is zero or NaN; z-score method not applicable".to_string(),
        ));
    }
    Ok(Thresholds::ZScore {
        z,
        mean: moments.mean,
        std: moments.std,
    })
}

/// Flagging rule. An absent value is never flagged.
fn is_flagged(thresholds: &Thresholds, value: Option<f64>) -> bool {
    let Some(v) = value else {
        return false;
    };
    match *thresholds {
        Thresholds::Iqr { lower, upper } => v < lower || v > upper,
        Thresholds::ZScore { z, mean, std } => {
            let moments = Moments { mean, std };
            moments.z_score(Some(v)).is_some_and(|score| score.abs() > z)
        }
    }
}
