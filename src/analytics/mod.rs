//! Read-side analytics over the observation store
//!
//! ## Architecture
//! - `stats`: per-field descriptive statistics (count, mean, min, max, p25/p50/p75)
//! - `outliers`: IQR and z-score outlier flagging with paginated results
//!
//! Both are pure functions of a materialized slice of observations. Callers
//! take one store snapshot per request and pass it in, so every field of a
//! response is computed over the same data.

pub mod outliers;
pub mod stats;

pub use outliers::{detect, OutlierMethod, OutlierReport, OutlierRequest, Thresholds};
pub use stats::{summarize, FieldStats, FieldSummary, Moments, SummaryReport};
