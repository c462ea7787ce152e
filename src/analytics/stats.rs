//! Descriptive statistics per sensor field
//!
//! Each field is summarized independently over its non-null values: a field
//! with no values reports `{count: 0}` and nothing else, otherwise the full
//! block of count, mean, min, max and the 25/50/75th percentiles.

use rayon::prelude::*;
use serde::Serialize;
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

use crate::error::{AnalyticsError, Result};
use crate::types::{Column, Measurement, Observation};

// ============================================================================
// Shared numeric helpers
// ============================================================================

/// Non-null values of `column`, in row order.
pub fn non_null_values(rows: &[Observation], column: Column) -> Vec<f64> {
    rows.iter().filter_map(|o| o.value(column)).collect()
}

/// Percentile of an ascending, non-empty slice by linear interpolation at
/// virtual index `p * (n - 1)`.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    debug_assert!((0.0..=1.0).contains(&p));

    if sorted.len() == 1 {
        return sorted[0];
    }
    let pos = p * (sorted.len() - 1) as f64;
    let idx = pos.floor() as usize;
    let frac = pos - idx as f64;
    let lo = sorted[idx];
    let hi = sorted[(idx + 1).min(sorted.len() - 1)];
    // Finite for any finite pair. Rounding may not leave [lo, hi].
    (lo * (1.0 - frac) + hi * frac).clamp(lo, hi)
}

/// Largest magnitude in `values`, used to rescale sums that would overflow.
fn magnitude(values: &[f64]) -> f64 {
    values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()))
}

/// Arithmetic mean of a non-empty slice of finite values.
pub fn mean(values: &[f64]) -> f64 {
    let direct = values.iter().mean();
    if direct.is_finite() {
        return direct;
    }
    let scale = magnitude(values);
    values.iter().map(|v| v / scale).mean() * scale
}

/// Population standard deviation (divisor `n`) of a non-empty slice.
fn population_std(values: &[f64]) -> f64 {
    let direct = values.iter().population_std_dev();
    if direct.is_finite() {
        return direct;
    }
    let scale = magnitude(values);
    values.iter().map(|v| v / scale).population_std_dev() * scale
}

/// Sort ascending. Inputs are finite by construction.
pub fn sort_ascending(mut values: Vec<f64>) -> Vec<f64> {
    values.sort_by(|a, b| a.total_cmp(b));
    values
}

/// Population mean and standard deviation (divisor `n`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Moments {
    pub mean: f64,
    pub std: f64,
}

impl Moments {
    /// `None` for an empty population.
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mean = mean(values);
        // A constant population has exactly zero spread; the streaming
        // variance can leave a rounding residue there.
        let constant = values.iter().all(|v| *v == values[0]);
        let std = if constant { 0.0 } else { population_std(values) };
        Some(Self { mean, std })
    }

    /// Whether z-scores are defined for this population.
    pub fn has_spread(&self) -> bool {
        self.std.is_finite() && self.std > 0.0
    }

    /// Signed z-score, or `None` when the value is absent or the spread is
    /// zero/undefined. Callers treat `None` as failing every comparison.
    pub fn z_score(&self, value: Option<f64>) -> Option<f64> {
        let v = value?;
        if !self.has_spread() {
            return None;
        }
        Some((v - self.mean) / self.std)
    }
}

// ============================================================================
// Field summaries
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSummary {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
}

/// Statistics block for one field: all-or-nothing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldStats {
    Empty { count: usize },
    Summary(FieldSummary),
}

impl FieldStats {
    pub fn compute(values: Vec<f64>) -> Self {
        if values.is_empty() {
            return FieldStats::Empty { count: 0 };
        }
        let sorted = sort_ascending(values);
        let n = sorted.len();
        FieldStats::Summary(FieldSummary {
            count: n,
            mean: mean(&sorted),
            min: sorted[0],
            max: sorted[n - 1],
            p25: percentile(&sorted, 0.25),
            p50: percentile(&sorted, 0.50),
            p75: percentile(&sorted, 0.75),
        })
    }

    pub fn count(&self) -> usize {
        match self {
            FieldStats::Empty { count } => *count,
            FieldStats::Summary(s) => s.count,
        }
    }
}

/// Per-field statistics keyed by field name.
pub type SummaryReport = BTreeMap<Measurement, FieldStats>;

/// Summarize every supported field over `rows`.
///
/// An empty population is an error ("no data available"); a field whose
/// values are all absent is not, and reports `{count: 0}`.
pub fn summarize(rows: &[Observation]) -> Result<SummaryReport> {
    if rows.is_empty() {
        return Err(AnalyticsError::EmptyData("No data available".to_string()));
    }

    Ok(Measurement::ALL[..]
        .par_iter()
        .map(|m| (*m, FieldStats::compute(non_null_values(rows, m.column()))))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};

    fn rows_with_temps(temps: &[Option<f64>]) -> Vec<Observation> {
        let base = NaiveDate::from_ymd_opt(2021, 12, 16)
            .and_then(|d| d.and_hms_opt(9, 0, 0))
            .unwrap();
        temps
            .iter()
            .enumerate()
            .map(|(i, t)| Observation {
                timestamp: base + Duration::seconds(i as i64),
                latitude: 25.9,
                longitude: -80.1,
                temperature_c: *t,
                salinity_ppt: Some(35.0 + i as f64 * 0.1),
                odo_mg_l: None,
            })
            .collect()
    }

    fn summary(stats: &FieldStats) -> &FieldSummary {
        match stats {
            FieldStats::Summary(s) => s,
            FieldStats::Empty { .. } => panic!("expected a summary block"),
        }
    }

    #[test]
    fn test_percentile_linear_interpolation() {
        let s = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(percentile(&s, 0.0), 1.0);
        assert_relative_eq!(percentile(&s, 0.25), 1.75);
        assert_relative_eq!(percentile(&s, 0.5), 2.5);
        assert_relative_eq!(percentile(&s, 0.75), 3.25);
        assert_relative_eq!(percentile(&s, 1.0), 4.0);
        assert_relative_eq!(percentile(&[7.0], 0.25), 7.0);
    }

    #[test]
    fn test_reference_scenario() {
        let rows = rows_with_temps(&[Some(10.0), Some(12.0), Some(11.0), Some(13.0), Some(100.0)]);
        let report = summarize(&rows).unwrap();
        let t = summary(&report[&Measurement::TemperatureC]);

        assert_eq!(t.count, 5);
        assert_relative_eq!(t.mean, 29.2, epsilon = 1e-9);
        assert_relative_eq!(t.min, 10.0);
        assert_relative_eq!(t.max, 100.0);
        assert_relative_eq!(t.p25, 11.0);
        assert_relative_eq!(t.p50, 12.0);
        assert_relative_eq!(t.p75, 13.0);
    }

    #[test]
    fn test_count_ignores_nulls_of_this_field_only() {
        let rows = rows_with_temps(&[Some(10.0), None, Some(14.0), None]);
        let report = summarize(&rows).unwrap();

        assert_eq!(report[&Measurement::TemperatureC].count(), 2);
        assert_eq!(report[&Measurement::SalinityPpt].count(), 4);
        assert_relative_eq!(summary(&report[&Measurement::TemperatureC]).mean, 12.0);
    }

    #[test]
    fn test_all_null_field_reports_bare_count() {
        let rows = rows_with_temps(&[Some(10.0), Some(11.0)]);
        let report = summarize(&rows).unwrap();

        let odo = &report[&Measurement::OdoMgL];
        assert_eq!(odo, &FieldStats::Empty { count: 0 });
        let json = serde_json::to_value(odo).unwrap();
        assert_eq!(json, serde_json::json!({"count": 0}));
    }

    #[test]
    fn test_empty_dataset_is_empty_data_error() {
        assert!(matches!(summarize(&[]), Err(AnalyticsError::EmptyData(_))));
    }

    #[test]
    fn test_order_statistics_are_monotone() {
        let temps: Vec<Option<f64>> = [3.2, -1.0, 8.8, 8.8, 0.5, 12.25, 4.0, 4.0, 7.5]
            .into_iter()
            .map(Some)
            .collect();
        let report = summarize(&rows_with_temps(&temps)).unwrap();
        let t = summary(&report[&Measurement::TemperatureC]);
        assert!(t.min <= t.p25 && t.p25 <= t.p50 && t.p50 <= t.p75 && t.p75 <= t.max);
    }

    #[test]
    fn test_report_serializes_with_field_names() {
        let rows = rows_with_temps(&[Some(10.0)]);
        let json = serde_json::to_value(summarize(&rows).unwrap()).unwrap();
        assert!(json.get("temperature_c").is_some());
        assert!(json.get("salinity_ppt").is_some());
        assert_eq!(json["odo_mg_l"], serde_json::json!({"count": 0}));
        assert_eq!(json["temperature_c"]["p50"], 10.0);
    }

    #[test]
    fn test_extreme_finite_values_stay_finite() {
        let rows = rows_with_temps(&[Some(-1.7e308), Some(1.7e308)]);
        let report = summarize(&rows).unwrap();
        let t = summary(&report[&Measurement::TemperatureC]);

        assert_eq!(t.mean, 0.0);
        assert_relative_eq!(t.p25, -0.85e308, max_relative = 1e-12);
        assert_eq!(t.p50, 0.0);
        assert_relative_eq!(t.p75, 0.85e308, max_relative = 1e-12);
        assert!(t.min <= t.p25 && t.p25 <= t.p50 && t.p50 <= t.p75 && t.p75 <= t.max);

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["temperature_c"]["mean"].is_number());
        assert!(json["temperature_c"]["p25"].is_number());
    }

    #[test]
    fn test_extreme_values_have_finite_moments() {
        let m = Moments::of(&[-1.7e308, 1.7e308]).unwrap();
        assert_eq!(m.mean, 0.0);
        assert_relative_eq!(m.std, 1.7e308, max_relative = 1e-12);
        assert!(m.has_spread());
    }

    #[test]
    fn test_interpolation_never_leaves_neighbour_range() {
        let s = [0.1, 0.1, 0.1];
        for p in [0.1, 0.25, 0.33, 0.5, 0.75, 0.9] {
            assert_eq!(percentile(&s, p), 0.1);
        }
    }

    #[test]
    fn test_moments_population_formula() {
        let m = Moments::of(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_relative_eq!(m.mean, 5.0, epsilon = 1e-12);
        assert_relative_eq!(m.std, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_constant_population_has_no_spread() {
        let m = Moments::of(&[0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1]).unwrap();
        assert_eq!(m.std, 0.0);
        assert!(!m.has_spread());
        assert_eq!(m.z_score(Some(0.1)), None);
    }

    #[test]
    fn test_z_score_of_absent_value_is_none() {
        let m = Moments::of(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(m.z_score(None), None);
        assert!(m.z_score(Some(3.0)).unwrap() > 0.0);
    }
}
