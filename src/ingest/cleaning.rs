//! Cleaning Filter - multivariate z-score row rejection
//!
//! For every numeric column the source carried, population mean and standard
//! deviation are computed over that column's non-null values. A row survives
//! only if every one of those columns yields a defined z-score within the
//! threshold. An absent value, or a column with zero/undefined spread, leaves
//! the z-score undefined and fails the row.
//!
//! Applied once at ingest, never per query.

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use super::normalizer::ObservationTable;
use crate::analytics::stats::{non_null_values, Moments};
use crate::types::{Column, Observation};

/// Default rejection threshold in standard deviations.
pub const DEFAULT_Z_THRESHOLD: f64 = 3.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleaningStats {
    pub total_rows: usize,
    pub removed_outliers: usize,
    pub remaining_rows: usize,
}

fn within(moments: Option<Moments>, value: Option<f64>, z_threshold: f64) -> bool {
    moments
        .and_then(|m| m.z_score(value))
        .is_some_and(|z| z.abs() <= z_threshold)
}

/// Drop every row with a value more than `z_threshold` standard deviations
/// from its column mean.
pub fn clean_zscore(
    table: ObservationTable,
    z_threshold: f64,
) -> (ObservationTable, CleaningStats) {
    let total_rows = table.rows.len();
    if total_rows == 0 {
        return (table, CleaningStats::default());
    }

    let moments: Vec<(Column, Option<Moments>)> = table
        .columns
        .par_iter()
        .map(|c| (*c, Moments::of(&non_null_values(&table.rows, *c))))
        .collect();

    for (column, m) in &moments {
        match m {
            Some(m) if !m.has_spread() => {
                warn!(
                    column = %column,
                    mean = m.mean,
                    "Column has zero spread; every row will be rejected"
                );
            }
            None => {
                warn!(column = %column, "Column has no values; every row will be rejected");
            }
            _ => {}
        }
    }

    let keep = |o: &Observation| {
        moments
            .iter()
            .all(|(column, m)| within(*m, o.value(*column), z_threshold))
    };

    let ObservationTable { columns, rows } = table;
    let rows: Vec<Observation> = rows.into_iter().filter(|o| keep(o)).collect();

    let stats = CleaningStats {
        total_rows,
        removed_outliers: total_rows - rows.len(),
        remaining_rows: rows.len(),
    };
    info!(
        total = stats.total_rows,
        removed = stats.removed_outliers,
        remaining = stats.remaining_rows,
        z_threshold,
        "Z-score cleaning complete"
    );

    (ObservationTable { columns, rows }, stats)
}
