//! Observation store contract
//!
//! The analytics core depends only on [`ObservationStore`]: bulk insert,
//! range-filtered find with skip/limit, count and delete. Any document or
//! tabular backend can satisfy it; [`InMemoryCollection`] is the one shipped.
//!
//! ## Filter semantics
//!
//! - Every bound is inclusive (`>=` / `<=`)
//! - Constraints on different fields are ANDed
//! - A constraint tested against an absent value never matches

mod memory;

pub use memory::InMemoryCollection;

use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::types::{Column, Observation};

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store write lock poisoned")]
    Poisoned,

    #[error("Store backend error: {0}")]
    Backend(String),
}

// ============================================================================
// Filters
// ============================================================================

/// Inclusive range on one field. Either side may be open.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds<T> {
    pub gte: Option<T>,
    pub lte: Option<T>,
}

impl<T: PartialOrd + Copy> Bounds<T> {
    /// Build a range from optional bounds; `None` when both sides are open.
    pub fn between(gte: Option<T>, lte: Option<T>) -> Option<Self> {
        if gte.is_none() && lte.is_none() {
            None
        } else {
            Some(Self { gte, lte })
        }
    }

    /// Test a value against the range. An absent value never matches.
    pub fn matches(&self, value: Option<T>) -> bool {
        let Some(v) = value else {
            return false;
        };
        self.gte.map_or(true, |lo| v >= lo) && self.lte.map_or(true, |hi| v <= hi)
    }
}

/// Conjunction of per-field ranges. The default filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub timestamp: Option<Bounds<NaiveDateTime>>,
    pub columns: BTreeMap<Column, Bounds<f64>>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_unconstrained(&self) -> bool {
        self.timestamp.is_none() && self.columns.is_empty()
    }

    pub fn with_timestamp(mut self, bounds: Bounds<NaiveDateTime>) -> Self {
        self.timestamp = Some(bounds);
        self
    }

    pub fn with_range(mut self, column: Column, bounds: Bounds<f64>) -> Self {
        self.columns.insert(column, bounds);
        self
    }

    pub fn matches(&self, obs: &Observation) -> bool {
        if let Some(ts) = &self.timestamp {
            if !ts.matches(Some(obs.timestamp)) {
                return false;
            }
        }
        self.columns
            .iter()
            .all(|(column, bounds)| bounds.matches(obs.value(*column)))
    }
}

/// Sanitized pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: usize,
    pub limit: usize,
}

impl Page {
    /// Slice an already-materialized result list.
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = self.skip.min(items.len());
        let end = start.saturating_add(self.limit).min(items.len());
        &items[start..end]
    }
}

// ============================================================================
// Store Contract
// ============================================================================

pub trait ObservationStore: Send + Sync {
    /// Bulk append. No deduplication. Returns the number of rows inserted.
    fn insert_many(&self, rows: Vec<Observation>) -> Result<usize, StoreError>;

    /// Matching rows in insertion order, windowed by `page` when given.
    fn find(&self, filter: &Filter, page: Option<Page>) -> Result<Vec<Observation>, StoreError>;

    /// Count matching rows without materializing them.
    fn count_documents(&self, filter: &Filter) -> Result<usize, StoreError>;

    /// Remove matching rows. Returns the number removed.
    fn delete_many(&self, filter: &Filter) -> Result<usize, StoreError>;

    /// Whole collection as one consistent snapshot.
    fn snapshot(&self) -> Result<Arc<Vec<Observation>>, StoreError> {
        Ok(Arc::new(self.find(&Filter::all(), None)?))
    }

    /// Delete everything and bulk insert `rows`.
    ///
    /// The default is two separate calls; backends that can swap the whole
    /// collection at once should override it so readers never see a half-refreshed state.
    fn replace_all(&self, rows: Vec<Observation>) -> Result<usize, StoreError> {
        self.delete_many(&Filter::all())?;
        self.insert_many(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn obs(temp: Option<f64>) -> Observation {
        Observation {
            timestamp: NaiveDate::from_ymd_opt(2021, 12, 16)
                .and_then(|d| d.and_hms_opt(10, 0, 0))
                .unwrap(),
            latitude: 25.0,
            longitude: -80.0,
            temperature_c: temp,
            salinity_ppt: Some(35.0),
            odo_mg_l: None,
        }
    }

    #[test]
    fn test_bounds_inclusive() {
        let b = Bounds::between(Some(10.0), Some(20.0)).unwrap();
        assert!(b.matches(Some(10.0)));
        assert!(b.matches(Some(20.0)));
        assert!(!b.matches(Some(9.999)));
        assert!(!b.matches(Some(20.001)));
    }

    #[test]
    fn test_bounds_one_sided() {
        let lower = Bounds::between(Some(5.0), None).unwrap();
        assert!(lower.matches(Some(1e9)));
        assert!(!lower.matches(Some(4.0)));

        let upper = Bounds::between(None, Some(5.0)).unwrap();
        assert!(upper.matches(Some(-1e9)));
        assert!(!upper.matches(Some(6.0)));
    }

    #[test]
    fn test_bounds_both_open_is_none() {
        assert!(Bounds::<f64>::between(None, None).is_none());
    }

    #[test]
    fn test_absent_value_never_matches() {
        let b = Bounds::between(None, Some(f64::MAX)).unwrap();
        assert!(!b.matches(None));

        let filter = Filter::all().with_range(Column::TemperatureC, b);
        assert!(!filter.matches(&obs(None)));
        assert!(filter.matches(&obs(Some(12.0))));
    }

    #[test]
    fn test_filter_is_conjunctive() {
        let filter = Filter::all()
            .with_range(Column::TemperatureC, Bounds::between(Some(10.0), None).unwrap())
            .with_range(Column::SalinityPpt, Bounds::between(None, Some(30.0)).unwrap());
        // temperature passes, salinity (35.0) fails
        assert!(!filter.matches(&obs(Some(12.0))));
    }

    #[test]
    fn test_unconstrained_filter_matches_everything() {
        let filter = Filter::all();
        assert!(filter.is_unconstrained());
        assert!(filter.matches(&obs(None)));
    }

    #[test]
    fn test_page_slice_clamps() {
        let items = [1, 2, 3, 4, 5];
        assert_eq!(Page { skip: 1, limit: 2 }.slice(&items), &[2, 3]);
        assert_eq!(Page { skip: 4, limit: 10 }.slice(&items), &[5]);
        assert!(Page { skip: 9, limit: 10 }.slice(&items).is_empty());
        assert_eq!(Page { skip: 0, limit: usize::MAX }.slice(&items).len(), 5);
    }
}
