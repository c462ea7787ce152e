//! Range query translation
//!
//! Turns optional caller bounds (`start`, `end`, `min_temp`, `max_sal`, ...)
//! into a conjunctive [`Filter`] plus a sanitized [`Page`]. Pure; no store
//! access.
//!
//! Pagination is strict: `limit` and `skip` must be integers. Bounds are
//! lenient: an unparsable instant or number is treated as not supplied.

use serde::Deserialize;

use crate::error::{AnalyticsError, Result};
use crate::store::{Bounds, Filter, Page};
use crate::types::{parse_instant, parse_number, Column};

/// Page size used when `limit` is not supplied.
pub const DEFAULT_LIMIT: i64 = 100;

/// Largest page a caller may request.
pub const MAX_LIMIT: i64 = 1000;

/// Raw query parameters, exactly as received.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RangeQuery {
    pub start: Option<String>,
    pub end: Option<String>,
    pub min_temp: Option<String>,
    pub max_temp: Option<String>,
    pub min_sal: Option<String>,
    pub max_sal: Option<String>,
    pub min_odo: Option<String>,
    pub max_odo: Option<String>,
    pub limit: Option<String>,
    pub skip: Option<String>,
}

/// Output of [`RangeQuery::translate`].
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedQuery {
    pub filter: Filter,
    pub page: Page,
}

impl RangeQuery {
    pub fn translate(&self) -> Result<TranslatedQuery> {
        let page = parse_pagination(self.limit.as_deref(), self.skip.as_deref())?;

        let mut filter = Filter::all();

        let start = self.start.as_deref().and_then(parse_instant);
        let end = self.end.as_deref().and_then(parse_instant);
        if let Some(bounds) = Bounds::between(start, end) {
            filter = filter.with_timestamp(bounds);
        }

        let ranges = [
            (Column::TemperatureC, &self.min_temp, &self.max_temp),
            (Column::SalinityPpt, &self.min_sal, &self.max_sal),
            (Column::OdoMgL, &self.min_odo, &self.max_odo),
        ];
        for (column, min, max) in ranges {
            let lo = min.as_deref().and_then(parse_number);
            let hi = max.as_deref().and_then(parse_number);
            if let Some(bounds) = Bounds::between(lo, hi) {
                filter = filter.with_range(column, bounds);
            }
        }

        Ok(TranslatedQuery { filter, page })
    }
}

/// Validate and clamp pagination parameters.
///
/// `limit` defaults to 100 and is clamped to `[1, 1000]`; `skip` defaults to 0
/// and is clamped to `>= 0`. Anything that is not an integer is rejected.
pub fn parse_pagination(limit: Option<&str>, skip: Option<&str>) -> Result<Page> {
    let limit = parse_integer(limit)?.unwrap_or(DEFAULT_LIMIT);
    let skip = parse_integer(skip)?.unwrap_or(0);

    Ok(Page {
        limit: limit.clamp(1, MAX_LIMIT) as usize,
        skip: usize::try_from(skip.max(0)).unwrap_or(usize::MAX),
    })
}

fn parse_integer(raw: Option<&str>) -> Result<Option<i64>> {
    match raw {
        None => Ok(None),
        Some(s) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| AnalyticsError::Validation("limit and skip must be integers".to_string())),
    }
}
