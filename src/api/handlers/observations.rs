//! Observation listing endpoint

use axum::extract::{Query, State};
use axum::Json;
use serde::Serialize;
use tracing::debug;

use super::ApiState;
use crate::error::AnalyticsError;
use crate::query::{RangeQuery, TranslatedQuery};
use crate::store::{Filter, Page};
use crate::types::Observation;

#[derive(Debug, Serialize)]
pub struct ObservationPage {
    /// Matching rows before pagination
    pub count: usize,
    /// Requested page of matching rows
    pub items: Vec<Observation>,
}

impl ObservationPage {
    /// Count and page taken from the same collection.
    pub fn from_snapshot(rows: &[Observation], filter: &Filter, page: Page) -> Self {
        let matching: Vec<&Observation> = rows.iter().filter(|o| filter.matches(o)).collect();
        Self {
            count: matching.len(),
            items: page.slice(&matching).iter().map(|o| (*o).clone()).collect(),
        }
    }
}

/// GET /api/observations?start=&end=&min_temp=&max_temp=&min_sal=&max_sal=&min_odo=&max_odo=&limit=&skip=
pub async fn list_observations(
    State(state): State<ApiState>,
    Query(q): Query<RangeQuery>,
) -> Result<Json<ObservationPage>, AnalyticsError> {
    let TranslatedQuery { filter, page } = q.translate()?;

    let rows = state.store.snapshot()?;
    let body = ObservationPage::from_snapshot(&rows, &filter, page);

    debug!(
        count = body.count,
        returned = body.items.len(),
        skip = page.skip,
        limit = page.limit,
        "observations"
    );
    Ok(Json(body))
}
