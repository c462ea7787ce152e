//! Statistics and outlier endpoints

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use super::ApiState;
use crate::analytics::{
    detect, summarize, OutlierMethod, OutlierReport, OutlierRequest, SummaryReport,
};
use crate::error::AnalyticsError;
use crate::query::parse_pagination;
use crate::store::Page;
use crate::types::{parse_number, Measurement};

// ============================================================================
// Statistics
// ============================================================================

/// GET /api/stats
pub async fn get_stats(
    State(state): State<ApiState>,
) -> Result<Json<SummaryReport>, AnalyticsError> {
    let rows = state.store.snapshot()?;
    Ok(Json(summarize(&rows)?))
}

// ============================================================================
// Outliers
// ============================================================================

/// Raw `/api/outliers` parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutlierQuery {
    pub field: Option<String>,
    pub method: Option<String>,
    pub k: Option<String>,
    pub z: Option<String>,
    pub limit: Option<String>,
    pub skip: Option<String>,
}

impl OutlierQuery {
    /// Validate field, method and pagination. `k`/`z` that are missing or not
    /// numbers fall back to `default_k`/`default_z`; an explicit 0 is kept.
    pub fn to_request(
        &self,
        default_k: f64,
        default_z: f64,
    ) -> Result<(OutlierRequest, Page), AnalyticsError> {
        let field: Measurement = self.field.as_deref().unwrap_or("").trim().parse()?;

        let method = match self.method.as_deref().map(str::trim) {
            None | Some("") => OutlierMethod::default(),
            Some(m) => m.parse()?,
        };

        let page = parse_pagination(self.limit.as_deref(), self.skip.as_deref())?;

        let k = self.k.as_deref().and_then(parse_number).unwrap_or(default_k);
        let z = self.z.as_deref().and_then(parse_number).unwrap_or(default_z);

        let request = OutlierRequest::new(field, method)
            .with_k(k)
            .with_z_threshold(z);
        Ok((request, page))
    }
}

/// GET /api/outliers?field=&method=iqr|zscore&k=&z=&limit=&skip=
pub async fn get_outliers(
    State(state): State<ApiState>,
    Query(q): Query<OutlierQuery>,
) -> Result<Json<OutlierReport>, AnalyticsError> {
    let defaults = &state.config.outliers;
    let (request, page) = q.to_request(defaults.default_k, defaults.default_z)?;

    let rows = state.store.snapshot()?;
    Ok(Json(detect(&rows, &request, page)?))
}
