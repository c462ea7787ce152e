//! API route handlers
//!
//! - Liveness
//! - Observation listing with range filters and pagination
//! - Summary statistics and on-demand outlier detection
//!
//! Handlers never cache: every request reads the store as it is at call time.

mod analytics;
mod observations;

pub use analytics::*;
pub use observations::*;

use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::store::ObservationStore;

// ============================================================================
// API State
// ============================================================================

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Observation collection
    pub store: Arc<dyn ObservationStore>,
    /// Loaded configuration (outlier defaults)
    pub config: Arc<AppConfig>,
}

impl ApiState {
    pub fn new(store: Arc<dyn ObservationStore>, config: Arc<AppConfig>) -> Self {
        Self { store, config }
    }
}

// ============================================================================
// Health Endpoint
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// GET /api/health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
