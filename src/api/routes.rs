//! API route definitions
//!
//! - /api/health - liveness
//! - /api/observations - filtered, paginated observations
//! - /api/stats - per-field summary statistics
//! - /api/outliers - IQR / z-score outlier detection

use axum::{routing::get, Router};

use super::handlers::{self, ApiState};

/// Create all API routes
pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/observations", get(handlers::list_observations))
        .route("/stats", get(handlers::get_stats))
        .route("/outliers", get(handlers::get_outliers))
        .with_state(state)
}
