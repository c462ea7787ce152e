//! aquastat: Water-Quality Telemetry Analytics
//!
//! Ingests raw water-quality sensor exports, normalizes them to a canonical
//! schema, removes statistical outliers, and serves range queries, summary
//! statistics and on-demand outlier detection over HTTP.
//!
//! ## Architecture
//!
//! - **Ingest**: CSV reading, schema normalization, z-score cleaning, seeding
//! - **Store**: observation collection contract plus the in-memory backend
//! - **Query**: request bounds to a conjunctive filter with pagination
//! - **Analytics**: per-field statistics and IQR / z-score outlier detection
//! - **API**: axum router exposing the above under `/api`

pub mod analytics;
pub mod api;
pub mod config;
pub mod error;
pub mod ingest;
pub mod query;
pub mod store;
pub mod types;

// Re-export configuration
pub use config::AppConfig;

// Re-export commonly used types
pub use error::AnalyticsError;
pub use types::{Column, Measurement, Observation};

// Re-export store
pub use store::{Filter, InMemoryCollection, ObservationStore, Page, StoreError};

// Re-export analytics
pub use analytics::{detect, summarize, OutlierMethod, OutlierReport, OutlierRequest};

// Re-export API entry points
pub use api::{create_app, ApiState};
