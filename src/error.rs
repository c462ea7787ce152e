//! Error taxonomy for analytic requests
//!
//! Each variant is terminal for the request that raised it. Nothing here is
//! retried: there is no transient failure domain inside the core.

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Malformed caller input (pagination, unknown field or method).
    #[error("{0}")]
    Validation(String),

    /// Nothing to compute: empty dataset, or every value of the field is absent.
    #[error("{0}")]
    EmptyData(String),

    /// The numeric method is undefined for this data (e.g. zero variance).
    #[error("{0}")]
    Computation(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
