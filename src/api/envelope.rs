//! Error envelope for all API endpoints.
//!
//! Successful responses carry their payload as-is. Every error is wrapped in
//! [`ApiErrorResponse`]: `{ "error": { "code", "message" }, "meta": { ... } }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, warn};

use crate::error::AnalyticsError;

/// Metadata included in every error response.
#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub timestamp: String,
    pub version: &'static str,
}

impl Default for ResponseMeta {
    fn default() -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Error detail inside [`ApiErrorResponse`].
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub error: ErrorDetail,
    pub meta: ResponseMeta,
}

impl ApiErrorResponse {
    fn build(status: StatusCode, code: &str, msg: impl Into<String>) -> Response {
        let body = Self {
            error: ErrorDetail {
                code: code.to_string(),
                message: msg.into(),
            },
            meta: ResponseMeta::default(),
        };
        (status, axum::Json(body)).into_response()
    }

    pub fn not_found(msg: impl Into<String>) -> Response {
        Self::build(StatusCode::NOT_FOUND, "NOT_FOUND", msg)
    }

    pub fn bad_request(msg: impl Into<String>) -> Response {
        Self::build(StatusCode::BAD_REQUEST, "BAD_REQUEST", msg)
    }

    pub fn not_applicable(msg: impl Into<String>) -> Response {
        Self::build(StatusCode::BAD_REQUEST, "NOT_APPLICABLE", msg)
    }

    pub fn internal(msg: impl Into<String>) -> Response {
        Self::build(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg)
    }
}

impl IntoResponse for AnalyticsError {
    fn into_response(self) -> Response {
        match self {
            AnalyticsError::Validation(msg) => {
                warn!(error = %msg, "Rejected request");
                ApiErrorResponse::bad_request(msg)
            }
            AnalyticsError::EmptyData(msg) => ApiErrorResponse::not_found(msg),
            AnalyticsError::Computation(msg) => ApiErrorResponse::not_applicable(msg),
            AnalyticsError::Store(e) => {
                error!(error = %e, "Store failure");
                ApiErrorResponse::internal(format!("Storage error: {e}"))
            }
        }
    }
}
