//! REST API module using Axum
//!
//! JSON endpoints under `/api` for the water-quality dashboard. Errors use the
//! envelope in [`envelope`]; unmatched paths get an enveloped 404.

pub mod envelope;
pub mod handlers;
mod routes;

pub use handlers::ApiState;

use axum::http::{header, Method, Uri};
use axum::response::Response;
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use envelope::ApiErrorResponse;

async fn not_found(uri: Uri) -> Response {
    ApiErrorResponse::not_found(format!("No route for {}", uri.path()))
}

/// Build the CORS layer for the dashboard.
///
/// An empty origin list allows any origin (read-only GET API). Otherwise only
/// the listed origins are allowed; entries that are not valid header values
/// are skipped.
pub fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if origins.is_empty() {
        return base.allow_origin(Any);
    }

    let allowed: Vec<_> = origins
        .iter()
        .filter_map(|o| o.trim().parse().ok())
        .collect();
    tracing::info!(origins = ?origins, "CORS: allowing configured origins");
    base.allow_origin(allowed)
}

/// Create the complete application router.
pub fn create_app(state: ApiState) -> Router {
    let cors = build_cors_layer(&state.config.server.cors_origins);

    Router::new()
        .nest("/api", routes::api_routes(state))
        .fallback(not_found)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
}
