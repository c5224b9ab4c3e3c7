//! Route definitions for the QR generation API
//!
//! This module configures all HTTP routes and maps them to their respective
//! handlers, wiring the authentication middleware around the API surface
//! and mounting the artifact directory for downloads.

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::services::ServeDir;

use axum::middleware;

use crate::database::AppState;
use crate::handler::{
    bulk_generate, create_dynamic, dynamic_analytics, generate_static, get_qr_code,
    redirect_scan, update_dynamic,
};
use crate::middleware::api_key_auth;

/// Creates and configures the Axum application router with all routes
///
/// # Route Definitions
///
/// - `POST /api/v1/qr/generate` - Static QR generation
/// - `POST /api/v1/qr/dynamic/create` - Create a dynamic QR code
/// - `PUT /api/v1/qr/dynamic/{shortId}/update` - Repoint a dynamic code
/// - `GET /api/v1/qr/dynamic/{shortId}/analytics` - Scan analytics
/// - `POST /api/v1/qr/bulk/generate` - Bulk generation
/// - `GET /api/v1/qr/{id}` - Fetch one code by short id or hash
/// - `GET /r/{shortId}` - Public redirect (no API key)
/// - `GET /data/...` - Generated artifact downloads (static files)
///
/// Everything under `/api/v1/qr` requires a valid `X-API-Key` header.
pub fn create_app(state: AppState) -> Router {
    let qr_api = Router::new()
        .route("/generate", post(generate_static))
        .route("/dynamic/create", post(create_dynamic))
        .route("/dynamic/{short_id}/update", put(update_dynamic))
        .route("/dynamic/{short_id}/analytics", get(dynamic_analytics))
        .route("/bulk/generate", post(bulk_generate))
        .route("/{id}", get(get_qr_code))
        .layer(middleware::from_fn_with_state(state.clone(), api_key_auth));

    Router::new()
        // Public redirect endpoint - the URL printed inside dynamic codes
        .route("/r/{short_id}", get(redirect_scan))
        // Mount API routes under /api/v1/qr
        .nest("/api/v1/qr", qr_api)
        // Serve generated artifacts for download
        .nest_service("/data", ServeDir::new(state.store.root()))
        // Inject the application state into all handlers
        .with_state(state)
}
