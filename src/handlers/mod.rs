//! HTTP handlers
//!
//! The router is assembled here and handed to `main`; handlers are thin
//! adapters over `services` and `db::queries`.

pub mod import;
pub mod ping;
pub mod property;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub max_concurrent_writes: usize,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(pool: PgPool, config: &Config) -> Self {
        Self {
            pool,
            max_concurrent_writes: config.max_concurrent_writes,
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

/// Build the application router.
///
/// Static routes (`search`, `distinct`) must be registered alongside the
/// `:id` capture; the router gives them priority.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;
    Router::new()
        .route("/api/ping", get(ping::ping))
        .route("/api/import/ck-properties", post(import::import_properties))
        .route(
            "/api/import/ck-property-managements",
            post(import::import_property_managements),
        )
        .route("/api/import/ck-rooms", post(import::import_rooms))
        .route("/api/property/search", get(property::search))
        .route("/api/property/distinct", get(property::distinct))
        .route(
            "/api/property/:id",
            get(property::get_property).put(property::put_property),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
