//! photorestore library interface
//!
//! Exposes the router and application state for integration testing.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod store;

pub use crate::error::{ApiError, ApiResult};

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::services::RestorationPipeline;
use crate::store::Storage;

/// Headroom above the upload cap for multipart framing overhead
const BODY_LIMIT_HEADROOM: usize = 2 * 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Photo job and contact records
    pub store: Arc<dyn Storage>,
    /// Background enhancement workflow
    pub pipeline: Arc<RestorationPipeline>,
    /// Resolved runtime configuration
    pub config: Arc<Config>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(store: Arc<dyn Storage>, pipeline: Arc<RestorationPipeline>, config: Arc<Config>) -> Self {
        Self {
            store,
            pipeline,
            config,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes() + BODY_LIMIT_HEADROOM;

    Router::new()
        .merge(api::photo_routes())
        .merge(api::contact_routes())
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
