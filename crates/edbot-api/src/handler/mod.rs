//! HTTP handlers
//!
//! Health, metrics and flag administration endpoints. Handlers are thin:
//! they call the core components held in [`AppState`] and translate results
//! into status codes.

mod flags;
mod health;

pub use flags::{FlagDetail, FlagListResponse, SetFlagRequest, SetFlagResponse};
pub use health::{HistoryQuery, TrendsQuery};

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};
use edbot_core::{FeatureFlagManager, HealthMonitor, MetricsRegistry};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;

/// Application state
pub struct AppState {
    pub flags: Arc<FeatureFlagManager>,
    pub monitor: Arc<HealthMonitor>,
    pub metrics: Arc<MetricsRegistry>,
}

impl AppState {
    pub fn new(
        flags: Arc<FeatureFlagManager>,
        monitor: Arc<HealthMonitor>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            flags,
            monitor,
            metrics,
        }
    }
}

/// Create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(health::comprehensive))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/health/last", get(health::last))
        .route("/health/history", get(health::history))
        .route("/health/trends", get(health::trends))
        .route("/health/components/:component", get(health::component))
        .route("/metrics", get(render_metrics))
        // Flag administration
        .route(
            "/api/v1/admin/flags",
            get(flags::list_flags).delete(flags::clear_overrides),
        )
        .route("/api/v1/admin/flags/validate", get(flags::validate_flags))
        .route(
            "/api/v1/admin/flags/:name",
            get(flags::get_flag)
                .put(flags::set_flag)
                .delete(flags::delete_flag),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Prometheus text exposition
async fn render_metrics(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let body = state.metrics.render()?;
    Ok(([(header::CONTENT_TYPE, state.metrics.content_type())], body))
}
