//! Health endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use edbot_core::{ComponentType, HealthStatus};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use super::AppState;
use crate::error::ApiError;

const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Query parameters for `/health/history`
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// Query parameters for `/health/trends`
#[derive(Debug, Default, Deserialize)]
pub struct TrendsQuery {
    pub window_minutes: Option<u64>,
}

fn status_code_for(status: HealthStatus) -> StatusCode {
    if status == HealthStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

pub(super) async fn comprehensive(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.monitor.perform_comprehensive_health_check().await;
    (status_code_for(health.status), Json(health))
}

pub(super) async fn liveness(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.monitor.check_liveness())
}

pub(super) async fn readiness(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.monitor.check_readiness().await;
    let status = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(readiness))
}

pub(super) async fn last(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    state
        .monitor
        .get_last_health_check()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No health check has completed yet".to_string()))
}

pub(super) async fn history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    let capacity = state.monitor.settings().history_capacity;
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).min(capacity);
    let snapshots = state.monitor.get_health_history(limit);

    Json(serde_json::json!({
        "count": snapshots.len(),
        "snapshots": snapshots,
    }))
}

pub(super) async fn trends(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TrendsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let window_minutes = query
        .window_minutes
        .unwrap_or(state.monitor.settings().trend_window_minutes);
    if window_minutes == 0 {
        return Err(ApiError::BadRequest(
            "window_minutes must be greater than zero".to_string(),
        ));
    }

    state
        .monitor
        .get_health_trends(Duration::from_secs(window_minutes.saturating_mul(60)))
        .map(Json)
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "No health checks in the last {} minutes",
                window_minutes
            ))
        })
}

pub(super) async fn component(
    State(state): State<Arc<AppState>>,
    Path(component): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let component: ComponentType = component.parse().map_err(ApiError::NotFound)?;
    let check = state.monitor.guarded_check(component).await;
    Ok((status_code_for(check.status), Json(check)))
}
