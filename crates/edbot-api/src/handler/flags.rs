//! Flag administration endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use edbot_core::{Environment, FlagError, FlagSource, FlagStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::AppState;
use crate::error::ApiError;

/// Response for `GET /api/v1/admin/flags`
#[derive(Debug, Serialize, Deserialize)]
pub struct FlagListResponse {
    pub environment: Environment,
    pub flags: BTreeMap<String, FlagStatus>,
}

/// Response for `GET /api/v1/admin/flags/:name`
#[derive(Debug, Serialize, Deserialize)]
pub struct FlagDetail {
    pub name: String,
    #[serde(flatten)]
    pub status: FlagStatus,
    pub source: FlagSource,
}

/// Body for `PUT /api/v1/admin/flags/:name`
#[derive(Debug, Serialize, Deserialize)]
pub struct SetFlagRequest {
    pub value: bool,
    /// Defaults to the configured override TTL
    #[serde(default)]
    pub ttl_minutes: Option<u32>,
    /// Store without expiry; `ttl_minutes` is ignored
    #[serde(default)]
    pub permanent: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SetFlagResponse {
    pub name: String,
    pub value: bool,
    /// `None` for a permanent override
    pub ttl_minutes: Option<u32>,
}

pub(super) async fn list_flags(State(state): State<Arc<AppState>>) -> Json<FlagListResponse> {
    Json(FlagListResponse {
        environment: state.flags.environment(),
        flags: state.flags.get_all_flags().await,
    })
}

pub(super) async fn get_flag(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<FlagDetail>, ApiError> {
    let (status, resolution) = state
        .flags
        .describe_flag(&name)
        .await
        .ok_or_else(|| ApiError::from(FlagError::UnknownFlag(name.clone())))?;

    Ok(Json(FlagDetail {
        name,
        status,
        source: resolution.source,
    }))
}

pub(super) async fn set_flag(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(request): Json<SetFlagRequest>,
) -> Result<Json<SetFlagResponse>, ApiError> {
    let ttl_minutes = if request.permanent {
        None
    } else {
        let minutes = request
            .ttl_minutes
            .unwrap_or_else(|| state.flags.default_override_ttl_minutes());
        if minutes == 0 {
            return Err(ApiError::BadRequest(
                "ttl_minutes must be greater than zero; use \"permanent\": true for no expiry"
                    .to_string(),
            ));
        }
        Some(minutes)
    };

    state
        .flags
        .try_set_flag(&name, request.value, ttl_minutes)
        .await?;

    Ok(Json(SetFlagResponse {
        name,
        value: request.value,
        ttl_minutes,
    }))
}

pub(super) async fn delete_flag(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let existed = state.flags.try_delete_flag(&name).await?;
    Ok(Json(serde_json::json!({
        "name": name,
        "deleted": existed,
    })))
}

pub(super) async fn clear_overrides(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let cleared = state.flags.try_clear_overrides().await?;
    Ok(Json(serde_json::json!({ "cleared": cleared })))
}

pub(super) async fn validate_flags(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let warnings = state.flags.validate_flag_dependencies().await;
    Json(serde_json::json!({
        "valid": warnings.is_empty(),
        "warnings": warnings,
    }))
}
