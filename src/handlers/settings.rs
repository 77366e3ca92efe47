//! # Settings Handlers

use axum::{
    extract::{State, rejection::JsonRejection},
    response::Json,
};

use crate::auth::OperatorAuth;
use crate::error::ApiError;
use crate::models::system_settings::SystemSettings;
use crate::server::AppState;

/// Current panel-wide settings
#[utoipa::path(
    get,
    path = "/api/v1/settings",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "System settings", body = SystemSettings),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError)
    ),
    tag = "settings"
)]
pub async fn get_settings(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
) -> Result<Json<SystemSettings>, ApiError> {
    Ok(Json(state.admin.settings().await?))
}

/// Replace the panel-wide settings
#[utoipa::path(
    put,
    path = "/api/v1/settings",
    security(("bearer_auth" = [])),
    request_body = SystemSettings,
    responses(
        (status = 200, description = "Saved settings", body = SystemSettings),
        (status = 400, description = "Invalid settings", body = ApiError)
    ),
    tag = "settings"
)]
pub async fn update_settings(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    payload: Result<Json<SystemSettings>, JsonRejection>,
) -> Result<Json<SystemSettings>, ApiError> {
    let Json(settings) = payload?;
    Ok(Json(state.admin.update_settings(&settings).await?))
}
