//! # Dashboard Handlers

use axum::{
    extract::{Query, State},
    response::Json,
};
use chrono::Utc;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::admin::analytics::{self, Analytics};
use crate::admin::dashboard::{self, DashboardSummary, UsageTrends};
use crate::auth::OperatorAuth;
use crate::error::ApiError;
use crate::mfa::HealthStatus;
use crate::server::AppState;

const DEFAULT_TREND_DAYS: u32 = 30;
const MAX_TREND_DAYS: u32 = 365;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TrendsQuery {
    /// Look-back window in days (default 30, max 365)
    pub days: Option<u32>,
}

/// Tenant counts, remote API error rate and overall health
#[utoipa::path(
    get,
    path = "/api/v1/dashboard",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Dashboard summary", body = DashboardSummary),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError)
    ),
    tag = "dashboard"
)]
pub async fn get_dashboard(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
) -> Result<Json<DashboardSummary>, ApiError> {
    let summary = dashboard::summary(state.db.as_ref(), Utc::now()).await?;
    Ok(Json(summary))
}

/// Authentication totals across tenants per usage period
#[utoipa::path(
    get,
    path = "/api/v1/usage/trends",
    security(("bearer_auth" = [])),
    params(TrendsQuery),
    responses(
        (status = 200, description = "Usage trend points", body = UsageTrends)
    ),
    tag = "dashboard"
)]
pub async fn get_usage_trends(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Query(query): Query<TrendsQuery>,
) -> Result<Json<UsageTrends>, ApiError> {
    let days = query.days.unwrap_or(DEFAULT_TREND_DAYS).clamp(1, MAX_TREND_DAYS);
    let trends = dashboard::usage_trends(
        state.db.as_ref(),
        days,
        state.config.sync_usage_period,
        Utc::now(),
    )
    .await?;
    Ok(Json(trends))
}

/// API performance, busiest endpoints, usage and sign-ups over a window
#[utoipa::path(
    get,
    path = "/api/v1/analytics",
    security(("bearer_auth" = [])),
    params(TrendsQuery),
    responses(
        (status = 200, description = "Analytics report", body = Analytics)
    ),
    tag = "dashboard"
)]
pub async fn get_analytics(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Query(query): Query<TrendsQuery>,
) -> Result<Json<Analytics>, ApiError> {
    let days = query.days.unwrap_or(DEFAULT_TREND_DAYS).clamp(1, MAX_TREND_DAYS);
    let report = analytics::analytics(
        state.db.as_ref(),
        days,
        state.config.sync_usage_period,
        Utc::now(),
    )
    .await?;
    Ok(Json(report))
}

/// Health of the remote MFA system
#[utoipa::path(
    get,
    path = "/api/v1/mfa/health",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Remote health", body = HealthStatus),
        (status = 502, description = "MFA system unreachable", body = ApiError)
    ),
    tag = "dashboard"
)]
pub async fn get_mfa_health(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
) -> Result<Json<HealthStatus>, ApiError> {
    let health = state.admin.remote_health().await?;
    Ok(Json(health))
}
