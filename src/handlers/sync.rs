//! # Sync Handler
//!
//! Runs the reconciler on demand, for all active tenants or one tenant.

use axum::{
    extract::{State, rejection::JsonRejection},
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::OperatorAuth;
use crate::error::ApiError;
use crate::reconciler::{SyncOptions, SyncReport, SyncTarget};
use crate::server::AppState;

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct SyncRequest {
    /// Reconcile only this tenant, regardless of status
    pub tenant_id: Option<Uuid>,
    #[serde(default)]
    pub dry_run: bool,
}

/// Trigger a usage sync
#[utoipa::path(
    post,
    path = "/api/v1/sync",
    security(("bearer_auth" = [])),
    request_body = SyncRequest,
    responses(
        (status = 200, description = "Per-tenant outcomes and the applied (or planned) changes"),
        (status = 404, description = "Tenant not found", body = ApiError),
        (status = 500, description = "Storage failure", body = ApiError)
    ),
    tag = "sync"
)]
pub async fn trigger_sync(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    payload: Result<Json<SyncRequest>, JsonRejection>,
) -> Result<Json<SyncReport>, ApiError> {
    let Json(request) = payload?;
    let options = SyncOptions {
        target: request
            .tenant_id
            .map(SyncTarget::Tenant)
            .unwrap_or(SyncTarget::AllActive),
        dry_run: request.dry_run,
    };

    let report = state.admin.sync(options).await?;
    Ok(Json(report))
}
