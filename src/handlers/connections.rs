//! # Connection Handlers
//!
//! View a tenant's MFA system connection, change its security controls and
//! disconnect it.

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    response::Json,
};
use uuid::Uuid;

use super::types::ConnectionDto;
use crate::auth::OperatorAuth;
use crate::error::ApiError;
use crate::repositories::ConnectionRepository;
use crate::repositories::connection::SecurityControls;
use crate::server::AppState;

/// Get a tenant's MFA system connection
#[utoipa::path(
    get,
    path = "/api/v1/tenants/{id}/connection",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Tenant UUID")),
    responses(
        (status = 200, description = "Connection state", body = ConnectionDto),
        (status = 404, description = "Connection not found", body = ApiError)
    ),
    tag = "connections"
)]
pub async fn get_connection(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<ConnectionDto>, ApiError> {
    let connection = ConnectionRepository::new(state.db.as_ref())
        .get_by_tenant(tenant_id)
        .await?;
    Ok(Json(connection.into()))
}

/// Disconnect a tenant from the MFA system
#[utoipa::path(
    post,
    path = "/api/v1/tenants/{id}/connection/disconnect",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Tenant UUID")),
    responses(
        (status = 200, description = "Connection disconnected", body = ConnectionDto),
        (status = 403, description = "Security controls forbid disconnecting", body = ApiError),
        (status = 404, description = "Connection not found", body = ApiError)
    ),
    tag = "connections"
)]
pub async fn disconnect(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<ConnectionDto>, ApiError> {
    let connection = state.admin.disconnect(tenant_id).await?;
    Ok(Json(connection.into()))
}

/// Update the connection's security controls
#[utoipa::path(
    put,
    path = "/api/v1/tenants/{id}/connection/security",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Tenant UUID")),
    request_body = SecurityControls,
    responses(
        (status = 200, description = "Updated connection", body = ConnectionDto),
        (status = 404, description = "Connection not found", body = ApiError)
    ),
    tag = "connections"
)]
pub async fn update_security(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Path(tenant_id): Path<Uuid>,
    payload: Result<Json<SecurityControls>, JsonRejection>,
) -> Result<Json<ConnectionDto>, ApiError> {
    let Json(controls) = payload?;
    let connection = state.admin.update_security(tenant_id, controls).await?;
    Ok(Json(connection.into()))
}
