//! # Tenants API Handlers
//!
//! Registration, listing, detail views and operator actions for tenants.

use axum::{
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::types::{
    ApiLogDto, ConnectionDto, ListResponse, NotificationDto, PageQuery, TenantDto, UsageStatDto,
};
use crate::admin::{ActionResult, BulkActionReport, TenantAction};
use crate::auth::OperatorAuth;
use crate::error::{ApiError, validation_error};
use crate::mfa::{AuthLogPage, AuthLogWindow, UsersPage};
use crate::models::tenant::{TenantPlan, TenantStatus};
use crate::models::tenant_features::FeatureSet;
use crate::repositories::tenant::{NewTenant, TenantFilter};
use crate::repositories::{
    ApiLogRepository, FeaturesRepository, NotificationRepository, TenantRepository,
    UsageStatsRepository,
};
use crate::server::AppState;

const MAX_BULK_TENANTS: usize = 100;

/// Request payload for registering a tenant
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateTenantRequest {
    #[schema(example = "Acme Corp")]
    pub name: String,
    #[schema(example = "acme.example")]
    pub domain: String,
    #[serde(default)]
    pub additional_domains: Vec<String>,
    pub contact_name: String,
    #[schema(example = "security@acme.example")]
    pub contact_email: String,
    #[serde(default)]
    pub plan: TenantPlan,
    #[schema(value_type = Option<Object>)]
    pub settings: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegistrationResponse {
    pub tenant: TenantDto,
    pub features: FeatureSet,
    pub connection: ConnectionDto,
    /// Present when the MFA system could not be reached at registration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FeaturesResponse {
    pub tenant_id: Uuid,
    pub features: FeatureSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_error: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListTenantsQuery {
    pub status: Option<TenantStatus>,
    pub plan: Option<TenantPlan>,
    /// Case-insensitive match on name, domain or contact email
    pub search: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UsageQuery {
    /// Only periods starting within the last N days
    pub days: Option<u32>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuthLogQuery {
    /// Look-back window in days (default 7, max 90)
    pub days: Option<u32>,
    /// Maximum entries (default 100, max 1000)
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BulkActionRequest {
    pub tenant_ids: Vec<Uuid>,
    pub action: TenantAction,
}

/// List tenants
#[utoipa::path(
    get,
    path = "/api/v1/tenants",
    security(("bearer_auth" = [])),
    params(ListTenantsQuery),
    responses(
        (status = 200, description = "Tenants, newest first", body = ListResponse<TenantDto>),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError)
    ),
    tag = "tenants"
)]
pub async fn list_tenants(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Query(query): Query<ListTenantsQuery>,
) -> Result<Json<ListResponse<TenantDto>>, ApiError> {
    let page = PageQuery {
        limit: query.limit,
        offset: query.offset,
    };
    let filter = TenantFilter {
        status: query.status,
        plan: query.plan,
        search: query.search,
    };

    let tenants = TenantRepository::new(state.db.as_ref())
        .list(&filter, page.limit(), page.offset())
        .await?;

    Ok(Json(ListResponse::new(
        tenants.into_iter().map(TenantDto::from).collect(),
    )))
}

/// Register a new tenant
#[utoipa::path(
    post,
    path = "/api/v1/tenants",
    security(("bearer_auth" = [])),
    request_body = CreateTenantRequest,
    responses(
        (status = 201, description = "Tenant registered", body = RegistrationResponse, headers(
            ("Location", description = "URL of the created tenant")
        )),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 409, description = "Domain already registered", body = ApiError)
    ),
    tag = "tenants"
)]
pub async fn create_tenant(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    payload: Result<Json<CreateTenantRequest>, JsonRejection>,
) -> Result<(StatusCode, [(&'static str, String); 1], Json<RegistrationResponse>), ApiError> {
    let Json(request) = payload?;

    let registration = state
        .admin
        .register(NewTenant {
            name: request.name,
            domain: request.domain,
            additional_domains: request.additional_domains,
            contact_name: request.contact_name,
            contact_email: request.contact_email,
            plan: request.plan,
            settings: request.settings,
        })
        .await?;

    let location = format!("/api/v1/tenants/{}", registration.tenant.id);
    let response = RegistrationResponse {
        features: FeatureSet::from(&registration.features),
        connection: registration.connection.into(),
        tenant: registration.tenant.into(),
        remote_error: registration.remote_error,
    };

    Ok((StatusCode::CREATED, [("Location", location)], Json(response)))
}

/// Get a tenant by ID
#[utoipa::path(
    get,
    path = "/api/v1/tenants/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Tenant UUID")),
    responses(
        (status = 200, description = "Tenant", body = TenantDto),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 404, description = "Tenant not found", body = ApiError)
    ),
    tag = "tenants"
)]
pub async fn get_tenant(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<TenantDto>, ApiError> {
    let tenant = TenantRepository::new(state.db.as_ref()).get(tenant_id).await?;
    Ok(Json(tenant.into()))
}

/// Get a tenant's feature flags
#[utoipa::path(
    get,
    path = "/api/v1/tenants/{id}/features",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Tenant UUID")),
    responses(
        (status = 200, description = "Feature flags", body = FeaturesResponse),
        (status = 404, description = "Tenant not found", body = ApiError)
    ),
    tag = "tenants"
)]
pub async fn get_features(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<FeaturesResponse>, ApiError> {
    let features = FeaturesRepository::new(state.db.as_ref())
        .get_by_tenant(tenant_id)
        .await?;
    Ok(Json(FeaturesResponse {
        tenant_id,
        features: FeatureSet::from(&features),
        remote_error: None,
    }))
}

/// Replace a tenant's feature flags and mirror them to the MFA system
#[utoipa::path(
    put,
    path = "/api/v1/tenants/{id}/features",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Tenant UUID")),
    request_body = FeatureSet,
    responses(
        (status = 200, description = "Updated feature flags", body = FeaturesResponse),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 404, description = "Tenant not found", body = ApiError)
    ),
    tag = "tenants"
)]
pub async fn update_features(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Path(tenant_id): Path<Uuid>,
    payload: Result<Json<FeatureSet>, JsonRejection>,
) -> Result<Json<FeaturesResponse>, ApiError> {
    let Json(features) = payload?;
    let updated = state.admin.update_features(tenant_id, &features).await?;
    Ok(Json(FeaturesResponse {
        tenant_id,
        features: FeatureSet::from(&updated.value),
        remote_error: updated.remote_error,
    }))
}

/// Usage history for a tenant
#[utoipa::path(
    get,
    path = "/api/v1/tenants/{id}/usage",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Tenant UUID"), UsageQuery),
    responses(
        (status = 200, description = "Usage rows, newest period first", body = ListResponse<UsageStatDto>),
        (status = 404, description = "Tenant not found", body = ApiError)
    ),
    tag = "tenants"
)]
pub async fn get_usage(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Path(tenant_id): Path<Uuid>,
    Query(query): Query<UsageQuery>,
) -> Result<Json<ListResponse<UsageStatDto>>, ApiError> {
    TenantRepository::new(state.db.as_ref()).get(tenant_id).await?;
    let since = query
        .days
        .map(|days| (Utc::now() - Duration::days(i64::from(days))).date_naive());

    let rows = UsageStatsRepository::new(state.db.as_ref())
        .list_for_tenant(tenant_id, since)
        .await?;
    Ok(Json(ListResponse::new(
        rows.into_iter().map(UsageStatDto::from).collect(),
    )))
}

/// Notifications for a tenant
#[utoipa::path(
    get,
    path = "/api/v1/tenants/{id}/notifications",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Tenant UUID"), PageQuery),
    responses(
        (status = 200, description = "Notifications, newest first", body = ListResponse<NotificationDto>),
        (status = 404, description = "Tenant not found", body = ApiError)
    ),
    tag = "tenants"
)]
pub async fn get_notifications(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Path(tenant_id): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ListResponse<NotificationDto>>, ApiError> {
    TenantRepository::new(state.db.as_ref()).get(tenant_id).await?;
    let rows = NotificationRepository::new(state.db.as_ref())
        .list_for_tenant(tenant_id, page.limit())
        .await?;
    Ok(Json(ListResponse::new(
        rows.into_iter().map(NotificationDto::from).collect(),
    )))
}

/// Remote API calls made for a tenant
#[utoipa::path(
    get,
    path = "/api/v1/tenants/{id}/api-logs",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Tenant UUID"), PageQuery),
    responses(
        (status = 200, description = "API log entries, newest first", body = ListResponse<ApiLogDto>),
        (status = 404, description = "Tenant not found", body = ApiError)
    ),
    tag = "tenants"
)]
pub async fn get_api_logs(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Path(tenant_id): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ListResponse<ApiLogDto>>, ApiError> {
    TenantRepository::new(state.db.as_ref()).get(tenant_id).await?;
    let rows = ApiLogRepository::new(state.db.as_ref())
        .list_for_tenant(tenant_id, page.limit())
        .await?;
    Ok(Json(ListResponse::new(
        rows.into_iter().map(ApiLogDto::from).collect(),
    )))
}

/// Users registered for the tenant in the MFA system
#[utoipa::path(
    get,
    path = "/api/v1/tenants/{id}/users",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Tenant UUID"), PageQuery),
    responses(
        (status = 200, description = "One page of remote users", body = UsersPage),
        (status = 404, description = "Tenant not found", body = ApiError),
        (status = 502, description = "MFA system call failed", body = ApiError)
    ),
    tag = "tenants"
)]
pub async fn get_remote_users(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Path(tenant_id): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> Result<Json<UsersPage>, ApiError> {
    let limit = u32::try_from(page.limit()).unwrap_or(u32::MAX);
    let offset = u32::try_from(page.offset()).map_err(|_| {
        validation_error(
            "Invalid offset",
            serde_json::json!({ "offset": "Must fit in 32 bits" }),
        )
    })?;
    let users = state.admin.remote_users(tenant_id, limit, offset).await?;
    Ok(Json(users))
}

/// Authentication log from the MFA system for the tenant
#[utoipa::path(
    get,
    path = "/api/v1/tenants/{id}/auth-logs",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Tenant UUID"), AuthLogQuery),
    responses(
        (status = 200, description = "Remote authentication log entries", body = AuthLogPage),
        (status = 404, description = "Tenant not found", body = ApiError),
        (status = 502, description = "MFA system call failed", body = ApiError)
    ),
    tag = "tenants"
)]
pub async fn get_remote_auth_logs(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Path(tenant_id): Path<Uuid>,
    Query(query): Query<AuthLogQuery>,
) -> Result<Json<AuthLogPage>, ApiError> {
    let defaults = AuthLogWindow::default();
    let window = AuthLogWindow {
        days: query.days.unwrap_or(defaults.days).clamp(1, 90),
        limit: query.limit.unwrap_or(defaults.limit).clamp(1, 1000),
    };
    let logs = state.admin.remote_auth_logs(tenant_id, window).await?;
    Ok(Json(logs))
}

/// Apply an operator action to one tenant
#[utoipa::path(
    post,
    path = "/api/v1/tenants/{id}/actions",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Tenant UUID")),
    request_body = TenantAction,
    responses(
        (status = 200, description = "Action applied", body = ActionResult),
        (status = 400, description = "Action not allowed in the current state", body = ApiError),
        (status = 404, description = "Tenant not found", body = ApiError)
    ),
    tag = "tenants"
)]
pub async fn tenant_action(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    Path(tenant_id): Path<Uuid>,
    payload: Result<Json<TenantAction>, JsonRejection>,
) -> Result<Json<ActionResult>, ApiError> {
    let Json(action) = payload?;
    let result = state.admin.execute(tenant_id, &action).await?;
    Ok(Json(result))
}

/// Apply one operator action to many tenants
#[utoipa::path(
    post,
    path = "/api/v1/tenants/actions",
    security(("bearer_auth" = [])),
    request_body = BulkActionRequest,
    responses(
        (status = 200, description = "Per-tenant results", body = BulkActionReport),
        (status = 400, description = "Validation failed", body = ApiError)
    ),
    tag = "tenants"
)]
pub async fn bulk_action(
    State(state): State<AppState>,
    _operator_auth: OperatorAuth,
    payload: Result<Json<BulkActionRequest>, JsonRejection>,
) -> Result<Json<BulkActionReport>, ApiError> {
    let Json(request) = payload?;
    if request.tenant_ids.is_empty() || request.tenant_ids.len() > MAX_BULK_TENANTS {
        return Err(validation_error(
            "Invalid tenant selection",
            serde_json::json!({
                "tenant_ids": format!("Provide between 1 and {MAX_BULK_TENANTS} tenant ids")
            }),
        ));
    }

    let report = state
        .admin
        .execute_bulk(&request.tenant_ids, &request.action)
        .await;
    Ok(Json(report))
}
