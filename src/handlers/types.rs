//! # API Types
//!
//! Response DTOs shared across handlers. Entities are never serialized
//! directly; secrets such as the tenant API secret stay out of responses.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::models::mfa_system_connection::{ConnectionStatus, Model as ConnectionModel};
use crate::models::tenant::{Model as TenantModel, TenantPlan, TenantStatus};
use crate::models::tenant_api_log::Model as ApiLogModel;
use crate::models::tenant_notification::{Model as NotificationModel, NotificationKind};
use crate::models::tenant_usage_stat::{Model as UsageModel, UsageMetric};

pub const DEFAULT_PAGE_SIZE: u64 = 50;
pub const MAX_PAGE_SIZE: u64 = 200;

/// Generic list response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
    /// Number of items in `data`
    pub count: usize,
}

impl<T> ListResponse<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self {
            count: data.len(),
            data,
        }
    }
}

/// `limit` / `offset` paging
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// Page size (default 50, max 200)
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl PageQuery {
    pub fn limit(&self) -> u64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> u64 {
        self.offset.unwrap_or(0)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TenantDto {
    pub id: Uuid,
    #[schema(example = "Acme Corp")]
    pub name: String,
    #[schema(example = "acme.example")]
    pub domain: String,
    pub additional_domains: Vec<String>,
    pub contact_name: String,
    pub contact_email: String,
    pub plan: TenantPlan,
    pub status: TenantStatus,
    /// Key the tenant presents to the MFA system
    pub api_key: String,
    pub max_users: i64,
    pub max_monthly_authentications: i64,
    #[schema(value_type = Object)]
    pub settings: serde_json::Value,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTime<FixedOffset>,
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: DateTime<FixedOffset>,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub last_activity: Option<DateTime<FixedOffset>>,
}

impl From<TenantModel> for TenantDto {
    fn from(tenant: TenantModel) -> Self {
        let additional_domains = tenant.additional_domains();
        Self {
            id: tenant.id,
            name: tenant.name,
            domain: tenant.domain,
            additional_domains,
            contact_name: tenant.contact_name,
            contact_email: tenant.contact_email,
            plan: tenant.plan,
            status: tenant.status,
            api_key: tenant.api_key,
            max_users: tenant.max_users,
            max_monthly_authentications: tenant.max_monthly_authentications,
            settings: tenant.settings,
            created_at: tenant.created_at,
            updated_at: tenant.updated_at,
            last_activity: tenant.last_activity,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConnectionDto {
    pub tenant_id: Uuid,
    pub system_url: String,
    pub remote_tenant_id: Option<String>,
    pub is_connected: bool,
    pub status: ConnectionStatus,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub last_sync: Option<DateTime<FixedOffset>>,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub last_attempt_at: Option<DateTime<FixedOffset>>,
    pub last_error: Option<String>,
    pub total_users: i64,
    pub active_users: i64,
    pub total_authentications: i64,
    pub admin_locked: bool,
    pub force_connection: bool,
    pub can_disconnect: bool,
}

impl From<ConnectionModel> for ConnectionDto {
    fn from(connection: ConnectionModel) -> Self {
        Self {
            tenant_id: connection.tenant_id,
            system_url: connection.system_url,
            remote_tenant_id: connection.remote_tenant_id,
            is_connected: connection.is_connected,
            status: connection.status,
            last_sync: connection.last_sync,
            last_attempt_at: connection.last_attempt_at,
            last_error: connection.last_error,
            total_users: connection.total_users,
            active_users: connection.active_users,
            total_authentications: connection.total_authentications,
            admin_locked: connection.admin_locked,
            force_connection: connection.force_connection,
            can_disconnect: connection.can_disconnect,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UsageStatDto {
    pub metric: UsageMetric,
    pub period_start: NaiveDate,
    pub value: i64,
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: DateTime<FixedOffset>,
}

impl From<UsageModel> for UsageStatDto {
    fn from(row: UsageModel) -> Self {
        Self {
            metric: row.metric,
            period_start: row.period_start,
            value: row.value,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NotificationDto {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTime<FixedOffset>,
}

impl From<NotificationModel> for NotificationDto {
    fn from(notification: NotificationModel) -> Self {
        Self {
            id: notification.id,
            kind: notification.kind,
            title: notification.title,
            message: notification.message,
            is_read: notification.is_read,
            created_at: notification.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiLogDto {
    pub id: Uuid,
    pub method: String,
    pub endpoint: String,
    /// `0` when no response was received
    pub status_code: i32,
    pub response_time_ms: i64,
    pub error_message: Option<String>,
    pub is_error: bool,
    #[schema(value_type = String, format = DateTime)]
    pub timestamp: DateTime<FixedOffset>,
}

impl From<ApiLogModel> for ApiLogDto {
    fn from(log: ApiLogModel) -> Self {
        Self {
            is_error: log.is_error(),
            id: log.id,
            method: log.method,
            endpoint: log.endpoint,
            status_code: log.status_code,
            response_time_ms: log.response_time_ms,
            error_message: log.error_message,
            timestamp: log.timestamp,
        }
    }
}
