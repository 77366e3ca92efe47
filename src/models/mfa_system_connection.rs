//! MFA system connection entity
//!
//! Tracks how the panel reaches the remote MFA system for one tenant, the
//! outcome of the last contact, the last-known remote totals and the
//! operator security controls.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "mfa_system_connections")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub tenant_id: Uuid,

    /// Base URL of the remote MFA system
    pub system_url: String,

    /// Key used by the remote system to identify this tenant connection
    pub connection_key: String,

    /// Identifier the remote system assigned at registration
    pub remote_tenant_id: Option<String>,

    pub is_connected: bool,

    pub status: ConnectionStatus,

    /// Last successful contact with the remote system
    pub last_sync: Option<DateTimeWithTimeZone>,

    /// Last contact attempt, successful or not
    pub last_attempt_at: Option<DateTimeWithTimeZone>,

    pub last_error: Option<String>,

    pub total_users: i64,

    pub active_users: i64,

    pub total_authentications: i64,

    /// Operator lock: the tenant cannot change the connection
    pub admin_locked: bool,

    /// The tenant must stay connected
    pub force_connection: bool,

    pub can_disconnect: bool,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Whether the security controls allow the tenant to disconnect.
    pub fn disconnect_allowed(&self) -> bool {
        self.can_disconnect && !self.force_connection && !self.admin_locked
    }
}

/// Connection status as observed by the last contact
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,
    #[sea_orm(string_value = "connected")]
    Connected,
    #[sea_orm(string_value = "unreachable")]
    Unreachable,
    #[sea_orm(string_value = "error")]
    Error,
    #[sea_orm(string_value = "unauthorized")]
    Unauthorized,
    #[sea_orm(string_value = "disconnected")]
    Disconnected,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Pending => "pending",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Unreachable => "unreachable",
            ConnectionStatus::Error => "error",
            ConnectionStatus::Unauthorized => "unauthorized",
            ConnectionStatus::Disconnected => "disconnected",
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tenant::Entity",
        from = "Column::TenantId",
        to = "super::tenant::Column::Id"
    )]
    Tenant,
}

impl Related<super::tenant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tenant.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
