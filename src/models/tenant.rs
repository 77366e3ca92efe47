//! Tenant entity model
//!
//! A tenant is a registered website or customer using the MFA service.
//! Tenants are never hard-deleted; `cancelled` is the terminal state.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;

/// Tenant entity
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "tenants")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub name: String,

    /// Primary domain, unique across tenants
    #[sea_orm(unique)]
    pub domain: String,

    /// Extra domains served by the tenant (JSON array of strings)
    #[sea_orm(column_type = "JsonBinary")]
    pub additional_domains: JsonValue,

    pub contact_name: String,

    pub contact_email: String,

    pub plan: TenantPlan,

    pub status: TenantStatus,

    /// Key presented to the remote MFA system as `X-Tenant-Key`
    #[sea_orm(unique)]
    pub api_key: String,

    pub api_secret: String,

    pub max_users: i64,

    pub max_monthly_authentications: i64,

    #[sea_orm(column_type = "JsonBinary")]
    pub settings: JsonValue,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,

    pub last_activity: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Domains besides the primary one; non-string entries are skipped.
    pub fn additional_domains(&self) -> Vec<String> {
        self.additional_domains
            .as_array()
            .map(|extra| {
                extra
                    .iter()
                    .filter_map(|d| d.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

}

/// Subscription plan
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
pub enum TenantPlan {
    #[sea_orm(string_value = "free")]
    #[default]
    Free,
    #[sea_orm(string_value = "basic")]
    Basic,
    #[sea_orm(string_value = "premium")]
    Premium,
    #[sea_orm(string_value = "enterprise")]
    Enterprise,
}

/// User and authentication limits attached to a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanLimits {
    pub max_users: i64,
    pub max_monthly_authentications: i64,
}

impl TenantPlan {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantPlan::Free => "free",
            TenantPlan::Basic => "basic",
            TenantPlan::Premium => "premium",
            TenantPlan::Enterprise => "enterprise",
        }
    }

    pub fn limits(&self) -> PlanLimits {
        let (max_users, max_monthly_authentications) = match self {
            TenantPlan::Free => (50, 1_000),
            TenantPlan::Basic => (100, 5_000),
            TenantPlan::Premium => (500, 25_000),
            TenantPlan::Enterprise => (1_000, 50_000),
        };
        PlanLimits {
            max_users,
            max_monthly_authentications,
        }
    }
}

/// Tenant lifecycle status
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
pub enum TenantStatus {
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "suspended")]
    Suspended,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl TenantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantStatus::Pending => "pending",
            TenantStatus::Active => "active",
            TenantStatus::Suspended => "suspended",
            TenantStatus::Cancelled => "cancelled",
        }
    }

    /// Whether a tenant may move from `self` to `next`.
    ///
    /// Same-state moves are accepted so repeated admin actions are no-ops.
    pub fn can_transition_to(&self, next: TenantStatus) -> bool {
        use TenantStatus::*;
        if *self == next {
            return true;
        }
        matches!(
            (self, next),
            (Pending, Active)
                | (Pending, Cancelled)
                | (Active, Suspended)
                | (Suspended, Active)
                | (Active, Cancelled)
                | (Suspended, Cancelled)
        )
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::tenant_features::Entity")]
    Features,
    #[sea_orm(has_one = "super::mfa_system_connection::Entity")]
    Connection,
    #[sea_orm(has_many = "super::tenant_usage_stat::Entity")]
    UsageStats,
    #[sea_orm(has_many = "super::tenant_notification::Entity")]
    Notifications,
    #[sea_orm(has_many = "super::tenant_api_log::Entity")]
    ApiLogs,
}

impl Related<super::tenant_features::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Features.def()
    }
}

impl Related<super::mfa_system_connection::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Connection.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_is_terminal() {
        for next in [
            TenantStatus::Pending,
            TenantStatus::Active,
            TenantStatus::Suspended,
        ] {
            assert!(!TenantStatus::Cancelled.can_transition_to(next));
        }
        assert!(TenantStatus::Cancelled.can_transition_to(TenantStatus::Cancelled));
    }

    #[test]
    fn suspension_round_trips_through_active() {
        assert!(TenantStatus::Active.can_transition_to(TenantStatus::Suspended));
        assert!(TenantStatus::Suspended.can_transition_to(TenantStatus::Active));
        assert!(!TenantStatus::Suspended.can_transition_to(TenantStatus::Pending));
        assert!(!TenantStatus::Pending.can_transition_to(TenantStatus::Suspended));
    }

    fn tenant_with_domains(additional: serde_json::Value) -> Model {
        let now = chrono::Utc::now().fixed_offset();
        Model {
            id: Uuid::new_v4(),
            name: "Acme".into(),
            domain: "acme.test".into(),
            additional_domains: additional,
            contact_name: "Dana".into(),
            contact_email: "it@acme.test".into(),
            plan: TenantPlan::Basic,
            status: TenantStatus::Active,
            api_key: "mfa_key".into(),
            api_secret: "secret".into(),
            max_users: 100,
            max_monthly_authentications: 5_000,
            settings: serde_json::json!({}),
            created_at: now,
            updated_at: now,
            last_activity: None,
        }
    }

    #[test]
    fn additional_domains_exclude_the_primary() {
        let tenant = tenant_with_domains(serde_json::json!(["login.acme.test", 7, "sso.acme.test"]));
        assert_eq!(
            tenant.additional_domains(),
            vec!["login.acme.test", "sso.acme.test"]
        );

        let bare = tenant_with_domains(serde_json::Value::Null);
        assert!(bare.additional_domains().is_empty());
    }

    #[test]
    fn plan_limits_grow_with_tier() {
        assert_eq!(TenantPlan::Free.limits().max_users, 50);
        assert_eq!(TenantPlan::Basic.limits().max_monthly_authentications, 5_000);
        assert_eq!(TenantPlan::Enterprise.limits().max_users, 1_000);
    }
}
