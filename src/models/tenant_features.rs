//! Tenant feature flags and quotas (one row per tenant).

use super::tenant::TenantPlan;
use sea_orm::ActiveModelBehavior;
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "tenant_features")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub tenant_id: Uuid,

    pub enable_totp: bool,
    pub enable_email: bool,
    pub enable_sms: bool,
    pub enable_passkeys: bool,
    pub enable_backup_codes: bool,

    pub enable_risk_analysis: bool,
    pub enable_device_tracking: bool,
    pub enable_geo_blocking: bool,
    pub enable_session_management: bool,
    pub enable_audit_logs: bool,

    pub allow_custom_branding: bool,
    pub allow_custom_domains: bool,
    pub allow_webhook_notifications: bool,

    pub priority_support: bool,
    pub dedicated_support: bool,

    pub api_rate_limit_per_minute: i32,
    pub api_rate_limit_per_hour: i32,

    pub updated_at: DateTimeWithTimeZone,
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

/// Feature flags as exchanged with operators and the remote MFA system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FeatureSet {
    pub enable_totp: bool,
    pub enable_email: bool,
    pub enable_sms: bool,
    pub enable_passkeys: bool,
    pub enable_backup_codes: bool,
    pub enable_risk_analysis: bool,
    pub enable_device_tracking: bool,
    pub enable_geo_blocking: bool,
    pub enable_session_management: bool,
    pub enable_audit_logs: bool,
    pub allow_custom_branding: bool,
    pub allow_custom_domains: bool,
    pub allow_webhook_notifications: bool,
    pub priority_support: bool,
    pub dedicated_support: bool,
    #[schema(example = 60)]
    pub api_rate_limit_per_minute: i32,
    #[schema(example = 1000)]
    pub api_rate_limit_per_hour: i32,
}

impl FeatureSet {
    /// Defaults granted by a plan at registration or plan change.
    pub fn for_plan(plan: TenantPlan) -> Self {
        let premium_or_above = matches!(plan, TenantPlan::Premium | TenantPlan::Enterprise);
        let enterprise = plan == TenantPlan::Enterprise;
        let (per_minute, per_hour) = match plan {
            TenantPlan::Free => (60, 1_000),
            TenantPlan::Basic => (120, 5_000),
            TenantPlan::Premium | TenantPlan::Enterprise => (300, 15_000),
        };

        Self {
            enable_totp: true,
            enable_email: true,
            enable_sms: premium_or_above,
            enable_passkeys: premium_or_above,
            enable_backup_codes: true,
            enable_risk_analysis: premium_or_above,
            enable_device_tracking: premium_or_above,
            enable_geo_blocking: enterprise,
            enable_session_management: premium_or_above,
            enable_audit_logs: premium_or_above,
            allow_custom_branding: premium_or_above,
            allow_custom_domains: enterprise,
            allow_webhook_notifications: plan != TenantPlan::Free,
            priority_support: premium_or_above,
            dedicated_support: enterprise,
            api_rate_limit_per_minute: per_minute,
            api_rate_limit_per_hour: per_hour,
        }
    }

    /// Names of the MFA methods that are switched on.
    pub fn enabled_methods(&self) -> Vec<&'static str> {
        [
            ("totp", self.enable_totp),
            ("email", self.enable_email),
            ("sms", self.enable_sms),
            ("passkeys", self.enable_passkeys),
            ("backup_codes", self.enable_backup_codes),
        ]
        .into_iter()
        .filter_map(|(name, on)| on.then_some(name))
        .collect()
    }

    /// Copy every flag onto an active model.
    pub fn apply_to(&self, active: &mut ActiveModel) {
        active.enable_totp = Set(self.enable_totp);
        active.enable_email = Set(self.enable_email);
        active.enable_sms = Set(self.enable_sms);
        active.enable_passkeys = Set(self.enable_passkeys);
        active.enable_backup_codes = Set(self.enable_backup_codes);
        active.enable_risk_analysis = Set(self.enable_risk_analysis);
        active.enable_device_tracking = Set(self.enable_device_tracking);
        active.enable_geo_blocking = Set(self.enable_geo_blocking);
        active.enable_session_management = Set(self.enable_session_management);
        active.enable_audit_logs = Set(self.enable_audit_logs);
        active.allow_custom_branding = Set(self.allow_custom_branding);
        active.allow_custom_domains = Set(self.allow_custom_domains);
        active.allow_webhook_notifications = Set(self.allow_webhook_notifications);
        active.priority_support = Set(self.priority_support);
        active.dedicated_support = Set(self.dedicated_support);
        active.api_rate_limit_per_minute = Set(self.api_rate_limit_per_minute);
        active.api_rate_limit_per_hour = Set(self.api_rate_limit_per_hour);
    }
}

impl From<&Model> for FeatureSet {
    fn from(model: &Model) -> Self {
        Self {
            enable_totp: model.enable_totp,
            enable_email: model.enable_email,
            enable_sms: model.enable_sms,
            enable_passkeys: model.enable_passkeys,
            enable_backup_codes: model.enable_backup_codes,
            enable_risk_analysis: model.enable_risk_analysis,
            enable_device_tracking: model.enable_device_tracking,
            enable_geo_blocking: model.enable_geo_blocking,
            enable_session_management: model.enable_session_management,
            enable_audit_logs: model.enable_audit_logs,
            allow_custom_branding: model.allow_custom_branding,
            allow_custom_domains: model.allow_custom_domains,
            allow_webhook_notifications: model.allow_webhook_notifications,
            priority_support: model.priority_support,
            dedicated_support: model.dedicated_support,
            api_rate_limit_per_minute: model.api_rate_limit_per_minute,
            api_rate_limit_per_hour: model.api_rate_limit_per_hour,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_plan_keeps_core_methods_only() {
        let features = FeatureSet::for_plan(TenantPlan::Free);
        assert_eq!(features.enabled_methods(), vec!["totp", "email", "backup_codes"]);
        assert!(!features.allow_webhook_notifications);
        assert_eq!(features.api_rate_limit_per_minute, 60);
    }

    #[test]
    fn enterprise_plan_unlocks_everything() {
        let features = FeatureSet::for_plan(TenantPlan::Enterprise);
        assert!(features.enable_geo_blocking);
        assert!(features.dedicated_support);
        assert!(features.allow_custom_domains);
        assert_eq!(features.api_rate_limit_per_hour, 15_000);
    }

    #[test]
    fn premium_plan_excludes_enterprise_extras() {
        let features = FeatureSet::for_plan(TenantPlan::Premium);
        assert!(features.enable_passkeys);
        assert!(!features.enable_geo_blocking);
        assert!(!features.dedicated_support);
    }
}
