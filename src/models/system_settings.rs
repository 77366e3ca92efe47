//! Panel-wide settings, stored as a single row with id `1`.

use sea_orm::ActiveModelBehavior;
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::tenant::{PlanLimits, TenantPlan};
use crate::reconciler::plan::AlertPolicy;

/// Primary key of the settings row
pub const SETTINGS_ID: i16 = 1;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "system_settings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i16,

    pub service_name: String,

    pub service_description: String,

    /// Limits given to new free-plan tenants
    pub default_user_limit: i64,

    pub default_auth_limit: i64,

    pub allow_free_plan: bool,

    pub admin_email: Option<String>,

    pub send_usage_alerts: bool,

    pub send_security_alerts: bool,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Settings as read and written by operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SystemSettings {
    pub service_name: String,
    #[serde(default)]
    pub service_description: String,
    pub default_user_limit: i64,
    pub default_auth_limit: i64,
    pub allow_free_plan: bool,
    #[serde(default)]
    pub admin_email: Option<String>,
    pub send_usage_alerts: bool,
    pub send_security_alerts: bool,
}

impl Default for SystemSettings {
    fn default() -> Self {
        let free = TenantPlan::Free.limits();
        Self {
            service_name: "MFA Service".to_string(),
            service_description: String::new(),
            default_user_limit: free.max_users,
            default_auth_limit: free.max_monthly_authentications,
            allow_free_plan: true,
            admin_email: None,
            send_usage_alerts: true,
            send_security_alerts: true,
        }
    }
}

impl SystemSettings {
    /// Limits for a tenant registered on `plan`. Paid plans keep their tier.
    pub fn limits_for(&self, plan: TenantPlan) -> PlanLimits {
        match plan {
            TenantPlan::Free => PlanLimits {
                max_users: self.default_user_limit,
                max_monthly_authentications: self.default_auth_limit,
            },
            paid => paid.limits(),
        }
    }

    pub fn alert_policy(&self) -> AlertPolicy {
        AlertPolicy {
            usage_alerts: self.send_usage_alerts,
            security_alerts: self.send_security_alerts,
        }
    }

    pub fn apply_to(&self, active: &mut ActiveModel) {
        active.service_name = Set(self.service_name.clone());
        active.service_description = Set(self.service_description.clone());
        active.default_user_limit = Set(self.default_user_limit);
        active.default_auth_limit = Set(self.default_auth_limit);
        active.allow_free_plan = Set(self.allow_free_plan);
        active.admin_email = Set(self.admin_email.clone());
        active.send_usage_alerts = Set(self.send_usage_alerts);
        active.send_security_alerts = Set(self.send_security_alerts);
    }
}

impl From<&Model> for SystemSettings {
    fn from(model: &Model) -> Self {
        Self {
            service_name: model.service_name.clone(),
            service_description: model.service_description.clone(),
            default_user_limit: model.default_user_limit,
            default_auth_limit: model.default_auth_limit,
            allow_free_plan: model.allow_free_plan,
            admin_email: model.admin_email.clone(),
            send_usage_alerts: model.send_usage_alerts,
            send_security_alerts: model.send_security_alerts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_plan_limits_follow_the_settings() {
        let settings = SystemSettings {
            default_user_limit: 75,
            default_auth_limit: 2_500,
            ..SystemSettings::default()
        };

        let free = settings.limits_for(TenantPlan::Free);
        assert_eq!(free.max_users, 75);
        assert_eq!(free.max_monthly_authentications, 2_500);
        assert_eq!(
            settings.limits_for(TenantPlan::Premium),
            TenantPlan::Premium.limits()
        );
    }

    #[test]
    fn defaults_match_the_free_tier_and_enable_alerts() {
        let settings = SystemSettings::default();
        assert_eq!(
            settings.limits_for(TenantPlan::Free),
            TenantPlan::Free.limits()
        );
        assert!(settings.allow_free_plan);
        assert_eq!(settings.alert_policy(), AlertPolicy::default());
    }
}
