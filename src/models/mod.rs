//! # Data Models
//!
//! SeaORM entities backing the control panel, plus the small value types
//! shared by the HTTP API and the sync command.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod mfa_system_connection;
pub mod system_settings;
pub mod tenant;
pub mod tenant_api_log;
pub mod tenant_features;
pub mod tenant_notification;
pub mod tenant_usage_stat;

pub use mfa_system_connection::{ConnectionStatus, Entity as MfaSystemConnection};
pub use system_settings::{Entity as SystemSettingsEntity, SystemSettings};
pub use tenant::{Entity as Tenant, TenantPlan, TenantStatus};
pub use tenant_api_log::Entity as TenantApiLog;
pub use tenant_features::{Entity as TenantFeatures, FeatureSet};
pub use tenant_notification::{Entity as TenantNotification, NotificationKind};
pub use tenant_usage_stat::{Entity as TenantUsageStat, UsageMetric};

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "mfa-control-panel".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
