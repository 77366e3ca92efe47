//! Usage statistics entity
//!
//! One row per (tenant, metric, period_start). Values are cumulative
//! counters for the period and are never decremented by the reconciler.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "tenant_usage_stats")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub tenant_id: Uuid,

    pub metric: UsageMetric,

    /// First day of the accumulation period (UTC)
    pub period_start: Date,

    pub value: i64,

    pub updated_at: DateTimeWithTimeZone,
}

/// Counters rolled up from the remote MFA system
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum UsageMetric {
    #[sea_orm(string_value = "authentications")]
    Authentications,
    #[sea_orm(string_value = "active_users")]
    ActiveUsers,
    #[sea_orm(string_value = "api_calls")]
    ApiCalls,
    #[sea_orm(string_value = "errors")]
    Errors,
}

impl UsageMetric {
    pub const ALL: [UsageMetric; 4] = [
        UsageMetric::Authentications,
        UsageMetric::ActiveUsers,
        UsageMetric::ApiCalls,
        UsageMetric::Errors,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UsageMetric::Authentications => "authentications",
            UsageMetric::ActiveUsers => "active_users",
            UsageMetric::ApiCalls => "api_calls",
            UsageMetric::Errors => "errors",
        }
    }
}

/// Length of a usage accumulation period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsagePeriod {
    #[default]
    Monthly,
    Daily,
}

impl UsagePeriod {
    /// Start date of the period containing `now` (UTC).
    pub fn period_start(&self, now: DateTime<Utc>) -> NaiveDate {
        let today = now.date_naive();
        match self {
            UsagePeriod::Daily => today,
            UsagePeriod::Monthly => today.with_day(1).unwrap_or(today),
        }
    }
}

impl FromStr for UsagePeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" | "month" => Ok(UsagePeriod::Monthly),
            "daily" | "day" => Ok(UsagePeriod::Daily),
            other => Err(format!("unsupported usage period '{other}'")),
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
