//! Dashboard aggregates and usage trends.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use sea_orm::ConnectionTrait;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::RepositoryError;
use crate::models::tenant_usage_stat::{UsageMetric, UsagePeriod};
use crate::repositories::{
    ApiLogRepository, ConnectionRepository, TenantRepository, UsageStatsRepository,
};

/// Overall health derived from the API error rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthLevel {
    Healthy,
    Warning,
    Critical,
}

impl HealthLevel {
    /// `healthy` up to 5 %, `warning` up to 15 %, `critical` above.
    pub fn from_error_rate(error_rate: f64) -> Self {
        if error_rate <= 5.0 {
            HealthLevel::Healthy
        } else if error_rate <= 15.0 {
            HealthLevel::Warning
        } else {
            HealthLevel::Critical
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DashboardSummary {
    pub total_tenants: u64,
    pub connected_tenants: u64,
    pub tenants_by_status: BTreeMap<String, i64>,
    pub tenants_by_plan: BTreeMap<String, i64>,
    pub api_calls_24h: u64,
    pub api_errors_24h: u64,
    /// Percentage of failed remote calls over the last 24 hours
    pub error_rate: f64,
    pub health: HealthLevel,
    pub generated_at: DateTime<Utc>,
}

pub async fn summary<C: ConnectionTrait>(
    db: &C,
    now: DateTime<Utc>,
) -> Result<DashboardSummary, RepositoryError> {
    let tenants = TenantRepository::new(db);
    let counts = ApiLogRepository::new(db)
        .error_counts_since(now - Duration::hours(24))
        .await?;
    let error_rate = counts.error_rate();

    Ok(DashboardSummary {
        total_tenants: tenants.count().await?,
        connected_tenants: ConnectionRepository::new(db).count_connected().await?,
        tenants_by_status: tenants.count_by_status().await?,
        tenants_by_plan: tenants.count_by_plan().await?,
        api_calls_24h: counts.total,
        api_errors_24h: counts.errors,
        error_rate,
        health: HealthLevel::from_error_rate(error_rate),
        generated_at: now,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TrendPoint {
    pub period_start: NaiveDate,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UsageTrends {
    pub metric: UsageMetric,
    pub since: NaiveDate,
    pub points: Vec<TrendPoint>,
}

/// Authentication totals across tenants for every usage period overlapping the
/// last `days`, including the one in progress.
pub async fn usage_trends<C: ConnectionTrait>(
    db: &C,
    days: u32,
    period: UsagePeriod,
    now: DateTime<Utc>,
) -> Result<UsageTrends, RepositoryError> {
    let since = period.period_start(now - Duration::days(i64::from(days)));
    let totals = UsageStatsRepository::new(db)
        .totals_by_period(UsageMetric::Authentications, since)
        .await?;

    Ok(UsageTrends {
        metric: UsageMetric::Authentications,
        since,
        points: totals
            .into_iter()
            .map(|(period_start, total)| TrendPoint {
                period_start,
                total,
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_thresholds_are_inclusive() {
        assert_eq!(HealthLevel::from_error_rate(0.0), HealthLevel::Healthy);
        assert_eq!(HealthLevel::from_error_rate(5.0), HealthLevel::Healthy);
        assert_eq!(HealthLevel::from_error_rate(5.1), HealthLevel::Warning);
        assert_eq!(HealthLevel::from_error_rate(15.0), HealthLevel::Warning);
        assert_eq!(HealthLevel::from_error_rate(15.01), HealthLevel::Critical);
    }
}
