//! Reporting over a look-back window: API performance per day, busiest
//! endpoints, usage per period and tenant sign-ups per plan.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use sea_orm::ConnectionTrait;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::RepositoryError;
use crate::models::tenant::{Model as TenantModel, TenantPlan};
use crate::models::tenant_api_log::Model as ApiLogModel;
use crate::models::tenant_usage_stat::{UsageMetric, UsagePeriod};
use crate::repositories::{ApiLogRepository, TenantRepository, UsageStatsRepository};

const TOP_ENDPOINTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct UsagePoint {
    pub period_start: NaiveDate,
    pub metric: UsageMetric,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DailyApiPerformance {
    pub date: NaiveDate,
    pub total_calls: u64,
    pub error_count: u64,
    pub avg_response_time_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct EndpointStats {
    pub endpoint: String,
    pub call_count: u64,
    pub avg_response_time_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PlanGrowthPoint {
    pub date: NaiveDate,
    pub plan: TenantPlan,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Analytics {
    pub days: u32,
    pub since: DateTime<Utc>,
    pub usage: Vec<UsagePoint>,
    pub api_performance: Vec<DailyApiPerformance>,
    pub top_endpoints: Vec<EndpointStats>,
    pub plan_growth: Vec<PlanGrowthPoint>,
    pub generated_at: DateTime<Utc>,
}

pub async fn analytics<C: ConnectionTrait>(
    db: &C,
    days: u32,
    period: UsagePeriod,
    now: DateTime<Utc>,
) -> Result<Analytics, RepositoryError> {
    let since = now - Duration::days(i64::from(days));
    let usage = UsageStatsRepository::new(db)
        .totals_by_period_and_metric(period.period_start(since))
        .await?
        .into_iter()
        .map(|((period_start, metric), total)| UsagePoint {
            period_start,
            metric,
            total,
        })
        .collect();
    let logs = ApiLogRepository::new(db).list_since(since).await?;
    let tenants = TenantRepository::new(db).list_created_since(since).await?;

    Ok(Analytics {
        days,
        since,
        usage,
        api_performance: daily_performance(&logs),
        top_endpoints: top_endpoints(&logs, TOP_ENDPOINTS),
        plan_growth: plan_growth(&tenants),
        generated_at: now,
    })
}

#[derive(Default)]
struct CallTally {
    calls: u64,
    errors: u64,
    response_time_ms: i64,
}

impl CallTally {
    fn add(&mut self, log: &ApiLogModel) {
        self.calls += 1;
        self.errors += u64::from(log.is_error());
        self.response_time_ms = self.response_time_ms.saturating_add(log.response_time_ms);
    }

    fn average_ms(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.response_time_ms as f64 / self.calls as f64
        }
    }
}

fn daily_performance(logs: &[ApiLogModel]) -> Vec<DailyApiPerformance> {
    let mut days: BTreeMap<NaiveDate, CallTally> = BTreeMap::new();
    for log in logs {
        days.entry(log.timestamp.with_timezone(&Utc).date_naive())
            .or_default()
            .add(log);
    }
    days.into_iter()
        .map(|(date, tally)| DailyApiPerformance {
            date,
            total_calls: tally.calls,
            error_count: tally.errors,
            avg_response_time_ms: tally.average_ms(),
        })
        .collect()
}

/// Busiest endpoints first; ties break on the endpoint name.
fn top_endpoints(logs: &[ApiLogModel], limit: usize) -> Vec<EndpointStats> {
    let mut endpoints: BTreeMap<&str, CallTally> = BTreeMap::new();
    for log in logs {
        endpoints.entry(log.endpoint.as_str()).or_default().add(log);
    }
    let mut ranked: Vec<EndpointStats> = endpoints
        .into_iter()
        .map(|(endpoint, tally)| EndpointStats {
            endpoint: endpoint.to_string(),
            call_count: tally.calls,
            avg_response_time_ms: tally.average_ms(),
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.call_count
            .cmp(&a.call_count)
            .then_with(|| a.endpoint.cmp(&b.endpoint))
    });
    ranked.truncate(limit);
    ranked
}

fn plan_growth(tenants: &[TenantModel]) -> Vec<PlanGrowthPoint> {
    let mut counts: BTreeMap<(NaiveDate, &'static str), (TenantPlan, u64)> = BTreeMap::new();
    for tenant in tenants {
        let date = tenant.created_at.with_timezone(&Utc).date_naive();
        counts
            .entry((date, tenant.plan.as_str()))
            .or_insert((tenant.plan, 0))
            .1 += 1;
    }
    counts
        .into_iter()
        .map(|((date, _), (plan, count))| PlanGrowthPoint { date, plan, count })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn log(day: u32, endpoint: &str, status_code: i32, response_time_ms: i64) -> ApiLogModel {
        ApiLogModel {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            method: "GET".into(),
            endpoint: endpoint.into(),
            status_code,
            response_time_ms,
            error_message: None,
            ip_address: None,
            user_agent: None,
            timestamp: Utc
                .with_ymd_and_hms(2025, 3, day, 12, 0, 0)
                .unwrap()
                .fixed_offset(),
        }
    }

    #[test]
    fn daily_performance_averages_and_counts_errors() {
        let logs = [
            log(16, "/api/tenant/stats/", 200, 100),
            log(16, "/api/tenant/stats/", 0, 300),
            log(17, "/api/tenant/users/", 502, 40),
        ];

        let days = daily_performance(&logs);

        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2025, 3, 16).unwrap());
        assert_eq!(days[0].total_calls, 2);
        assert_eq!(days[0].error_count, 1);
        assert!((days[0].avg_response_time_ms - 200.0).abs() < f64::EPSILON);
        assert_eq!(days[1].error_count, 1);
    }

    #[test]
    fn top_endpoints_rank_by_call_count() {
        let mut logs = vec![log(17, "/api/tenant/users/", 200, 10)];
        for _ in 0..3 {
            logs.push(log(17, "/api/tenant/stats/", 200, 20));
        }
        logs.push(log(17, "/api/tenant/features/", 200, 30));

        let top = top_endpoints(&logs, 2);

        assert_eq!(top.len(), 2);
        assert_eq!(top[0].endpoint, "/api/tenant/stats/");
        assert_eq!(top[0].call_count, 3);
        assert_eq!(top[1].endpoint, "/api/tenant/features/");
    }
}
