//! # Usage Statistics Repository
//!
//! Rows are keyed by (tenant, metric, period_start). Writes go through
//! [`UsageStatsRepository::upsert`], which updates in place when the row
//! already exists.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::tenant_usage_stat::{
    ActiveModel as UsageActiveModel, Column, Entity as TenantUsageStat, Model as UsageModel,
    UsageMetric,
};

pub struct UsageStatsRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> UsageStatsRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Stored rows for one tenant and period, keyed by metric.
    pub async fn find_period(
        &self,
        tenant_id: Uuid,
        period_start: NaiveDate,
    ) -> Result<BTreeMap<UsageMetric, UsageModel>, RepositoryError> {
        let rows = TenantUsageStat::find()
            .filter(Column::TenantId.eq(tenant_id))
            .filter(Column::PeriodStart.eq(period_start))
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        Ok(rows.into_iter().map(|row| (row.metric, row)).collect())
    }

    /// Set the value for (tenant, metric, period), creating the row if needed.
    pub async fn upsert(
        &self,
        tenant_id: Uuid,
        metric: UsageMetric,
        period_start: NaiveDate,
        value: i64,
        now: DateTime<Utc>,
    ) -> Result<UsageModel, RepositoryError> {
        if value < 0 {
            return Err(RepositoryError::validation_error(format!(
                "usage value for {} cannot be negative",
                metric.as_str()
            )));
        }

        let existing = TenantUsageStat::find()
            .filter(Column::TenantId.eq(tenant_id))
            .filter(Column::Metric.eq(metric))
            .filter(Column::PeriodStart.eq(period_start))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        match existing {
            Some(row) => {
                let mut active = row.into_active_model();
                active.value = Set(value);
                active.updated_at = Set(now.fixed_offset());
                active
                    .update(self.db)
                    .await
                    .map_err(RepositoryError::database_error)
            }
            None => UsageActiveModel {
                id: Set(Uuid::new_v4()),
                tenant_id: Set(tenant_id),
                metric: Set(metric),
                period_start: Set(period_start),
                value: Set(value),
                updated_at: Set(now.fixed_offset()),
            }
            .insert(self.db)
            .await
            .map_err(|e| RepositoryError::from_write(e, "usage row was created concurrently")),
        }
    }

    /// History for one tenant, newest period first.
    pub async fn list_for_tenant(
        &self,
        tenant_id: Uuid,
        since: Option<NaiveDate>,
    ) -> Result<Vec<UsageModel>, RepositoryError> {
        let mut query = TenantUsageStat::find().filter(Column::TenantId.eq(tenant_id));
        if let Some(since) = since {
            query = query.filter(Column::PeriodStart.gte(since));
        }

        query
            .order_by_desc(Column::PeriodStart)
            .order_by_asc(Column::Metric)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Sum of every metric across all tenants, per period starting on or after `since`.
    pub async fn totals_by_period_and_metric(
        &self,
        since: NaiveDate,
    ) -> Result<BTreeMap<(NaiveDate, UsageMetric), i64>, RepositoryError> {
        let rows = TenantUsageStat::find()
            .filter(Column::PeriodStart.gte(since))
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        let mut totals = BTreeMap::new();
        for row in rows {
            *totals.entry((row.period_start, row.metric)).or_insert(0i64) += row.value;
        }
        Ok(totals)
    }

    /// Sum of `metric` across all tenants, per period starting on or after `since`.
    pub async fn totals_by_period(
        &self,
        metric: UsageMetric,
        since: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, i64>, RepositoryError> {
        let rows = TenantUsageStat::find()
            .filter(Column::Metric.eq(metric))
            .filter(Column::PeriodStart.gte(since))
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        let mut totals = BTreeMap::new();
        for row in rows {
            *totals.entry(row.period_start).or_insert(0i64) += row.value;
        }
        Ok(totals)
    }
}
