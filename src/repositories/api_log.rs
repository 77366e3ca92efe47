//! # Tenant API Log Repository (append-only)

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use sea_orm::sea_query::Condition;
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::tenant_api_log::{
    ActiveModel as ApiLogActiveModel, Column, Entity as TenantApiLog, Model as ApiLogModel,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApiLog {
    pub tenant_id: Uuid,
    pub method: String,
    pub endpoint: String,
    /// `0` when no HTTP response was received
    pub status_code: i32,
    pub response_time_ms: i64,
    pub error_message: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Request volume over a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApiErrorCounts {
    pub total: u64,
    pub errors: u64,
}

impl ApiErrorCounts {
    /// Error percentage in `0.0..=100.0`; zero when there was no traffic.
    pub fn error_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.errors as f64 * 100.0 / self.total as f64
        }
    }
}

pub struct ApiLogRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> ApiLogRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    pub async fn record(&self, entry: NewApiLog) -> Result<ApiLogModel, RepositoryError> {
        ApiLogActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(entry.tenant_id),
            method: Set(entry.method),
            endpoint: Set(entry.endpoint),
            status_code: Set(entry.status_code),
            response_time_ms: Set(entry.response_time_ms.max(0)),
            error_message: Set(entry.error_message),
            ip_address: Set(entry.ip_address),
            user_agent: Set(entry.user_agent),
            timestamp: Set(entry.timestamp.fixed_offset()),
        }
        .insert(self.db)
        .await
        .map_err(RepositoryError::database_error)
    }

    /// Most recent first.
    pub async fn list_for_tenant(
        &self,
        tenant_id: Uuid,
        limit: u64,
    ) -> Result<Vec<ApiLogModel>, RepositoryError> {
        TenantApiLog::find()
            .filter(Column::TenantId.eq(tenant_id))
            .order_by_desc(Column::Timestamp)
            .limit(limit)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Every call since `since`, oldest first.
    pub async fn list_since(&self, since: DateTime<Utc>) -> Result<Vec<ApiLogModel>, RepositoryError> {
        TenantApiLog::find()
            .filter(Column::Timestamp.gte(since.fixed_offset()))
            .order_by_asc(Column::Timestamp)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Calls and failed calls (no response or status >= 400) since `since`.
    pub async fn error_counts_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<ApiErrorCounts, RepositoryError> {
        let since = since.fixed_offset();
        let total = TenantApiLog::find()
            .filter(Column::Timestamp.gte(since))
            .count(self.db)
            .await
            .map_err(RepositoryError::database_error)?;
        let errors = TenantApiLog::find()
            .filter(Column::Timestamp.gte(since))
            .filter(
                Condition::any()
                    .add(Column::StatusCode.gte(400))
                    .add(Column::StatusCode.eq(0)),
            )
            .count(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        Ok(ApiErrorCounts { total, errors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_rate_handles_empty_window() {
        assert_eq!(ApiErrorCounts::default().error_rate(), 0.0);
        let counts = ApiErrorCounts {
            total: 40,
            errors: 2,
        };
        assert!((counts.error_rate() - 5.0).abs() < f64::EPSILON);
    }
}
