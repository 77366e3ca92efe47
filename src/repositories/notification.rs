//! # Tenant Notification Repository
//!
//! Notifications are insert-only. A dedupe key makes a write idempotent:
//! a second write with the same key for the same tenant is dropped.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::error::{RepositoryError, is_unique_violation};
use crate::models::tenant_notification::{
    ActiveModel as NotificationActiveModel, Column, Entity as TenantNotification,
    Model as NotificationModel, NotificationKind,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub tenant_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub dedupe_key: Option<String>,
}

pub struct NotificationRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> NotificationRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Insert a notification; returns `None` when the dedupe key was already used.
    pub async fn create(
        &self,
        notification: NewNotification,
    ) -> Result<Option<NotificationModel>, RepositoryError> {
        if notification.title.trim().is_empty() {
            return Err(RepositoryError::validation_error(
                "notification title cannot be empty",
            ));
        }

        if let Some(key) = notification.dedupe_key.as_deref()
            && self.exists_with_key(notification.tenant_id, key).await?
        {
            return Ok(None);
        }

        let inserted = NotificationActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(notification.tenant_id),
            kind: Set(notification.kind),
            title: Set(notification.title),
            message: Set(notification.message),
            dedupe_key: Set(notification.dedupe_key),
            is_read: Set(false),
            created_at: Set(Utc::now().fixed_offset()),
        }
        .insert(self.db)
        .await;

        match inserted {
            Ok(model) => Ok(Some(model)),
            Err(e) if is_unique_violation(&e) => Ok(None),
            Err(e) => Err(RepositoryError::database_error(e)),
        }
    }

    pub async fn exists_with_key(
        &self,
        tenant_id: Uuid,
        dedupe_key: &str,
    ) -> Result<bool, RepositoryError> {
        let count = TenantNotification::find()
            .filter(Column::TenantId.eq(tenant_id))
            .filter(Column::DedupeKey.eq(dedupe_key))
            .count(self.db)
            .await
            .map_err(RepositoryError::database_error)?;
        Ok(count > 0)
    }

    /// Most recent first.
    pub async fn list_for_tenant(
        &self,
        tenant_id: Uuid,
        limit: u64,
    ) -> Result<Vec<NotificationModel>, RepositoryError> {
        TenantNotification::find()
            .filter(Column::TenantId.eq(tenant_id))
            .order_by_desc(Column::CreatedAt)
            .limit(limit)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn count_for_tenant(&self, tenant_id: Uuid) -> Result<u64, RepositoryError> {
        TenantNotification::find()
            .filter(Column::TenantId.eq(tenant_id))
            .count(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }
}
