//! # MFA System Connection Repository
//!
//! One connection row per tenant. The reconciler writes contact outcomes
//! through [`ConnectionRepository::apply_contact`]; operators change the
//! security controls and may disconnect.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, PaginatorTrait,
    QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::mfa_system_connection::{
    ActiveModel as ConnectionActiveModel, Column, ConnectionStatus, Entity as MfaSystemConnection,
    Model as ConnectionModel,
};

/// Totals last reported by the remote system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RemoteTotals {
    pub total_users: i64,
    pub active_users: i64,
    pub total_authentications: i64,
}

/// Outcome of one contact with the remote system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactOutcome {
    pub status: ConnectionStatus,
    pub last_error: Option<String>,
    /// Present only when the contact succeeded
    pub totals: Option<RemoteTotals>,
}

impl ContactOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }
}

/// Operator security controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SecurityControls {
    pub admin_locked: bool,
    pub force_connection: bool,
    pub can_disconnect: bool,
}

pub struct ConnectionRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> ConnectionRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    pub async fn create_pending(
        &self,
        tenant_id: Uuid,
        system_url: &str,
        connection_key: &str,
    ) -> Result<ConnectionModel, RepositoryError> {
        let now = Utc::now().fixed_offset();
        ConnectionActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant_id),
            system_url: Set(system_url.to_string()),
            connection_key: Set(connection_key.to_string()),
            remote_tenant_id: Set(None),
            is_connected: Set(false),
            status: Set(ConnectionStatus::Pending),
            last_sync: Set(None),
            last_attempt_at: Set(None),
            last_error: Set(None),
            total_users: Set(0),
            active_users: Set(0),
            total_authentications: Set(0),
            admin_locked: Set(true),
            force_connection: Set(true),
            can_disconnect: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db)
        .await
        .map_err(|e| RepositoryError::from_write(e, "tenant already has a connection"))
    }

    pub async fn find_by_tenant(
        &self,
        tenant_id: Uuid,
    ) -> Result<Option<ConnectionModel>, RepositoryError> {
        MfaSystemConnection::find()
            .filter(Column::TenantId.eq(tenant_id))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn get_by_tenant(&self, tenant_id: Uuid) -> Result<ConnectionModel, RepositoryError> {
        self.find_by_tenant(tenant_id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("MFA system connection", tenant_id))
    }

    pub async fn count_connected(&self) -> Result<u64, RepositoryError> {
        MfaSystemConnection::find()
            .filter(Column::IsConnected.eq(true))
            .count(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Record the result of contacting the remote system.
    ///
    /// Successful contacts refresh `last_sync`; every contact refreshes
    /// `last_attempt_at`. Remote totals are only replaced on success.
    pub async fn apply_contact(
        &self,
        existing: ConnectionModel,
        outcome: &ContactOutcome,
        at: DateTime<Utc>,
    ) -> Result<ConnectionModel, RepositoryError> {
        let at = at.fixed_offset();
        let mut active = existing.into_active_model();
        active.status = Set(outcome.status);
        active.is_connected = Set(outcome.succeeded());
        active.last_error = Set(outcome.last_error.clone());
        active.last_attempt_at = Set(Some(at));
        if outcome.succeeded() {
            active.last_sync = Set(Some(at));
        }
        if let Some(totals) = outcome.totals {
            active.total_users = Set(totals.total_users);
            active.active_users = Set(totals.active_users);
            active.total_authentications = Set(totals.total_authentications);
        }
        active.updated_at = Set(at);

        active
            .update(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Store the identifier the remote system assigned at registration.
    pub async fn record_registration(
        &self,
        tenant_id: Uuid,
        remote_tenant_id: &str,
        at: DateTime<Utc>,
    ) -> Result<ConnectionModel, RepositoryError> {
        let existing = self.get_by_tenant(tenant_id).await?;
        let at = at.fixed_offset();
        let mut active = existing.into_active_model();
        active.remote_tenant_id = Set(Some(remote_tenant_id.to_string()));
        active.status = Set(ConnectionStatus::Connected);
        active.is_connected = Set(true);
        active.last_error = Set(None);
        active.last_attempt_at = Set(Some(at));
        active.last_sync = Set(Some(at));
        active.updated_at = Set(at);

        active
            .update(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn update_security(
        &self,
        tenant_id: Uuid,
        controls: SecurityControls,
    ) -> Result<ConnectionModel, RepositoryError> {
        let existing = self.get_by_tenant(tenant_id).await?;
        let mut active = existing.into_active_model();
        active.admin_locked = Set(controls.admin_locked);
        active.force_connection = Set(controls.force_connection);
        active.can_disconnect = Set(controls.can_disconnect);
        active.updated_at = Set(Utc::now().fixed_offset());

        active
            .update(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Mark the connection disconnected. Callers check the security controls first.
    pub async fn disconnect(&self, existing: ConnectionModel) -> Result<ConnectionModel, RepositoryError> {
        let mut active = existing.into_active_model();
        active.is_connected = Set(false);
        active.status = Set(ConnectionStatus::Disconnected);
        active.updated_at = Set(Utc::now().fixed_offset());

        active
            .update(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn rotate_key(
        &self,
        tenant_id: Uuid,
        connection_key: &str,
    ) -> Result<ConnectionModel, RepositoryError> {
        let existing = self.get_by_tenant(tenant_id).await?;
        let mut active = existing.into_active_model();
        active.connection_key = Set(connection_key.to_string());
        active.updated_at = Set(Utc::now().fixed_offset());

        active
            .update(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }
}
