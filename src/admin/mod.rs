//! # Admin Service
//!
//! Operator-facing tenant management: registration, lifecycle actions, plan
//! and feature changes, connection security and the remote passthroughs.
//!
//! Local state is always written first and committed on its own. Mirroring a
//! change to the remote MFA system is best effort: a failed remote call is
//! recorded on the connection row and reported back, never rolled into the
//! local transaction.

pub mod analytics;
pub mod dashboard;

use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;
use chrono::Utc;
use sea_orm::{DatabaseConnection, DbErr, TransactionTrait};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, RepositoryError, forbidden, not_found, remote_error};
use crate::mfa::{
    AuthLogPage, AuthLogWindow, HealthStatus, MfaApi, MfaClientError, TenantIdentity,
    TenantRegistration, UsersPage, endpoints,
};
use crate::models::mfa_system_connection::Model as ConnectionModel;
use crate::models::system_settings::SystemSettings;
use crate::models::tenant::{Model as TenantModel, TenantPlan, TenantStatus};
use crate::models::tenant_features::{FeatureSet, Model as FeaturesModel};
use crate::models::tenant_notification::NotificationKind;
use crate::reconciler::plan::contact_outcome;
use crate::reconciler::{
    ReconcileError, SyncOptions, SyncReconciler, SyncReport, SyncTarget,
};
use crate::repositories::api_log::NewApiLog;
use crate::repositories::connection::{ContactOutcome, SecurityControls};
use crate::repositories::notification::NewNotification;
use crate::repositories::tenant::NewTenant;
use crate::repositories::{
    ApiLogRepository, ConnectionRepository, FeaturesRepository, NotificationRepository,
    SettingsRepository, TenantRepository,
};

#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("database error: {0}")]
    Database(#[from] DbErr),
    #[error(transparent)]
    Remote(#[from] MfaClientError),
    #[error(transparent)]
    Sync(#[from] ReconcileError),
    #[error("tenant {tenant_id} cannot disconnect: {reason}")]
    DisconnectBlocked { tenant_id: Uuid, reason: &'static str },
}

impl From<AdminError> for ApiError {
    fn from(error: AdminError) -> Self {
        match error {
            AdminError::Repository(err) => err.into(),
            AdminError::Database(err) => err.into(),
            AdminError::Remote(err) => remote_api_error(&err),
            AdminError::Sync(ReconcileError::TenantNotFound(id)) => {
                not_found("tenant", &id.to_string())
            }
            AdminError::Sync(ReconcileError::Storage(err)) => err.into(),
            AdminError::Sync(ReconcileError::Database(err)) => err.into(),
            AdminError::DisconnectBlocked { tenant_id, reason } => {
                forbidden("DISCONNECT_BLOCKED", "Disconnecting this tenant is not permitted")
                    .with_details(json!({ "tenant_id": tenant_id, "reason": reason }))
            }
        }
    }
}

fn remote_api_error(err: &MfaClientError) -> ApiError {
    match err {
        MfaClientError::Unauthorized { endpoint, status, .. } => ApiError::new(
            StatusCode::BAD_GATEWAY,
            "MFA_UNAUTHORIZED",
            "MFA system rejected the tenant credentials",
        )
        .with_details(json!({ "endpoint": endpoint, "status": status })),
        other => remote_error(other.endpoint(), &other.to_string()),
    }
}

/// Result of [`AdminService::register`]
#[derive(Debug, Clone)]
pub struct Registration {
    pub tenant: TenantModel,
    pub features: FeaturesModel,
    pub connection: ConnectionModel,
    /// Set when mirroring the registration to the remote system failed
    pub remote_error: Option<String>,
}

/// Local update plus the outcome of mirroring it remotely.
#[derive(Debug, Clone)]
pub struct Mirrored<T> {
    pub value: T,
    pub remote_error: Option<String>,
}

/// Closed set of operator actions on a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TenantAction {
    Activate,
    Suspend,
    Cancel,
    ChangePlan { plan: TenantPlan },
    RegenerateKeys,
    Sync {
        #[serde(default)]
        dry_run: bool,
    },
    Notify {
        kind: NotificationKind,
        title: String,
        message: String,
    },
}

impl TenantAction {
    pub fn name(&self) -> &'static str {
        match self {
            TenantAction::Activate => "activate",
            TenantAction::Suspend => "suspend",
            TenantAction::Cancel => "cancel",
            TenantAction::ChangePlan { .. } => "change_plan",
            TenantAction::RegenerateKeys => "regenerate_keys",
            TenantAction::Sync { .. } => "sync",
            TenantAction::Notify { .. } => "notify",
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ActionResult {
    pub tenant_id: Uuid,
    pub action: String,
    pub status: TenantStatus,
    pub plan: TenantPlan,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BulkActionItem {
    pub tenant_id: Uuid,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ActionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BulkActionReport {
    pub action: String,
    pub succeeded: usize,
    pub failed: usize,
    pub items: Vec<BulkActionItem>,
}

pub struct AdminService {
    db: Arc<DatabaseConnection>,
    client: Arc<dyn MfaApi>,
    reconciler: Arc<SyncReconciler>,
}

impl AdminService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        client: Arc<dyn MfaApi>,
        reconciler: Arc<SyncReconciler>,
    ) -> Self {
        Self {
            db,
            client,
            reconciler,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Create the tenant, its default features and a pending connection in one
    /// transaction, then register it with the remote system.
    ///
    /// Free-plan registrations are refused when the settings disallow them and
    /// otherwise take their limits from the settings.
    #[instrument(skip(self, request), fields(domain = %request.domain))]
    pub async fn register(&self, request: NewTenant) -> Result<Registration, AdminError> {
        let system_url = self.reconciler.config().system_url.clone();
        let settings = SettingsRepository::new(self.db.as_ref()).load().await?;
        if request.plan == TenantPlan::Free && !settings.allow_free_plan {
            return Err(RepositoryError::validation_error(
                "the free plan is not available for new tenants",
            )
            .into());
        }
        let limits = settings.limits_for(request.plan);

        let txn = self.db.begin().await?;
        let tenant = TenantRepository::new(&txn).create(request, limits).await?;
        let features = FeaturesRepository::new(&txn)
            .create_for_plan(tenant.id, tenant.plan)
            .await?;
        let connection = ConnectionRepository::new(&txn)
            .create_pending(tenant.id, &system_url, &tenant.api_key)
            .await?;
        txn.commit().await?;

        let identity = TenantIdentity::from(&tenant);
        let registration = TenantRegistration::new(&tenant, FeatureSet::from(&features));
        let started = Instant::now();
        let result = self.client.register_tenant(&identity, &registration).await;
        self.record_call(tenant.id, "POST", endpoints::TENANT_REGISTER, started, &result)
            .await?;

        let connections = ConnectionRepository::new(self.db.as_ref());
        let (connection, remote_error) = match result {
            Ok(remote_id) => {
                info!(tenant_id = %tenant.id, remote_id = %remote_id, "Tenant registered remotely");
                let updated = connections
                    .record_registration(tenant.id, &remote_id, Utc::now())
                    .await?;
                (updated, None)
            }
            Err(err) => {
                warn!(tenant_id = %tenant.id, error = %err, "Remote registration failed");
                let outcome = failure_outcome(err.clone());
                let updated = connections
                    .apply_contact(connection, &outcome, Utc::now())
                    .await?;
                (updated, Some(err.to_string()))
            }
        };

        Ok(Registration {
            tenant,
            features,
            connection,
            remote_error,
        })
    }

    /// Overwrite the feature flags and mirror them to the remote system.
    #[instrument(skip(self, features))]
    pub async fn update_features(
        &self,
        tenant_id: Uuid,
        features: &FeatureSet,
    ) -> Result<Mirrored<FeaturesModel>, AdminError> {
        let tenant = TenantRepository::new(self.db.as_ref()).get(tenant_id).await?;
        let updated = FeaturesRepository::new(self.db.as_ref())
            .update(tenant_id, features)
            .await?;
        let remote_error = self.mirror_features(&tenant, features).await?;
        Ok(Mirrored {
            value: updated,
            remote_error,
        })
    }

    pub async fn update_security(
        &self,
        tenant_id: Uuid,
        controls: SecurityControls,
    ) -> Result<ConnectionModel, AdminError> {
        let updated = ConnectionRepository::new(self.db.as_ref())
            .update_security(tenant_id, controls)
            .await?;
        info!(
            tenant_id = %tenant_id,
            admin_locked = controls.admin_locked,
            force_connection = controls.force_connection,
            can_disconnect = controls.can_disconnect,
            "Connection security controls updated"
        );
        Ok(updated)
    }

    /// Disconnect, subject to the connection's security controls.
    pub async fn disconnect(&self, tenant_id: Uuid) -> Result<ConnectionModel, AdminError> {
        let repo = ConnectionRepository::new(self.db.as_ref());
        let connection = repo.get_by_tenant(tenant_id).await?;

        if !connection.disconnect_allowed() {
            let reason = if connection.admin_locked {
                "connection is locked by an administrator"
            } else if connection.force_connection {
                "connection is required for this tenant"
            } else {
                "disconnecting is disabled for this tenant"
            };
            warn!(tenant_id = %tenant_id, reason, "Disconnect blocked");
            return Err(AdminError::DisconnectBlocked { tenant_id, reason });
        }

        Ok(repo.disconnect(connection).await?)
    }

    pub async fn settings(&self) -> Result<SystemSettings, AdminError> {
        Ok(SettingsRepository::new(self.db.as_ref()).load().await?)
    }

    pub async fn update_settings(
        &self,
        settings: &SystemSettings,
    ) -> Result<SystemSettings, AdminError> {
        Ok(SettingsRepository::new(self.db.as_ref())
            .update(settings)
            .await?)
    }

    pub async fn remote_health(&self) -> Result<HealthStatus, AdminError> {
        Ok(self.client.get_health().await?)
    }

    pub async fn remote_users(
        &self,
        tenant_id: Uuid,
        limit: u32,
        offset: u32,
    ) -> Result<UsersPage, AdminError> {
        let tenant = TenantRepository::new(self.db.as_ref()).get(tenant_id).await?;
        let started = Instant::now();
        let result = self
            .client
            .get_users(&TenantIdentity::from(&tenant), limit, offset)
            .await;
        self.record_call(tenant_id, "GET", endpoints::TENANT_USERS, started, &result)
            .await?;
        Ok(result?)
    }

    pub async fn remote_auth_logs(
        &self,
        tenant_id: Uuid,
        window: AuthLogWindow,
    ) -> Result<AuthLogPage, AdminError> {
        let tenant = TenantRepository::new(self.db.as_ref()).get(tenant_id).await?;
        let started = Instant::now();
        let result = self
            .client
            .get_auth_logs(&TenantIdentity::from(&tenant), window)
            .await;
        self.record_call(tenant_id, "GET", endpoints::TENANT_AUTH_LOGS, started, &result)
            .await?;
        Ok(result?)
    }

    pub async fn sync(&self, options: SyncOptions) -> Result<SyncReport, AdminError> {
        Ok(self.reconciler.run(&options).await?)
    }

    /// Apply one action to one tenant.
    #[instrument(skip(self, action), fields(action = action.name()))]
    pub async fn execute(
        &self,
        tenant_id: Uuid,
        action: &TenantAction,
    ) -> Result<ActionResult, AdminError> {
        let tenants = TenantRepository::new(self.db.as_ref());
        let mut remote_error = None;

        let (tenant, message) = match action {
            TenantAction::Activate => (
                tenants.set_status(tenant_id, TenantStatus::Active).await?,
                "Tenant activated".to_string(),
            ),
            TenantAction::Suspend => (
                tenants.set_status(tenant_id, TenantStatus::Suspended).await?,
                "Tenant suspended".to_string(),
            ),
            TenantAction::Cancel => (
                tenants.set_status(tenant_id, TenantStatus::Cancelled).await?,
                "Tenant cancelled".to_string(),
            ),
            TenantAction::ChangePlan { plan } => {
                let features = FeatureSet::for_plan(*plan);
                let limits = SettingsRepository::new(self.db.as_ref())
                    .load()
                    .await?
                    .limits_for(*plan);
                let txn = self.db.begin().await?;
                let tenant = TenantRepository::new(&txn)
                    .change_plan(tenant_id, *plan, limits)
                    .await?;
                FeaturesRepository::new(&txn)
                    .update(tenant_id, &features)
                    .await?;
                txn.commit().await?;
                remote_error = self.mirror_features(&tenant, &features).await?;
                (tenant, format!("Plan changed to {}", plan.as_str()))
            }
            TenantAction::RegenerateKeys => {
                let txn = self.db.begin().await?;
                let tenant = TenantRepository::new(&txn)
                    .regenerate_credentials(tenant_id)
                    .await?;
                let connections = ConnectionRepository::new(&txn);
                if connections.find_by_tenant(tenant_id).await?.is_some() {
                    connections.rotate_key(tenant_id, &tenant.api_key).await?;
                }
                txn.commit().await?;
                (tenant, "API credentials regenerated".to_string())
            }
            TenantAction::Sync { dry_run } => {
                let report = self
                    .sync(SyncOptions {
                        target: SyncTarget::Tenant(tenant_id),
                        dry_run: *dry_run,
                    })
                    .await?;
                let tenant = tenants.get(tenant_id).await?;
                let message = match report.tenants.first() {
                    Some(result) => format!(
                        "Sync finished: {} ({} changes)",
                        result.outcome.as_str(),
                        result.changes
                    ),
                    None => "Sync finished".to_string(),
                };
                remote_error = report.tenants.first().and_then(|r| r.error.clone());
                (tenant, message)
            }
            TenantAction::Notify {
                kind,
                title,
                message,
            } => {
                let tenant = tenants.get(tenant_id).await?;
                NotificationRepository::new(self.db.as_ref())
                    .create(NewNotification {
                        tenant_id,
                        kind: *kind,
                        title: title.clone(),
                        message: message.clone(),
                        dedupe_key: None,
                    })
                    .await?;
                (tenant, "Notification sent".to_string())
            }
        };

        Ok(ActionResult {
            tenant_id,
            action: action.name().to_string(),
            status: tenant.status,
            plan: tenant.plan,
            message,
            remote_error,
        })
    }

    /// Apply one action to many tenants; a failure never stops the rest.
    pub async fn execute_bulk(&self, tenant_ids: &[Uuid], action: &TenantAction) -> BulkActionReport {
        let mut items = Vec::with_capacity(tenant_ids.len());
        for &tenant_id in tenant_ids {
            let item = match self.execute(tenant_id, action).await {
                Ok(result) => BulkActionItem {
                    tenant_id,
                    success: true,
                    result: Some(result),
                    error: None,
                },
                Err(err) => {
                    warn!(tenant_id = %tenant_id, action = action.name(), error = %err, "Bulk action failed");
                    BulkActionItem {
                        tenant_id,
                        success: false,
                        result: None,
                        error: Some(err.to_string()),
                    }
                }
            };
            items.push(item);
        }

        let succeeded = items.iter().filter(|i| i.success).count();
        BulkActionReport {
            action: action.name().to_string(),
            succeeded,
            failed: items.len() - succeeded,
            items,
        }
    }

    async fn mirror_features(
        &self,
        tenant: &TenantModel,
        features: &FeatureSet,
    ) -> Result<Option<String>, AdminError> {
        let started = Instant::now();
        let result = self
            .client
            .update_features(&TenantIdentity::from(tenant), features)
            .await;
        self.record_call(tenant.id, "PUT", endpoints::TENANT_FEATURES, started, &result)
            .await?;

        match result {
            Ok(_) => Ok(None),
            Err(err) => {
                warn!(tenant_id = %tenant.id, error = %err, "Feature mirror failed");
                let connections = ConnectionRepository::new(self.db.as_ref());
                if let Some(existing) = connections.find_by_tenant(tenant.id).await? {
                    connections
                        .apply_contact(existing, &failure_outcome(err.clone()), Utc::now())
                        .await?;
                }
                Ok(Some(err.to_string()))
            }
        }
    }

    async fn record_call<T>(
        &self,
        tenant_id: Uuid,
        method: &str,
        endpoint: &str,
        started: Instant,
        result: &Result<T, MfaClientError>,
    ) -> Result<(), AdminError> {
        let (status_code, error_message) = match result {
            Ok(_) => (200, None),
            Err(err) => (i32::from(err.status().unwrap_or(0)), Some(err.to_string())),
        };
        ApiLogRepository::new(self.db.as_ref())
            .record(NewApiLog {
                tenant_id,
                method: method.to_string(),
                endpoint: endpoint.to_string(),
                status_code,
                response_time_ms: i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX),
                error_message,
                ip_address: None,
                user_agent: Some(format!("MFA-Control-Panel/{}", env!("CARGO_PKG_VERSION"))),
                timestamp: Utc::now(),
            })
            .await?;
        Ok(())
    }
}

fn failure_outcome(err: MfaClientError) -> ContactOutcome {
    contact_outcome(&Err(err))
}
