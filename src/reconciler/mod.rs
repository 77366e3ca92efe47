//! Sync Reconciler
//!
//! Pulls usage counters from the remote MFA system for each tenant and
//! reconciles them with the local usage records and connection state.
//!
//! Each tenant is reconciled independently: the remote call happens first,
//! then the change plan is built and applied inside one transaction. A remote
//! failure or a rejected write only affects that tenant's outcome; losing the
//! database connection aborts the run.

pub mod plan;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use metrics::counter;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, TransactionTrait};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::mfa::{MfaApi, MfaClientError, TenantIdentity, TenantStats, endpoints};
use crate::models::tenant::Model as TenantModel;
use crate::models::tenant_usage_stat::UsagePeriod;
use crate::repositories::api_log::NewApiLog;
use crate::repositories::notification::NewNotification;
use crate::repositories::{
    ApiLogRepository, ConnectionRepository, NotificationRepository, SettingsRepository,
    TenantRepository, UsageStatsRepository,
};

pub use plan::{
    AlertPolicy, ChangePlan, ConnectionState, PlannedNotification, TenantOutcome, UsageAction,
    UsageChange, plan_usage_changes,
};

/// Configuration for the sync reconciler
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Period the remote counters accumulate over
    pub usage_period: UsagePeriod,
    /// Recorded on connection rows created during a sync
    pub system_url: String,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            usage_period: UsagePeriod::Monthly,
            system_url: "http://localhost:8000".to_string(),
        }
    }
}

/// Which tenants a run covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTarget {
    AllActive,
    Tenant(Uuid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    pub target: SyncTarget,
    /// Compute and report changes without writing anything
    pub dry_run: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            target: SyncTarget::AllActive,
            dry_run: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("tenant {0} not found")]
    TenantNotFound(Uuid),
    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),
    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

impl ReconcileError {
    /// Storage is unreachable, so no other tenant can be written either.
    pub fn is_systemic(&self) -> bool {
        match self {
            ReconcileError::Database(err)
            | ReconcileError::Storage(RepositoryError::Database(err)) => {
                matches!(err, DbErr::Conn(_) | DbErr::ConnectionAcquire(_))
            }
            _ => false,
        }
    }
}

/// Result for one tenant
#[derive(Debug, Clone, Serialize)]
pub struct TenantReport {
    pub tenant_id: Uuid,
    pub name: String,
    pub domain: String,
    pub outcome: TenantOutcome,
    pub changes: usize,
    pub usage: Vec<UsageChange>,
    pub connection_changed: bool,
    /// `None` when the tenant's writes failed
    pub connection: Option<ConnectionState>,
    pub notifications: Vec<PlannedNotification>,
    pub error: Option<String>,
    pub response_time_ms: i64,
}

impl TenantReport {
    fn storage_failure(tenant: &TenantModel, err: &ReconcileError, response_time_ms: i64) -> Self {
        Self {
            tenant_id: tenant.id,
            name: tenant.name.clone(),
            domain: tenant.domain.clone(),
            outcome: TenantOutcome::StorageError,
            changes: 0,
            usage: Vec::new(),
            connection_changed: false,
            connection: None,
            notifications: Vec::new(),
            error: Some(err.to_string()),
            response_time_ms,
        }
    }
}

/// Counts per outcome
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncTotals {
    pub tenants: usize,
    pub changes: usize,
    pub outcomes: BTreeMap<TenantOutcome, usize>,
}

impl SyncTotals {
    pub fn count(&self, outcome: TenantOutcome) -> usize {
        self.outcomes.get(&outcome).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub dry_run: bool,
    pub period_start: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub tenants: Vec<TenantReport>,
}

impl SyncReport {
    pub fn totals(&self) -> SyncTotals {
        let mut totals = SyncTotals {
            tenants: self.tenants.len(),
            ..SyncTotals::default()
        };
        for tenant in &self.tenants {
            totals.changes += tenant.changes;
            *totals.outcomes.entry(tenant.outcome).or_default() += 1;
        }
        totals
    }

    pub fn has_hard_failure(&self) -> bool {
        self.tenants.iter().any(|t| t.outcome.is_hard_failure())
    }
}

pub struct SyncReconciler {
    db: Arc<DatabaseConnection>,
    client: Arc<dyn MfaApi>,
    config: ReconcilerConfig,
}

impl SyncReconciler {
    pub fn new(
        db: Arc<DatabaseConnection>,
        client: Arc<dyn MfaApi>,
        config: ReconcilerConfig,
    ) -> Self {
        Self { db, client, config }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    pub async fn run(&self, options: &SyncOptions) -> Result<SyncReport, ReconcileError> {
        self.run_at(options, Utc::now()).await
    }

    /// Run against an explicit clock. The period and dedupe keys derive from
    /// `now`; contact timestamps advance from it as the run progresses.
    #[instrument(skip(self), fields(dry_run = options.dry_run))]
    pub async fn run_at(
        &self,
        options: &SyncOptions,
        now: DateTime<Utc>,
    ) -> Result<SyncReport, ReconcileError> {
        let run_clock = Instant::now();
        let tenants = self.select_tenants(options.target).await?;
        let alerts = SettingsRepository::new(self.db.as_ref())
            .load()
            .await?
            .alert_policy();
        let period_start = self.config.usage_period.period_start(now);
        info!(
            tenants = tenants.len(),
            %period_start,
            "Starting tenant usage sync"
        );

        let context = TenantContext {
            period_start,
            now,
            run_clock,
            alerts,
            dry_run: options.dry_run,
        };
        let mut reports = Vec::with_capacity(tenants.len());
        for tenant in &tenants {
            let report = self.reconcile_tenant(tenant, &context).await?;
            counter!(
                "tenant_sync_outcomes_total",
                "outcome" => report.outcome.as_str(),
                "dry_run" => if options.dry_run { "true" } else { "false" }
            )
            .increment(1);
            reports.push(report);
        }

        let report = SyncReport {
            dry_run: options.dry_run,
            period_start,
            started_at: now,
            tenants: reports,
        };
        let totals = report.totals();
        info!(
            tenants = totals.tenants,
            changes = totals.changes,
            hard_failure = report.has_hard_failure(),
            "Tenant usage sync finished"
        );
        Ok(report)
    }

    async fn select_tenants(&self, target: SyncTarget) -> Result<Vec<TenantModel>, ReconcileError> {
        let repo = TenantRepository::new(self.db.as_ref());
        match target {
            SyncTarget::AllActive => Ok(repo.list_active().await?),
            SyncTarget::Tenant(id) => repo
                .find_by_id(id)
                .await?
                .map(|tenant| vec![tenant])
                .ok_or(ReconcileError::TenantNotFound(id)),
        }
    }

    #[instrument(skip(self, tenant, context), fields(tenant_id = %tenant.id, domain = %tenant.domain))]
    async fn reconcile_tenant(
        &self,
        tenant: &TenantModel,
        context: &TenantContext,
    ) -> Result<TenantReport, ReconcileError> {
        let identity = TenantIdentity::from(tenant);
        let started = Instant::now();
        let stats = self.client.get_tenant_stats(&identity).await;
        let response_time_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
        let contacted_at = context.contacted_at();

        if let Err(err) = &stats {
            warn!(kind = err.kind(), error = %err, "Remote stats call failed");
        }

        let planned = if context.dry_run {
            build_tenant_plan(self.db.as_ref(), tenant.id, context, &stats).await
        } else {
            self.apply_in_transaction(tenant, context, &stats, contacted_at, response_time_ms)
                .await
        };
        let plan = match planned {
            Ok(plan) => plan,
            Err(err) if err.is_systemic() => return Err(err),
            Err(err) => {
                error!(error = %err, "Tenant writes failed and were rolled back");
                return Ok(TenantReport::storage_failure(tenant, &err, response_time_ms));
            }
        };

        info!(
            outcome = plan.outcome.as_str(),
            changes = plan.change_count(),
            "Tenant reconciled"
        );

        Ok(TenantReport {
            tenant_id: tenant.id,
            name: tenant.name.clone(),
            domain: tenant.domain.clone(),
            outcome: plan.outcome,
            changes: plan.change_count(),
            connection_changed: plan.connection.is_change(),
            connection: Some(plan.connection.to),
            usage: plan.usage,
            notifications: plan.notifications,
            error: stats.err().map(|e| e.to_string()),
            response_time_ms,
        })
    }

    async fn apply_in_transaction(
        &self,
        tenant: &TenantModel,
        context: &TenantContext,
        stats: &Result<TenantStats, MfaClientError>,
        contacted_at: DateTime<Utc>,
        response_time_ms: i64,
    ) -> Result<ChangePlan, ReconcileError> {
        let txn = self.db.begin().await?;
        let applied = async {
            let plan = build_tenant_plan(&txn, tenant.id, context, stats).await?;
            apply_plan(&txn, tenant, &plan, stats, &self.config, contacted_at, response_time_ms)
                .await?;
            Ok::<_, ReconcileError>(plan)
        }
        .await;

        match applied {
            Ok(plan) => {
                txn.commit().await?;
                Ok(plan)
            }
            Err(err) => {
                txn.rollback().await?;
                Err(err)
            }
        }
    }
}

/// Per-run values shared by every tenant in the run.
struct TenantContext {
    period_start: NaiveDate,
    now: DateTime<Utc>,
    run_clock: Instant,
    alerts: AlertPolicy,
    dry_run: bool,
}

impl TenantContext {
    /// `now` plus the time the run has taken so far.
    fn contacted_at(&self) -> DateTime<Utc> {
        self.now + TimeDelta::from_std(self.run_clock.elapsed()).unwrap_or_default()
    }
}

async fn build_tenant_plan<C: ConnectionTrait>(
    db: &C,
    tenant_id: Uuid,
    context: &TenantContext,
    stats: &Result<TenantStats, MfaClientError>,
) -> Result<ChangePlan, ReconcileError> {
    let period_start = context.period_start;
    let stored_usage = UsageStatsRepository::new(db)
        .find_period(tenant_id, period_start)
        .await?
        .into_iter()
        .map(|(metric, row)| (metric, row.value))
        .collect();
    let connection = ConnectionRepository::new(db).find_by_tenant(tenant_id).await?;

    let today = context.now.date_naive();
    let notifications = NotificationRepository::new(db);
    let mut existing_keys = Vec::new();
    for key in plan::candidate_keys(period_start, today, stats, &stored_usage) {
        if notifications.exists_with_key(tenant_id, &key).await? {
            existing_keys.push(key);
        }
    }

    Ok(plan::build_plan(plan::PlanInputs {
        period_start,
        today,
        stats,
        stored_usage,
        connection: connection.as_ref(),
        existing_keys: &existing_keys,
        alerts: context.alerts,
    }))
}

async fn apply_plan<C: ConnectionTrait>(
    db: &C,
    tenant: &TenantModel,
    plan: &ChangePlan,
    stats: &Result<TenantStats, MfaClientError>,
    config: &ReconcilerConfig,
    contacted_at: DateTime<Utc>,
    response_time_ms: i64,
) -> Result<(), ReconcileError> {
    let usage = UsageStatsRepository::new(db);
    for change in plan.usage.iter().filter(|c| c.writes()) {
        usage
            .upsert(tenant.id, change.metric, plan.period_start, change.remote, contacted_at)
            .await?;
    }

    let connections = ConnectionRepository::new(db);
    let existing = match connections.find_by_tenant(tenant.id).await? {
        Some(existing) => existing,
        None => {
            connections
                .create_pending(tenant.id, &config.system_url, &tenant.api_key)
                .await?
        }
    };
    connections
        .apply_contact(existing, &plan.connection.outcome, contacted_at)
        .await?;

    let notifications = NotificationRepository::new(db);
    for planned in &plan.notifications {
        notifications
            .create(NewNotification {
                tenant_id: tenant.id,
                kind: planned.kind,
                title: planned.title.clone(),
                message: planned.message.clone(),
                dedupe_key: Some(planned.dedupe_key.clone()),
            })
            .await?;
    }

    // An unchanged successful contact only refreshes the heartbeat above.
    if stats.is_ok() && plan.change_count() == 0 {
        return Ok(());
    }

    let (status_code, error_message) = match stats {
        Ok(_) => (200, None),
        Err(err) => (i32::from(err.status().unwrap_or(0)), Some(err.to_string())),
    };
    ApiLogRepository::new(db)
        .record(NewApiLog {
            tenant_id: tenant.id,
            method: "GET".to_string(),
            endpoint: endpoints::TENANT_STATS.to_string(),
            status_code,
            response_time_ms,
            error_message,
            ip_address: None,
            user_agent: Some(format!("MFA-Control-Panel/{}", env!("CARGO_PKG_VERSION"))),
            timestamp: contacted_at,
        })
        .await?;

    if stats.is_ok() {
        TenantRepository::new(db)
            .touch_activity(tenant.id, contacted_at)
            .await?;
    }

    Ok(())
}
