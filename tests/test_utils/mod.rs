//! Test utilities shared by the integration tests.
//!
//! Sets up in-memory SQLite databases with migrations applied, seeds tenants
//! and usage rows, and points an [`MfaClient`] at a wiremock server.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use serde_json::json;
use url::Url;
use uuid::Uuid;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mfa_control_panel::mfa::{MfaApi, MfaClient, MfaClientConfig};
use mfa_control_panel::models::tenant::{Model as TenantModel, TenantPlan, TenantStatus};
use mfa_control_panel::models::tenant_usage_stat::UsageMetric;
use mfa_control_panel::reconciler::{ReconcilerConfig, SyncReconciler};
use mfa_control_panel::repositories::tenant::NewTenant;
use mfa_control_panel::repositories::{
    ConnectionRepository, FeaturesRepository, TenantRepository, UsageStatsRepository,
};

pub const PANEL_KEY: &str = "panel-test-key";

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:")
        .await
        .context("connecting to in-memory sqlite")?;
    Migrator::up(&db, None).await.context("running migrations")?;
    Ok(db)
}

pub async fn setup_test_db_arc() -> Result<Arc<DatabaseConnection>> {
    Ok(Arc::new(setup_test_db().await?))
}

/// Fixed clock used by reconciliation tests: 2025-03-17 10:00 UTC.
pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 17, 10, 0, 0).unwrap()
}

/// First day of the monthly period containing [`test_now`].
pub fn test_period() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
}

/// Creates a tenant with default features and moves it to `status`.
pub async fn create_tenant(
    db: &DatabaseConnection,
    domain: &str,
    status: TenantStatus,
) -> Result<TenantModel> {
    let tenants = TenantRepository::new(db);
    let tenant = tenants
        .create(
            NewTenant {
                name: format!("Tenant {domain}"),
                domain: domain.to_string(),
                additional_domains: Vec::new(),
                contact_name: "Ops".to_string(),
                contact_email: format!("ops@{domain}"),
                plan: TenantPlan::Basic,
                settings: None,
            },
            TenantPlan::Basic.limits(),
        )
        .await?;
    FeaturesRepository::new(db)
        .create_for_plan(tenant.id, tenant.plan)
        .await?;

    let tenant = match status {
        TenantStatus::Pending => tenant,
        TenantStatus::Active => tenants.set_status(tenant.id, TenantStatus::Active).await?,
        other => {
            tenants.set_status(tenant.id, TenantStatus::Active).await?;
            tenants.set_status(tenant.id, other).await?
        }
    };
    Ok(tenant)
}

/// Active tenant with a pending connection row.
pub async fn create_active_tenant(db: &DatabaseConnection, domain: &str) -> Result<TenantModel> {
    let tenant = create_tenant(db, domain, TenantStatus::Active).await?;
    ConnectionRepository::new(db)
        .create_pending(tenant.id, "http://mfa.test", &tenant.api_key)
        .await?;
    Ok(tenant)
}

/// Stores a usage value for the test period.
pub async fn seed_usage(
    db: &DatabaseConnection,
    tenant_id: Uuid,
    metric: UsageMetric,
    value: i64,
) -> Result<()> {
    UsageStatsRepository::new(db)
        .upsert(tenant_id, metric, test_period(), value, test_now())
        .await?;
    Ok(())
}

pub async fn stored_usage(
    db: &DatabaseConnection,
    tenant_id: Uuid,
    metric: UsageMetric,
) -> Result<Option<i64>> {
    let rows = UsageStatsRepository::new(db)
        .find_period(tenant_id, test_period())
        .await?;
    Ok(rows.get(&metric).map(|row| row.value))
}

/// Stats payload as the MFA system reports it.
pub fn stats_body(monthly_authentications: u64) -> serde_json::Value {
    json!({
        "total_users": 25,
        "active_users": 10,
        "total_authentications": 900,
        "monthly_authentications": monthly_authentications,
        "api_calls": 300,
        "error_count": 2,
        "success_rate": 99.3
    })
}

/// Answer the stats endpoint for one tenant.
pub async fn mock_stats(server: &MockServer, tenant_id: Uuid, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/api/tenant/stats/"))
        .and(header("X-Tenant-ID", tenant_id.to_string().as_str()))
        .respond_with(response)
        .mount(server)
        .await;
}

pub fn client_for(server: &MockServer, timeout: Duration) -> Arc<dyn MfaApi> {
    let config = MfaClientConfig::new(Url::parse(&server.uri()).unwrap(), PANEL_KEY)
        .with_timeout(timeout);
    Arc::new(MfaClient::new(config).unwrap())
}

pub fn reconciler(db: Arc<DatabaseConnection>, server: &MockServer) -> SyncReconciler {
    reconciler_with_timeout(db, server, Duration::from_secs(5))
}

pub fn reconciler_with_timeout(
    db: Arc<DatabaseConnection>,
    server: &MockServer,
    timeout: Duration,
) -> SyncReconciler {
    SyncReconciler::new(
        db,
        client_for(server, timeout),
        ReconcilerConfig {
            system_url: server.uri(),
            ..ReconcilerConfig::default()
        },
    )
}
