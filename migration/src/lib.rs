//! Database migrations for the MFA control panel.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2025_06_01_000001_create_tenants;
mod m2025_06_01_000002_create_tenant_features;
mod m2025_06_01_000003_create_tenant_usage_stats;
mod m2025_06_01_000004_create_mfa_system_connections;
mod m2025_06_01_000005_create_tenant_notifications;
mod m2025_06_01_000006_create_tenant_api_logs;
mod m2025_06_01_000007_create_system_settings;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_06_01_000001_create_tenants::Migration),
            Box::new(m2025_06_01_000002_create_tenant_features::Migration),
            Box::new(m2025_06_01_000003_create_tenant_usage_stats::Migration),
            Box::new(m2025_06_01_000004_create_mfa_system_connections::Migration),
            Box::new(m2025_06_01_000005_create_tenant_notifications::Migration),
            Box::new(m2025_06_01_000006_create_tenant_api_logs::Migration),
            Box::new(m2025_06_01_000007_create_system_settings::Migration),
        ]
    }
}
