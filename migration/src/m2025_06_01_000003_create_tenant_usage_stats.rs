//! Migration to create the tenant_usage_stats table.
//!
//! One row per (tenant, metric, period_start).

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TenantUsageStats::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TenantUsageStats::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TenantUsageStats::TenantId).uuid().not_null())
                    .col(ColumnDef::new(TenantUsageStats::Metric).text().not_null())
                    .col(
                        ColumnDef::new(TenantUsageStats::PeriodStart)
                            .date()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TenantUsageStats::Value)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(TenantUsageStats::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tenant_usage_stats_tenant_id")
                            .from(TenantUsageStats::Table, TenantUsageStats::TenantId)
                            .to(Tenants::Table, Tenants::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_tenant_usage_stats_tenant_metric_period")
                    .table(TenantUsageStats::Table)
                    .col(TenantUsageStats::TenantId)
                    .col(TenantUsageStats::Metric)
                    .col(TenantUsageStats::PeriodStart)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("uq_tenant_usage_stats_tenant_metric_period")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(TenantUsageStats::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum TenantUsageStats {
    Table,
    Id,
    TenantId,
    Metric,
    PeriodStart,
    Value,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Tenants {
    Table,
    Id,
}
