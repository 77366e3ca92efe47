//! Migration to create the tenant_features table (one row per tenant).

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TenantFeatures::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TenantFeatures::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TenantFeatures::TenantId)
                            .uuid()
                            .not_null()
                            .unique_key(),
                    )
                    .col(flag(TenantFeatures::EnableTotp, true))
                    .col(flag(TenantFeatures::EnableEmail, true))
                    .col(flag(TenantFeatures::EnableSms, false))
                    .col(flag(TenantFeatures::EnablePasskeys, false))
                    .col(flag(TenantFeatures::EnableBackupCodes, true))
                    .col(flag(TenantFeatures::EnableRiskAnalysis, false))
                    .col(flag(TenantFeatures::EnableDeviceTracking, false))
                    .col(flag(TenantFeatures::EnableGeoBlocking, false))
                    .col(flag(TenantFeatures::EnableSessionManagement, false))
                    .col(flag(TenantFeatures::EnableAuditLogs, true))
                    .col(flag(TenantFeatures::AllowCustomBranding, false))
                    .col(flag(TenantFeatures::AllowCustomDomains, false))
                    .col(flag(TenantFeatures::AllowWebhookNotifications, false))
                    .col(flag(TenantFeatures::PrioritySupport, false))
                    .col(flag(TenantFeatures::DedicatedSupport, false))
                    .col(
                        ColumnDef::new(TenantFeatures::ApiRateLimitPerMinute)
                            .integer()
                            .not_null()
                            .default(60),
                    )
                    .col(
                        ColumnDef::new(TenantFeatures::ApiRateLimitPerHour)
                            .integer()
                            .not_null()
                            .default(1000),
                    )
                    .col(
                        ColumnDef::new(TenantFeatures::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tenant_features_tenant_id")
                            .from(TenantFeatures::Table, TenantFeatures::TenantId)
                            .to(Tenants::Table, Tenants::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TenantFeatures::Table).to_owned())
            .await
    }
}

fn flag(column: TenantFeatures, default: bool) -> ColumnDef {
    ColumnDef::new(column)
        .boolean()
        .not_null()
        .default(default)
        .to_owned()
}

#[derive(DeriveIden, Clone, Copy)]
enum TenantFeatures {
    Table,
    Id,
    TenantId,
    EnableTotp,
    EnableEmail,
    EnableSms,
    EnablePasskeys,
    EnableBackupCodes,
    EnableRiskAnalysis,
    EnableDeviceTracking,
    EnableGeoBlocking,
    EnableSessionManagement,
    EnableAuditLogs,
    AllowCustomBranding,
    AllowCustomDomains,
    AllowWebhookNotifications,
    PrioritySupport,
    DedicatedSupport,
    ApiRateLimitPerMinute,
    ApiRateLimitPerHour,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Tenants {
    Table,
    Id,
}
