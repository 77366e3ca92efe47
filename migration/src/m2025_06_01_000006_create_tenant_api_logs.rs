//! Migration to create the append-only tenant_api_logs table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TenantApiLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TenantApiLogs::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TenantApiLogs::TenantId).uuid().not_null())
                    .col(ColumnDef::new(TenantApiLogs::Method).text().not_null())
                    .col(ColumnDef::new(TenantApiLogs::Endpoint).text().not_null())
                    .col(
                        ColumnDef::new(TenantApiLogs::StatusCode)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TenantApiLogs::ResponseTimeMs)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TenantApiLogs::ErrorMessage)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(TenantApiLogs::IpAddress)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(TenantApiLogs::UserAgent)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(TenantApiLogs::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tenant_api_logs_tenant_id")
                            .from(TenantApiLogs::Table, TenantApiLogs::TenantId)
                            .to(Tenants::Table, Tenants::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tenant_api_logs_tenant_timestamp")
                    .table(TenantApiLogs::Table)
                    .col(TenantApiLogs::TenantId)
                    .col(TenantApiLogs::Timestamp)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_tenant_api_logs_tenant_timestamp")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(TenantApiLogs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum TenantApiLogs {
    Table,
    Id,
    TenantId,
    Method,
    Endpoint,
    StatusCode,
    ResponseTimeMs,
    ErrorMessage,
    IpAddress,
    UserAgent,
    Timestamp,
}

#[derive(DeriveIden)]
enum Tenants {
    Table,
    Id,
}
