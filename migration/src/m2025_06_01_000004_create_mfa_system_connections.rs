//! Migration to create the mfa_system_connections table.
//!
//! Each tenant has at most one connection record describing how the panel
//! reaches the remote MFA system on its behalf.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MfaSystemConnections::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MfaSystemConnections::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(MfaSystemConnections::TenantId)
                            .uuid()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(MfaSystemConnections::SystemUrl)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MfaSystemConnections::ConnectionKey)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MfaSystemConnections::RemoteTenantId)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MfaSystemConnections::IsConnected)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(MfaSystemConnections::Status)
                            .text()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(MfaSystemConnections::LastSync)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MfaSystemConnections::LastAttemptAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MfaSystemConnections::LastError)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MfaSystemConnections::TotalUsers)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(MfaSystemConnections::ActiveUsers)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(MfaSystemConnections::TotalAuthentications)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(MfaSystemConnections::AdminLocked)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(MfaSystemConnections::ForceConnection)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(MfaSystemConnections::CanDisconnect)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(MfaSystemConnections::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(MfaSystemConnections::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_mfa_system_connections_tenant_id")
                            .from(MfaSystemConnections::Table, MfaSystemConnections::TenantId)
                            .to(Tenants::Table, Tenants::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MfaSystemConnections::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum MfaSystemConnections {
    Table,
    Id,
    TenantId,
    SystemUrl,
    ConnectionKey,
    RemoteTenantId,
    IsConnected,
    Status,
    LastSync,
    LastAttemptAt,
    LastError,
    TotalUsers,
    ActiveUsers,
    TotalAuthentications,
    AdminLocked,
    ForceConnection,
    CanDisconnect,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Tenants {
    Table,
    Id,
}
