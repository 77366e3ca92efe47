//! Migration to create the tenant_notifications table.
//!
//! Notifications are immutable once written. An optional dedupe key makes
//! repeated writes of the same event idempotent per tenant.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TenantNotifications::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TenantNotifications::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TenantNotifications::TenantId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(TenantNotifications::Kind).text().not_null())
                    .col(ColumnDef::new(TenantNotifications::Title).text().not_null())
                    .col(
                        ColumnDef::new(TenantNotifications::Message)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TenantNotifications::DedupeKey)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(TenantNotifications::IsRead)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(TenantNotifications::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tenant_notifications_tenant_id")
                            .from(TenantNotifications::Table, TenantNotifications::TenantId)
                            .to(Tenants::Table, Tenants::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_tenant_notifications_tenant_dedupe_key")
                    .table(TenantNotifications::Table)
                    .col(TenantNotifications::TenantId)
                    .col(TenantNotifications::DedupeKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tenant_notifications_tenant_created_at")
                    .table(TenantNotifications::Table)
                    .col(TenantNotifications::TenantId)
                    .col(TenantNotifications::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_tenant_notifications_tenant_created_at")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("uq_tenant_notifications_tenant_dedupe_key")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(TenantNotifications::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum TenantNotifications {
    Table,
    Id,
    TenantId,
    Kind,
    Title,
    Message,
    DedupeKey,
    IsRead,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Tenants {
    Table,
    Id,
}
