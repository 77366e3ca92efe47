//! Migration to create the tenants table.
//!
//! Tenants are never hard-deleted; the status column carries the lifecycle.
//! Domain and API key are globally unique.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Tenants::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Tenants::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Tenants::Name).text().not_null())
                    .col(ColumnDef::new(Tenants::Domain).text().not_null().unique_key())
                    .col(
                        ColumnDef::new(Tenants::AdditionalDomains)
                            .json_binary()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Tenants::ContactName).text().not_null())
                    .col(ColumnDef::new(Tenants::ContactEmail).text().not_null())
                    .col(
                        ColumnDef::new(Tenants::Plan)
                            .text()
                            .not_null()
                            .default("free"),
                    )
                    .col(
                        ColumnDef::new(Tenants::Status)
                            .text()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Tenants::ApiKey).text().not_null().unique_key())
                    .col(ColumnDef::new(Tenants::ApiSecret).text().not_null())
                    .col(ColumnDef::new(Tenants::MaxUsers).big_integer().not_null())
                    .col(
                        ColumnDef::new(Tenants::MaxMonthlyAuthentications)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Tenants::Settings).json_binary().not_null())
                    .col(
                        ColumnDef::new(Tenants::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Tenants::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Tenants::LastActivity)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tenants_status")
                    .table(Tenants::Table)
                    .col(Tenants::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tenants_plan")
                    .table(Tenants::Table)
                    .col(Tenants::Plan)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_tenants_plan").to_owned())
            .await?;

        manager
            .drop_index(Index::drop().name("idx_tenants_status").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Tenants::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Tenants {
    Table,
    Id,
    Name,
    Domain,
    AdditionalDomains,
    ContactName,
    ContactEmail,
    Plan,
    Status,
    ApiKey,
    ApiSecret,
    MaxUsers,
    MaxMonthlyAuthentications,
    Settings,
    CreatedAt,
    UpdatedAt,
    LastActivity,
}
