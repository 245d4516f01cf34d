//! Migration to create the `report_cache` table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ReportCache::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ReportCache::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ReportCache::OwnerId).uuid().not_null())
                    .col(ColumnDef::new(ReportCache::Signature).text().not_null())
                    .col(
                        ColumnDef::new(ReportCache::ReportType)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReportCache::Parameters)
                            .json_binary()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ReportCache::Result).json_binary().not_null())
                    .col(
                        ColumnDef::new(ReportCache::Format)
                            .string_len(8)
                            .not_null()
                            .default("json"),
                    )
                    .col(
                        ColumnDef::new(ReportCache::SizeBytes)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ReportCache::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(ReportCache::ExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Lookup path for get: owner + type + signature, newest first
        manager
            .create_index(
                Index::create()
                    .name("idx_report_cache_lookup")
                    .table(ReportCache::Table)
                    .col(ReportCache::OwnerId)
                    .col(ReportCache::ReportType)
                    .col(ReportCache::Signature)
                    .col(ReportCache::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Sweep path
        manager
            .create_index(
                Index::create()
                    .name("idx_report_cache_expires_at")
                    .table(ReportCache::Table)
                    .col(ReportCache::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ReportCache::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ReportCache {
    Table,
    Id,
    OwnerId,
    Signature,
    ReportType,
    Parameters,
    Result,
    Format,
    SizeBytes,
    CreatedAt,
    ExpiresAt,
}
