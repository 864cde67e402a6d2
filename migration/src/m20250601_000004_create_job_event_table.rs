use sea_orm_migration::prelude::*;

use crate::m20250601_000002_create_job_tables::Job;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(JobEvent::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(JobEvent::TransactionHash)
                            .string_len(66)
                            .not_null(),
                    )
                    .col(ColumnDef::new(JobEvent::LogIndex).big_integer().not_null())
                    .col(ColumnDef::new(JobEvent::JobId).string_len(78).not_null())
                    .col(ColumnDef::new(JobEvent::Kind).string_len(16).not_null())
                    .col(
                        ColumnDef::new(JobEvent::BlockNumber)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(JobEvent::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(JobEvent::TransactionHash)
                            .col(JobEvent::LogIndex),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_job_event_job")
                            .from(JobEvent::Table, JobEvent::JobId)
                            .to(Job::Table, Job::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_job_event_job_block")
                    .table(JobEvent::Table)
                    .col(JobEvent::JobId)
                    .col(JobEvent::BlockNumber)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(JobEvent::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum JobEvent {
    Table,
    TransactionHash,
    LogIndex,
    JobId,
    Kind,
    BlockNumber,
    Timestamp,
}
