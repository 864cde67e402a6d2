use sea_orm_migration::prelude::*;

use crate::m20250601_000001_create_agent_tables::Agent;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Job::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Job::Id)
                            .string_len(78)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Job::Client).string_len(42).not_null())
                    .col(ColumnDef::new(Job::AgentId).string_len(42).not_null())
                    .col(ColumnDef::new(Job::Price).string_len(78).not_null())
                    .col(ColumnDef::new(Job::Status).string_len(16).not_null())
                    .col(ColumnDef::new(Job::DeliverableUrl).text())
                    .col(
                        ColumnDef::new(Job::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Job::SubmittedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Job::ApprovedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Job::DisputedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Job::DisputedBy).string_len(42))
                    .col(ColumnDef::new(Job::CreationTx).string_len(66).not_null())
                    .col(ColumnDef::new(Job::SubmissionTx).string_len(66))
                    .col(ColumnDef::new(Job::ApprovalTx).string_len(66))
                    .col(ColumnDef::new(Job::DisputeTx).string_len(66))
                    .col(ColumnDef::new(Job::PaidAmount).string_len(78))
                    .col(ColumnDef::new(Job::PaymentTx).string_len(66))
                    .col(ColumnDef::new(Job::BlockNumber).big_integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_job_agent")
                            .from(Job::Table, Job::AgentId)
                            .to(Agent::Table, Agent::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_job_agent")
                    .table(Job::Table)
                    .col(Job::AgentId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_job_status")
                    .table(Job::Table)
                    .col(Job::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Revision::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Revision::TransactionHash)
                            .string_len(66)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Revision::LogIndex).big_integer().not_null())
                    .col(ColumnDef::new(Revision::JobId).string_len(78).not_null())
                    .col(ColumnDef::new(Revision::Feedback).text().not_null())
                    .col(
                        ColumnDef::new(Revision::RequestedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Revision::BlockNumber)
                            .big_integer()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(Revision::TransactionHash)
                            .col(Revision::LogIndex),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_revision_job")
                            .from(Revision::Table, Revision::JobId)
                            .to(Job::Table, Job::Id),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Revision::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Job::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
pub(crate) enum Job {
    Table,
    Id,
    Client,
    AgentId,
    Price,
    Status,
    DeliverableUrl,
    CreatedAt,
    SubmittedAt,
    ApprovedAt,
    DisputedAt,
    DisputedBy,
    CreationTx,
    SubmissionTx,
    ApprovalTx,
    DisputeTx,
    PaidAmount,
    PaymentTx,
    BlockNumber,
}

#[derive(DeriveIden)]
enum Revision {
    Table,
    TransactionHash,
    LogIndex,
    JobId,
    Feedback,
    RequestedAt,
    BlockNumber,
}
