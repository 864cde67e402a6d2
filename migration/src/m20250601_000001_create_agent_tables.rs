use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Agent::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Agent::Id)
                            .string_len(42)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Agent::EnsName).string())
                    // uint256 as decimal text
                    .col(ColumnDef::new(Agent::TotalStaked).string_len(78).not_null())
                    .col(ColumnDef::new(Agent::LockedStake).string_len(78).not_null())
                    .col(
                        ColumnDef::new(Agent::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Agent::RegisteredAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Agent::RegistrationTx).string_len(66).not_null())
                    .col(
                        ColumnDef::new(Agent::RegistrationBlock)
                            .big_integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(StakeEvent::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StakeEvent::TransactionHash)
                            .string_len(66)
                            .not_null(),
                    )
                    .col(ColumnDef::new(StakeEvent::LogIndex).big_integer().not_null())
                    .col(ColumnDef::new(StakeEvent::AgentId).string_len(42).not_null())
                    .col(ColumnDef::new(StakeEvent::Kind).string_len(16).not_null())
                    .col(ColumnDef::new(StakeEvent::Amount).string_len(78).not_null())
                    .col(ColumnDef::new(StakeEvent::NewTotal).string_len(78).not_null())
                    .col(ColumnDef::new(StakeEvent::JobId).string_len(78))
                    .col(
                        ColumnDef::new(StakeEvent::BlockNumber)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StakeEvent::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(StakeEvent::TransactionHash)
                            .col(StakeEvent::LogIndex),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_stake_event_agent")
                            .from(StakeEvent::Table, StakeEvent::AgentId)
                            .to(Agent::Table, Agent::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_stake_event_agent_block")
                    .table(StakeEvent::Table)
                    .col(StakeEvent::AgentId)
                    .col(StakeEvent::BlockNumber)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StakeEvent::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Agent::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
pub(crate) enum Agent {
    Table,
    Id,
    EnsName,
    TotalStaked,
    LockedStake,
    IsActive,
    RegisteredAt,
    RegistrationTx,
    RegistrationBlock,
}

#[derive(DeriveIden)]
enum StakeEvent {
    Table,
    TransactionHash,
    LogIndex,
    AgentId,
    Kind,
    Amount,
    NewTotal,
    JobId,
    BlockNumber,
    Timestamp,
}
