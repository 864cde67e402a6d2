use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(IndexerCheckpoint::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(IndexerCheckpoint::ChainId)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(IndexerCheckpoint::BlockNumber)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(IndexerCheckpoint::BlockHash).string_len(66))
                    .col(
                        ColumnDef::new(IndexerCheckpoint::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(IndexerCheckpoint::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum IndexerCheckpoint {
    Table,
    ChainId,
    BlockNumber,
    BlockHash,
    UpdatedAt,
}
