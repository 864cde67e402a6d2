use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::{Alias, Expr, OnConflict},
    ActiveValue::Set,
    ConnectionTrait, DbErr, EntityTrait,
};
use tracing::error;

use crate::{client::DbClient, entities::indexer_checkpoint};

impl DbClient {
    pub async fn get_checkpoint(
        &self,
        chain_id: i64,
    ) -> Result<Option<indexer_checkpoint::Model>, DbErr> {
        indexer_checkpoint::Entity::find_by_id(chain_id)
            .one(&self.primary)
            .await
    }

    /// Height the indexer has fully applied, or `None` before the first batch.
    pub async fn get_last_synced_height(&self, chain_id: i64) -> Result<Option<u64>, DbErr> {
        Ok(self
            .get_checkpoint(chain_id)
            .await?
            .map(|cp| cp.block_number as u64))
    }

    /// Moves the checkpoint forward to `block_number`. A height at or below
    /// the stored one leaves the row untouched and returns `false`.
    pub async fn upsert_checkpoint<C: ConnectionTrait>(
        &self,
        conn: &C,
        chain_id: i64,
        block_number: i64,
        block_hash: Option<String>,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, DbErr> {
        let model = indexer_checkpoint::ActiveModel {
            chain_id: Set(chain_id),
            block_number: Set(block_number),
            block_hash: Set(block_hash),
            updated_at: Set(updated_at),
        };

        let written = indexer_checkpoint::Entity::insert(model)
            .on_conflict(
                OnConflict::column(indexer_checkpoint::Column::ChainId)
                    .update_columns([
                        indexer_checkpoint::Column::BlockNumber,
                        indexer_checkpoint::Column::BlockHash,
                        indexer_checkpoint::Column::UpdatedAt,
                    ])
                    .action_and_where(
                        Expr::col((
                            indexer_checkpoint::Entity,
                            indexer_checkpoint::Column::BlockNumber,
                        ))
                        .lt(Expr::col((
                            Alias::new("excluded"),
                            indexer_checkpoint::Column::BlockNumber,
                        ))),
                    )
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await
            .map_err(|e| {
                error!(chain_id, block_number, "Failed to upsert checkpoint: {:?}", e);
                e
            })?;

        Ok(written > 0)
    }
}
