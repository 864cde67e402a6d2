use sea_orm::{
    sea_query::OnConflict, ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait,
    QueryFilter, QueryOrder,
};

use crate::{
    client::DbClient,
    entities::{agent, stake_event},
};

impl DbClient {
    pub async fn find_agent<C: ConnectionTrait>(
        &self,
        conn: &C,
        address: &str,
    ) -> Result<Option<agent::Model>, DbErr> {
        agent::Entity::find_by_id(address.to_lowercase())
            .one(conn)
            .await
    }

    pub async fn insert_agent<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: agent::ActiveModel,
    ) -> Result<(), DbErr> {
        agent::Entity::insert(model)
            .exec_without_returning(conn)
            .await?;
        Ok(())
    }

    pub async fn update_agent<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: agent::ActiveModel,
    ) -> Result<agent::Model, DbErr> {
        model.update(conn).await
    }

    pub async fn stake_event_exists<C: ConnectionTrait>(
        &self,
        conn: &C,
        transaction_hash: &str,
        log_index: i64,
    ) -> Result<bool, DbErr> {
        Ok(
            stake_event::Entity::find_by_id((transaction_hash.to_owned(), log_index))
                .one(conn)
                .await?
                .is_some(),
        )
    }

    /// Appends an audit row. Returns `false` when the `(tx, log index)` key
    /// was already recorded.
    pub async fn insert_stake_event<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: stake_event::ActiveModel,
    ) -> Result<bool, DbErr> {
        let inserted = stake_event::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    stake_event::Column::TransactionHash,
                    stake_event::Column::LogIndex,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;

        Ok(inserted > 0)
    }

    /// Stake audit trail of one agent in chain order.
    pub async fn stake_history(&self, address: &str) -> Result<Vec<stake_event::Model>, DbErr> {
        stake_event::Entity::find()
            .filter(stake_event::Column::AgentId.eq(address.to_lowercase()))
            .order_by_asc(stake_event::Column::BlockNumber)
            .order_by_asc(stake_event::Column::LogIndex)
            .all(&self.primary)
            .await
    }

    pub async fn active_agents(&self) -> Result<Vec<agent::Model>, DbErr> {
        agent::Entity::find()
            .filter(agent::Column::IsActive.eq(true))
            .order_by_asc(agent::Column::RegistrationBlock)
            .all(&self.primary)
            .await
    }
}
