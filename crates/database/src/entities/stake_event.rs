use sea_orm::entity::prelude::*;

use super::sea_orm_active_enums::StakeEventKind;

/// Append-only audit row, one per stake-affecting log.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "stake_event")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub transaction_hash: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub log_index: i64,
    pub agent_id: String,
    pub kind: StakeEventKind,
    pub amount: String,
    /// Agent total stake after this event.
    pub new_total: String,
    pub job_id: Option<String>,
    pub block_number: i64,
    pub timestamp: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::agent::Entity",
        from = "Column::AgentId",
        to = "super::agent::Column::Id"
    )]
    Agent,
}

impl Related<super::agent::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Agent.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
