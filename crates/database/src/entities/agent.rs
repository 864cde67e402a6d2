use sea_orm::entity::prelude::*;

/// An on-chain registrant. `id` is the lower-cased `0x` address.
///
/// Stake amounts are base-10 strings of unsigned 256-bit integers.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "agent")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub ens_name: Option<String>,
    pub total_staked: String,
    pub locked_stake: String,
    pub is_active: bool,
    pub registered_at: DateTimeUtc,
    pub registration_tx: String,
    pub registration_block: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::job::Entity")]
    Job,
    #[sea_orm(has_many = "super::stake_event::Entity")]
    StakeEvent,
}

impl Related<super::job::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Job.def()
    }
}

impl Related<super::stake_event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StakeEvent.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
