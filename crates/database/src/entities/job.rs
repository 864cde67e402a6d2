use sea_orm::entity::prelude::*;

use super::sea_orm_active_enums::JobStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "job")]
pub struct Model {
    /// Decimal form of the on-chain job id.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub client: String,
    pub agent_id: String,
    pub price: String,
    pub status: JobStatus,
    pub deliverable_url: Option<String>,
    pub created_at: DateTimeUtc,
    pub submitted_at: Option<DateTimeUtc>,
    pub approved_at: Option<DateTimeUtc>,
    pub disputed_at: Option<DateTimeUtc>,
    pub disputed_by: Option<String>,
    pub creation_tx: String,
    pub submission_tx: Option<String>,
    pub approval_tx: Option<String>,
    pub dispute_tx: Option<String>,
    pub paid_amount: Option<String>,
    pub payment_tx: Option<String>,
    pub block_number: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::agent::Entity",
        from = "Column::AgentId",
        to = "super::agent::Column::Id"
    )]
    Agent,
    #[sea_orm(has_many = "super::revision::Entity")]
    Revision,
    #[sea_orm(has_many = "super::job_event::Entity")]
    JobEvent,
}

impl Related<super::agent::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Agent.def()
    }
}

impl Related<super::revision::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Revision.def()
    }
}

impl Related<super::job_event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::JobEvent.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
