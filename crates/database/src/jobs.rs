use sea_orm::{
    sea_query::OnConflict, ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait,
    QueryFilter, QueryOrder,
};

use crate::{
    client::DbClient,
    entities::{job, job_event, revision},
};

impl DbClient {
    pub async fn find_job<C: ConnectionTrait>(
        &self,
        conn: &C,
        job_id: &str,
    ) -> Result<Option<job::Model>, DbErr> {
        job::Entity::find_by_id(job_id.to_owned()).one(conn).await
    }

    pub async fn insert_job<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: job::ActiveModel,
    ) -> Result<(), DbErr> {
        job::Entity::insert(model).exec_without_returning(conn).await?;
        Ok(())
    }

    pub async fn update_job<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: job::ActiveModel,
    ) -> Result<job::Model, DbErr> {
        model.update(conn).await
    }

    pub async fn revision_exists<C: ConnectionTrait>(
        &self,
        conn: &C,
        transaction_hash: &str,
        log_index: i64,
    ) -> Result<bool, DbErr> {
        Ok(
            revision::Entity::find_by_id((transaction_hash.to_owned(), log_index))
                .one(conn)
                .await?
                .is_some(),
        )
    }

    pub async fn insert_revision<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: revision::ActiveModel,
    ) -> Result<bool, DbErr> {
        let inserted = revision::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    revision::Column::TransactionHash,
                    revision::Column::LogIndex,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;

        Ok(inserted > 0)
    }

    pub async fn job_event_exists<C: ConnectionTrait>(
        &self,
        conn: &C,
        transaction_hash: &str,
        log_index: i64,
    ) -> Result<bool, DbErr> {
        Ok(
            job_event::Entity::find_by_id((transaction_hash.to_owned(), log_index))
                .one(conn)
                .await?
                .is_some(),
        )
    }

    /// Records that a log was applied to a job. Returns `false` when the
    /// `(tx, log index)` key was already recorded.
    pub async fn insert_job_event<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: job_event::ActiveModel,
    ) -> Result<bool, DbErr> {
        let inserted = job_event::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    job_event::Column::TransactionHash,
                    job_event::Column::LogIndex,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;

        Ok(inserted > 0)
    }

    /// Applied escrow logs of one job in chain order.
    pub async fn job_history(&self, job_id: &str) -> Result<Vec<job_event::Model>, DbErr> {
        job_event::Entity::find()
            .filter(job_event::Column::JobId.eq(job_id))
            .order_by_asc(job_event::Column::BlockNumber)
            .order_by_asc(job_event::Column::LogIndex)
            .all(&self.primary)
            .await
    }

    pub async fn revisions_for_job(&self, job_id: &str) -> Result<Vec<revision::Model>, DbErr> {
        revision::Entity::find()
            .filter(revision::Column::JobId.eq(job_id))
            .order_by_asc(revision::Column::BlockNumber)
            .order_by_asc(revision::Column::LogIndex)
            .all(&self.primary)
            .await
    }

    pub async fn jobs_for_agent(&self, address: &str) -> Result<Vec<job::Model>, DbErr> {
        job::Entity::find()
            .filter(job::Column::AgentId.eq(address.to_lowercase()))
            .order_by_asc(job::Column::BlockNumber)
            .all(&self.primary)
            .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use sea_orm::{ActiveValue::Set, IntoActiveModel};

    use crate::{
        entities::{
            agent,
            sea_orm_active_enums::{JobEventKind, JobStatus},
        },
        test_utils::setup_db,
    };

    use super::*;

    const AGENT: &str = "0x00000000000000000000000000000000000000aa";
    const CLIENT: &str = "0x00000000000000000000000000000000000000cc";

    async fn seed_agent(db: &DbClient) {
        db.insert_agent(
            &db.primary,
            agent::ActiveModel {
                id: Set(AGENT.to_owned()),
                ens_name: Set(None),
                total_staked: Set("1000".to_owned()),
                locked_stake: Set("0".to_owned()),
                is_active: Set(true),
                registered_at: Set(Utc.timestamp_opt(1_700_000_000, 0).unwrap()),
                registration_tx: Set("0x01".to_owned()),
                registration_block: Set(100),
            },
        )
        .await
        .unwrap();
    }

    fn job_model(id: &str, block: i64) -> job::ActiveModel {
        job::ActiveModel {
            id: Set(id.to_owned()),
            client: Set(CLIENT.to_owned()),
            agent_id: Set(AGENT.to_owned()),
            price: Set("500".to_owned()),
            status: Set(JobStatus::Created),
            deliverable_url: Set(None),
            created_at: Set(Utc.timestamp_opt(1_700_000_100, 0).unwrap()),
            submitted_at: Set(None),
            approved_at: Set(None),
            disputed_at: Set(None),
            disputed_by: Set(None),
            creation_tx: Set(format!("0x{id}")),
            submission_tx: Set(None),
            approval_tx: Set(None),
            dispute_tx: Set(None),
            paid_amount: Set(None),
            payment_tx: Set(None),
            block_number: Set(block),
        }
    }

    fn revision_model(tx: &str, log_index: i64, block: i64) -> revision::ActiveModel {
        revision::ActiveModel {
            transaction_hash: Set(tx.to_owned()),
            log_index: Set(log_index),
            job_id: Set("7".to_owned()),
            feedback: Set(format!("fix {tx}")),
            requested_at: Set(Utc.timestamp_opt(1_700_000_200, 0).unwrap()),
            block_number: Set(block),
        }
    }

    fn job_event_model(tx: &str, log_index: i64, kind: JobEventKind) -> job_event::ActiveModel {
        job_event::ActiveModel {
            transaction_hash: Set(tx.to_owned()),
            log_index: Set(log_index),
            job_id: Set("7".to_owned()),
            kind: Set(kind),
            block_number: Set(102),
            timestamp: Set(Utc.timestamp_opt(1_700_000_300, 0).unwrap()),
        }
    }

    #[tokio::test]
    async fn job_events_are_keyed_by_log() {
        let db = setup_db().await;
        seed_agent(&db).await;
        db.insert_job(&db.primary, job_model("7", 101)).await.unwrap();

        assert!(db
            .insert_job_event(&db.primary, job_event_model("0x0c", 1, JobEventKind::Submitted))
            .await
            .unwrap());
        assert!(db
            .insert_job_event(&db.primary, job_event_model("0x0c", 0, JobEventKind::Created))
            .await
            .unwrap());
        assert!(!db
            .insert_job_event(&db.primary, job_event_model("0x0c", 1, JobEventKind::Submitted))
            .await
            .unwrap());

        assert!(db.job_event_exists(&db.primary, "0x0c", 1).await.unwrap());
        assert!(!db.job_event_exists(&db.primary, "0x0c", 2).await.unwrap());
        let kinds: Vec<_> = db
            .job_history("7")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.kind)
            .collect();
        assert_eq!(kinds, vec![JobEventKind::Created, JobEventKind::Submitted]);
    }

    #[tokio::test]
    async fn job_status_update_persists() {
        let db = setup_db().await;
        seed_agent(&db).await;
        db.insert_job(&db.primary, job_model("7", 101)).await.unwrap();

        let mut active = db
            .find_job(&db.primary, "7")
            .await
            .unwrap()
            .unwrap()
            .into_active_model();
        active.status = Set(JobStatus::Submitted);
        active.deliverable_url = Set(Some("ipfs://x".to_owned()));
        db.update_job(&db.primary, active).await.unwrap();

        let job = db.find_job(&db.primary, "7").await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Submitted);
        assert_eq!(job.deliverable_url.as_deref(), Some("ipfs://x"));
        assert_eq!(db.jobs_for_agent(AGENT).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn revisions_are_keyed_by_log_and_ordered() {
        let db = setup_db().await;
        seed_agent(&db).await;
        db.insert_job(&db.primary, job_model("7", 101)).await.unwrap();

        assert!(db
            .insert_revision(&db.primary, revision_model("0x0b", 0, 103))
            .await
            .unwrap());
        assert!(db
            .insert_revision(&db.primary, revision_model("0x0a", 2, 102))
            .await
            .unwrap());
        assert!(!db
            .insert_revision(&db.primary, revision_model("0x0a", 2, 102))
            .await
            .unwrap());

        assert!(db.revision_exists(&db.primary, "0x0a", 2).await.unwrap());
        let feedback: Vec<_> = db
            .revisions_for_job("7")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.feedback)
            .collect();
        assert_eq!(feedback, vec!["fix 0x0a", "fix 0x0b"]);
    }
}
