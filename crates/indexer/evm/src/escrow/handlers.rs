use std::sync::Arc;

use alloy_primitives::{Address, B256};
use alloy_rpc_types::Log;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use database::{
    client::DbClient,
    entities::{
        job, job_event, revision,
        sea_orm_active_enums::{JobEventKind, JobStatus},
    },
};
use sea_orm::{ActiveValue::Set, DatabaseTransaction, IntoActiveModel};
use tracing::{debug, error, info, instrument, warn};

use super::{
    parser::EscrowEvent,
    JobEscrow::{
        JobApproved, JobCreated, JobDisputed, JobSubmitted, PaymentReleased, RevisionRequested,
    },
    ESCROW_EVENT_SIGNATURES,
};
use crate::{
    error::{HandlerError, ParserError},
    handler::{address_key, EvmEventHandler, LogContext, Outcome},
};

/// Applies job escrow events to jobs and their revision history.
#[derive(Clone)]
pub struct EscrowEventHandler {
    db: Arc<DbClient>,
    address: Address,
}

impl EscrowEventHandler {
    pub fn new(db: Arc<DbClient>, address: Address) -> Self {
        Self { db, address }
    }

    async fn is_replay<T>(
        &self,
        txn: &DatabaseTransaction,
        ctx: &LogContext<T>,
    ) -> Result<bool, HandlerError> {
        let seen = self
            .db
            .job_event_exists(txn, &ctx.tx_hash, ctx.log_index)
            .await?;
        if seen {
            debug!(tx = %ctx.tx_hash, log_index = ctx.log_index, "Job event already indexed");
        }
        Ok(seen)
    }

    async fn record_job_event<T>(
        &self,
        txn: &DatabaseTransaction,
        ctx: &LogContext<T>,
        job_id: &str,
        kind: JobEventKind,
    ) -> Result<(), HandlerError> {
        let model = job_event::ActiveModel {
            transaction_hash: Set(ctx.tx_hash.clone()),
            log_index: Set(ctx.log_index),
            job_id: Set(job_id.to_owned()),
            kind: Set(kind),
            block_number: Set(ctx.block_number),
            timestamp: Set(ctx.timestamp),
        };
        self.db.insert_job_event(txn, model).await?;
        Ok(())
    }

    async fn require_job(
        &self,
        txn: &DatabaseTransaction,
        job_id: &str,
    ) -> Result<job::Model, HandlerError> {
        self.db
            .find_job(txn, job_id)
            .await?
            .ok_or_else(|| HandlerError::MissingJob {
                job_id: job_id.to_owned(),
            })
    }

    /// Rejects a status change the state machine does not allow. The job is
    /// left untouched in that case.
    fn check_transition(job: &job::Model, next: JobStatus, tx_hash: &str) -> bool {
        if job.status.can_transition_to(next) {
            return true;
        }
        error!(
            job_id = %job.id,
            from = %job.status,
            to = %next,
            tx = %tx_hash,
            "Rejected invalid job status transition"
        );
        false
    }

    async fn handle_job_created(
        &self,
        txn: &DatabaseTransaction,
        ctx: LogContext<JobCreated>,
    ) -> Result<Outcome, HandlerError> {
        let job_id = ctx.data.jobId.to_string();

        if self.is_replay(txn, &ctx).await? {
            return Ok(Outcome::Replayed);
        }
        if let Some(existing) = self.db.find_job(txn, &job_id).await? {
            error!(%job_id, first_tx = %existing.creation_tx, tx = %ctx.tx_hash, "Job created twice");
            return Ok(Outcome::Anomaly);
        }

        let agent_id = address_key(&ctx.data.agent);
        if self.db.find_agent(txn, &agent_id).await?.is_none() {
            return Err(HandlerError::MissingAgent { address: agent_id });
        }

        let model = job::ActiveModel {
            id: Set(job_id.clone()),
            client: Set(address_key(&ctx.data.client)),
            agent_id: Set(agent_id.clone()),
            price: Set(ctx.data.price.to_string()),
            status: Set(JobStatus::Created),
            deliverable_url: Set(None),
            created_at: Set(ctx.timestamp),
            submitted_at: Set(None),
            approved_at: Set(None),
            disputed_at: Set(None),
            disputed_by: Set(None),
            creation_tx: Set(ctx.tx_hash.clone()),
            submission_tx: Set(None),
            approval_tx: Set(None),
            dispute_tx: Set(None),
            paid_amount: Set(None),
            payment_tx: Set(None),
            block_number: Set(ctx.block_number),
        };
        self.db.insert_job(txn, model).await?;
        self.record_job_event(txn, &ctx, &job_id, JobEventKind::Created)
            .await?;

        info!(%job_id, agent = %agent_id, price = %ctx.data.price, tx = %ctx.tx_hash, "Job created");
        Ok(Outcome::Applied)
    }

    async fn handle_job_submitted(
        &self,
        txn: &DatabaseTransaction,
        ctx: LogContext<JobSubmitted>,
    ) -> Result<Outcome, HandlerError> {
        let job_id = ctx.data.jobId.to_string();
        if self.is_replay(txn, &ctx).await? {
            return Ok(Outcome::Replayed);
        }
        let job = self.require_job(txn, &job_id).await?;

        if !Self::check_transition(&job, JobStatus::Submitted, &ctx.tx_hash) {
            return Ok(Outcome::Anomaly);
        }

        let mut active = job.into_active_model();
        active.status = Set(JobStatus::Submitted);
        active.deliverable_url = Set(Some(ctx.data.deliverableUrl.clone()));
        active.submitted_at = Set(Some(ctx.timestamp));
        active.submission_tx = Set(Some(ctx.tx_hash.clone()));
        self.db.update_job(txn, active).await?;
        self.record_job_event(txn, &ctx, &job_id, JobEventKind::Submitted)
            .await?;

        info!(%job_id, deliverable = %ctx.data.deliverableUrl, tx = %ctx.tx_hash, "Job submitted");
        Ok(Outcome::Applied)
    }

    async fn handle_revision_requested(
        &self,
        txn: &DatabaseTransaction,
        ctx: LogContext<RevisionRequested>,
    ) -> Result<Outcome, HandlerError> {
        let job_id = ctx.data.jobId.to_string();
        let job = self.require_job(txn, &job_id).await?;

        if self
            .db
            .revision_exists(txn, &ctx.tx_hash, ctx.log_index)
            .await?
        {
            debug!(%job_id, tx = %ctx.tx_hash, "Revision already indexed");
            return Ok(Outcome::Replayed);
        }
        if job.status.is_terminal() {
            warn!(%job_id, status = %job.status, "Revision requested on a closed job");
        }

        let model = revision::ActiveModel {
            transaction_hash: Set(ctx.tx_hash.clone()),
            log_index: Set(ctx.log_index),
            job_id: Set(job_id.clone()),
            feedback: Set(ctx.data.feedback.clone()),
            requested_at: Set(ctx.timestamp),
            block_number: Set(ctx.block_number),
        };
        self.db.insert_revision(txn, model).await?;

        info!(%job_id, tx = %ctx.tx_hash, "Revision requested");
        Ok(Outcome::Applied)
    }

    async fn handle_job_approved(
        &self,
        txn: &DatabaseTransaction,
        ctx: LogContext<JobApproved>,
    ) -> Result<Outcome, HandlerError> {
        let job_id = ctx.data.jobId.to_string();
        if self.is_replay(txn, &ctx).await? {
            return Ok(Outcome::Replayed);
        }
        let job = self.require_job(txn, &job_id).await?;

        if !Self::check_transition(&job, JobStatus::Approved, &ctx.tx_hash) {
            return Ok(Outcome::Anomaly);
        }

        let mut active = job.into_active_model();
        active.status = Set(JobStatus::Approved);
        active.approved_at = Set(Some(ctx.timestamp));
        active.approval_tx = Set(Some(ctx.tx_hash.clone()));
        self.db.update_job(txn, active).await?;
        self.record_job_event(txn, &ctx, &job_id, JobEventKind::Approved)
            .await?;

        info!(%job_id, tx = %ctx.tx_hash, "Job approved");
        Ok(Outcome::Applied)
    }

    async fn handle_job_disputed(
        &self,
        txn: &DatabaseTransaction,
        ctx: LogContext<JobDisputed>,
    ) -> Result<Outcome, HandlerError> {
        let job_id = ctx.data.jobId.to_string();
        if self.is_replay(txn, &ctx).await? {
            return Ok(Outcome::Replayed);
        }
        let job = self.require_job(txn, &job_id).await?;

        if !Self::check_transition(&job, JobStatus::Disputed, &ctx.tx_hash) {
            return Ok(Outcome::Anomaly);
        }

        let initiator = address_key(&ctx.data.initiator);
        let mut active = job.into_active_model();
        active.status = Set(JobStatus::Disputed);
        active.disputed_at = Set(Some(ctx.timestamp));
        active.disputed_by = Set(Some(initiator.clone()));
        active.dispute_tx = Set(Some(ctx.tx_hash.clone()));
        self.db.update_job(txn, active).await?;
        self.record_job_event(txn, &ctx, &job_id, JobEventKind::Disputed)
            .await?;

        info!(%job_id, %initiator, tx = %ctx.tx_hash, "Job disputed");
        Ok(Outcome::Applied)
    }

    async fn handle_payment_released(
        &self,
        txn: &DatabaseTransaction,
        ctx: LogContext<PaymentReleased>,
    ) -> Result<Outcome, HandlerError> {
        let job_id = ctx.data.jobId.to_string();
        if self.is_replay(txn, &ctx).await? {
            return Ok(Outcome::Replayed);
        }
        let job = self.require_job(txn, &job_id).await?;


        let mut active = job.into_active_model();
        active.paid_amount = Set(Some(ctx.data.amount.to_string()));
        active.payment_tx = Set(Some(ctx.tx_hash.clone()));
        self.db.update_job(txn, active).await?;
        self.record_job_event(txn, &ctx, &job_id, JobEventKind::PaymentReleased)
            .await?;

        info!(
            %job_id,
            recipient = %address_key(&ctx.data.recipient),
            amount = %ctx.data.amount,
            tx = %ctx.tx_hash,
            "Payment released"
        );
        Ok(Outcome::Applied)
    }
}

#[async_trait]
impl EvmEventHandler for EscrowEventHandler {
    fn name(&self) -> &'static str {
        "JobEscrow"
    }

    fn relevant_address(&self) -> Address {
        self.address
    }

    fn relevant_topics(&self) -> Vec<B256> {
        ESCROW_EVENT_SIGNATURES.to_vec()
    }

    #[instrument(skip_all, fields(CONTRACT = "JobEscrow"))]
    async fn handle_event(
        &self,
        txn: &DatabaseTransaction,
        log: &Log,
        timestamp: DateTime<Utc>,
    ) -> Result<Outcome, HandlerError> {
        let event = match EscrowEvent::decode(log, timestamp) {
            Ok(event) => event,
            Err(ParserError::UnknownEvent { signature }) => {
                warn!(
                    "Ignoring unknown event 0x{} from escrow",
                    hex::encode(signature)
                );
                return Ok(Outcome::Ignored);
            }
            Err(e) => return Err(e.into()),
        };

        debug!(event = event.name(), "Handling escrow event");

        match event {
            EscrowEvent::JobCreated(ctx) => self.handle_job_created(txn, ctx).await,
            EscrowEvent::JobSubmitted(ctx) => self.handle_job_submitted(txn, ctx).await,
            EscrowEvent::RevisionRequested(ctx) => self.handle_revision_requested(txn, ctx).await,
            EscrowEvent::JobApproved(ctx) => self.handle_job_approved(txn, ctx).await,
            EscrowEvent::JobDisputed(ctx) => self.handle_job_disputed(txn, ctx).await,
            EscrowEvent::PaymentReleased(ctx) => self.handle_payment_released(txn, ctx).await,
        }
    }
}
