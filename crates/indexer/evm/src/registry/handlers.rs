use std::sync::Arc;

use alloy_primitives::{Address, B256, U256};
use alloy_rpc_types::Log;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use database::{
    client::DbClient,
    entities::{agent, sea_orm_active_enums::StakeEventKind, stake_event},
};
use sea_orm::{ActiveValue::Set, DatabaseTransaction, IntoActiveModel};
use tracing::{debug, error, info, instrument, warn};

use super::{
    parser::RegistryEvent,
    AgentRegistry::{AgentRegistered, StakeLocked, StakeUnlocked},
    REGISTRY_EVENT_SIGNATURES,
};
use crate::{
    error::{HandlerError, ParserError},
    handler::{address_key, parse_amount, EvmEventHandler, LogContext, Outcome},
};

/// Applies agent registry events to agents and their stake audit trail.
#[derive(Clone)]
pub struct RegistryEventHandler {
    db: Arc<DbClient>,
    address: Address,
}

impl RegistryEventHandler {
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
            .stake_event_exists(txn, &ctx.tx_hash, ctx.log_index)
            .await?;
        if seen {
            debug!(tx = %ctx.tx_hash, log_index = ctx.log_index, "Stake event already indexed");
        }
        Ok(seen)
    }

    async fn require_agent(
        &self,
        txn: &DatabaseTransaction,
        address: &str,
    ) -> Result<agent::Model, HandlerError> {
        self.db
            .find_agent(txn, address)
            .await?
            .ok_or_else(|| HandlerError::MissingAgent {
                address: address.to_owned(),
            })
    }

    #[allow(clippy::too_many_arguments)]
    async fn record_stake_event<T>(
        &self,
        txn: &DatabaseTransaction,
        ctx: &LogContext<T>,
        agent_id: &str,
        kind: StakeEventKind,
        amount: U256,
        new_total: U256,
        job_id: Option<U256>,
    ) -> Result<(), HandlerError> {
        let model = stake_event::ActiveModel {
            transaction_hash: Set(ctx.tx_hash.clone()),
            log_index: Set(ctx.log_index),
            agent_id: Set(agent_id.to_owned()),
            kind: Set(kind),
            amount: Set(amount.to_string()),
            new_total: Set(new_total.to_string()),
            job_id: Set(job_id.map(|id| id.to_string())),
            block_number: Set(ctx.block_number),
            timestamp: Set(ctx.timestamp),
        };
        self.db.insert_stake_event(txn, model).await?;
        Ok(())
    }

    async fn handle_agent_registered(
        &self,
        txn: &DatabaseTransaction,
        ctx: LogContext<AgentRegistered>,
    ) -> Result<Outcome, HandlerError> {
        if self.is_replay(txn, &ctx).await? {
            return Ok(Outcome::Replayed);
        }

        let address = address_key(&ctx.data.agent);
        let stake = ctx.data.stake;
        let ens_name = Some(ctx.data.ensName.clone()).filter(|name| !name.is_empty());
        let mut outcome = Outcome::Applied;

        match self.db.find_agent(txn, &address).await? {
            Some(existing) => {
                warn!(agent = %address, tx = %ctx.tx_hash, "Agent registered again, refreshing registration");
                let locked = parse_amount(&existing.locked_stake)?;
                if locked > stake {
                    error!(agent = %address, %locked, %stake, "Locked stake exceeds registered stake");
                    outcome = Outcome::Anomaly;
                }

                let mut active = existing.into_active_model();
                active.ens_name = Set(ens_name);
                active.total_staked = Set(stake.to_string());
                active.is_active = Set(true);
                active.registration_tx = Set(ctx.tx_hash.clone());
                active.registration_block = Set(ctx.block_number);
                self.db.update_agent(txn, active).await?;
            }
            None => {
                let model = agent::ActiveModel {
                    id: Set(address.clone()),
                    ens_name: Set(ens_name),
                    total_staked: Set(stake.to_string()),
                    locked_stake: Set(U256::ZERO.to_string()),
                    is_active: Set(true),
                    registered_at: Set(ctx.timestamp),
                    registration_tx: Set(ctx.tx_hash.clone()),
                    registration_block: Set(ctx.block_number),
                };
                self.db.insert_agent(txn, model).await?;
            }
        }

        self.record_stake_event(
            txn,
            &ctx,
            &address,
            StakeEventKind::Registered,
            stake,
            stake,
            None,
        )
        .await?;

        info!(agent = %address, %stake, tx = %ctx.tx_hash, "Agent registered");
        Ok(outcome)
    }

    /// `StakeAdded` and `StakeWithdrawn` carry the chain's new total, which
    /// replaces the stored one.
    async fn apply_stake_snapshot<T>(
        &self,
        txn: &DatabaseTransaction,
        ctx: &LogContext<T>,
        agent: &Address,
        amount: U256,
        new_total: U256,
        kind: StakeEventKind,
    ) -> Result<Outcome, HandlerError> {
        if self.is_replay(txn, ctx).await? {
            return Ok(Outcome::Replayed);
        }

        let address = address_key(agent);
        let existing = self.require_agent(txn, &address).await?;
        let locked = parse_amount(&existing.locked_stake)?;

        let mut outcome = Outcome::Applied;
        if locked > new_total {
            error!(agent = %address, %locked, %new_total, "Locked stake exceeds total stake after {:?}", kind);
            outcome = Outcome::Anomaly;
        }

        let mut active = existing.into_active_model();
        active.total_staked = Set(new_total.to_string());
        self.db.update_agent(txn, active).await?;

        self.record_stake_event(txn, ctx, &address, kind, amount, new_total, None)
            .await?;

        info!(agent = %address, %amount, %new_total, tx = %ctx.tx_hash, "Stake {:?}", kind);
        Ok(outcome)
    }

    async fn handle_stake_locked(
        &self,
        txn: &DatabaseTransaction,
        ctx: LogContext<StakeLocked>,
    ) -> Result<Outcome, HandlerError> {
        if self.is_replay(txn, &ctx).await? {
            return Ok(Outcome::Replayed);
        }

        let address = address_key(&ctx.data.agent);
        let existing = self.require_agent(txn, &address).await?;
        let total = parse_amount(&existing.total_staked)?;
        let locked = parse_amount(&existing.locked_stake)?.saturating_add(ctx.data.amount);

        let mut outcome = Outcome::Applied;
        if locked > total {
            error!(agent = %address, %locked, %total, job_id = %ctx.data.jobId, "Locked stake exceeds total stake");
            outcome = Outcome::Anomaly;
        }

        let mut active = existing.into_active_model();
        active.locked_stake = Set(locked.to_string());
        self.db.update_agent(txn, active).await?;

        self.record_stake_event(
            txn,
            &ctx,
            &address,
            StakeEventKind::Locked,
            ctx.data.amount,
            total,
            Some(ctx.data.jobId),
        )
        .await?;

        info!(agent = %address, amount = %ctx.data.amount, job_id = %ctx.data.jobId, tx = %ctx.tx_hash, "Stake locked");
        Ok(outcome)
    }

    async fn handle_stake_unlocked(
        &self,
        txn: &DatabaseTransaction,
        ctx: LogContext<StakeUnlocked>,
    ) -> Result<Outcome, HandlerError> {
        if self.is_replay(txn, &ctx).await? {
            return Ok(Outcome::Replayed);
        }

        let address = address_key(&ctx.data.agent);
        let existing = self.require_agent(txn, &address).await?;
        let total = parse_amount(&existing.total_staked)?;
        let locked = parse_amount(&existing.locked_stake)?;

        let mut outcome = Outcome::Applied;
        let remaining = match locked.checked_sub(ctx.data.amount) {
            Some(remaining) => remaining,
            None => {
                error!(agent = %address, %locked, amount = %ctx.data.amount, job_id = %ctx.data.jobId, "Unlock exceeds locked stake, clamping to zero");
                outcome = Outcome::Anomaly;
                U256::ZERO
            }
        };

        let mut active = existing.into_active_model();
        active.locked_stake = Set(remaining.to_string());
        self.db.update_agent(txn, active).await?;

        self.record_stake_event(
            txn,
            &ctx,
            &address,
            StakeEventKind::Unlocked,
            ctx.data.amount,
            total,
            Some(ctx.data.jobId),
        )
        .await?;

        info!(agent = %address, amount = %ctx.data.amount, job_id = %ctx.data.jobId, tx = %ctx.tx_hash, "Stake unlocked");
        Ok(outcome)
    }
}

#[async_trait]
impl EvmEventHandler for RegistryEventHandler {
    fn name(&self) -> &'static str {
        "AgentRegistry"
    }

    fn relevant_address(&self) -> Address {
        self.address
    }

    fn relevant_topics(&self) -> Vec<B256> {
        REGISTRY_EVENT_SIGNATURES.to_vec()
    }

    #[instrument(skip_all, fields(CONTRACT = "AgentRegistry"))]
    async fn handle_event(
        &self,
        txn: &DatabaseTransaction,
        log: &Log,
        timestamp: DateTime<Utc>,
    ) -> Result<Outcome, HandlerError> {
        let event = match RegistryEvent::decode(log, timestamp) {
            Ok(event) => event,
            Err(ParserError::UnknownEvent { signature }) => {
                warn!(
                    "Ignoring unknown event 0x{} from registry",
                    hex::encode(signature)
                );
                return Ok(Outcome::Ignored);
            }
            Err(e) => return Err(e.into()),
        };

        debug!(event = event.name(), "Handling registry event");

        match event {
            RegistryEvent::AgentRegistered(ctx) => self.handle_agent_registered(txn, ctx).await,
            RegistryEvent::StakeAdded(ctx) => {
                self.apply_stake_snapshot(
                    txn,
                    &ctx,
                    &ctx.data.agent,
                    ctx.data.amount,
                    ctx.data.newTotal,
                    StakeEventKind::Added,
                )
                .await
            }
            RegistryEvent::StakeWithdrawn(ctx) => {
                self.apply_stake_snapshot(
                    txn,
                    &ctx,
                    &ctx.data.agent,
                    ctx.data.amount,
                    ctx.data.newTotal,
                    StakeEventKind::Withdrawn,
                )
                .await
            }
            RegistryEvent::StakeLocked(ctx) => self.handle_stake_locked(txn, ctx).await,
            RegistryEvent::StakeUnlocked(ctx) => self.handle_stake_unlocked(txn, ctx).await,
        }
    }
}
