use std::{collections::BTreeMap, sync::Arc, time::Duration};

use alloy_primitives::{Address, B256};
use alloy_rpc_types::Log;
use chrono::{DateTime, Utc};
use common::{
    config::{ChainConfig, IndexerConfig, IndexerSettings},
    indexer::{backoff_delay, with_retry_policy},
};
use database::client::DbClient;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    error::{IndexerError, ParserError},
    escrow::handlers::EscrowEventHandler,
    handler::{EvmEventHandler, Outcome},
    provider::{BlockHeader, ChainSource},
    registry::handlers::RegistryEventHandler,
};

/// Tally of what one batch did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub from_block: u64,
    pub to_block: u64,
    pub logs: usize,
    pub applied: usize,
    pub replayed: usize,
    pub skipped: usize,
    pub anomalies: usize,
    pub ignored: usize,
}

impl BatchSummary {
    fn new(from_block: u64, to_block: u64) -> Self {
        Self {
            from_block,
            to_block,
            ..Default::default()
        }
    }

    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Applied => self.applied += 1,
            Outcome::Replayed => self.replayed += 1,
            Outcome::Anomaly => self.anomalies += 1,
            Outcome::Ignored => self.ignored += 1,
        }
    }
}

pub struct EvmIndexer<S: ChainSource> {
    source: S,
    db: Arc<DbClient>,
    handlers: Vec<Box<dyn EvmEventHandler>>,
    chain: ChainConfig,
    settings: IndexerSettings,
}

impl<S: ChainSource> EvmIndexer<S> {
    pub fn new(source: S, db: Arc<DbClient>, config: &IndexerConfig) -> Result<Self, IndexerError> {
        if config.chain.block_sync_batch_size == 0 {
            return Err(IndexerError::InvalidConfig(
                "block_sync_batch_size must be at least 1".into(),
            ));
        }
        if config.chain.rpc_rate_limit == 0 {
            return Err(IndexerError::InvalidConfig(
                "rpc_rate_limit must be at least 1".into(),
            ));
        }

        let registry = parse_address("agent_registry_address", &config.contracts.agent_registry_address)?;
        let escrow = parse_address("job_escrow_address", &config.contracts.job_escrow_address)?;
        if registry == escrow {
            return Err(IndexerError::InvalidConfig(
                "registry and escrow must be different contracts".into(),
            ));
        }

        let handlers: Vec<Box<dyn EvmEventHandler>> = vec![
            Box::new(RegistryEventHandler::new(db.clone(), registry)),
            Box::new(EscrowEventHandler::new(db.clone(), escrow)),
        ];

        Ok(Self {
            source,
            db,
            handlers,
            chain: config.chain.clone(),
            settings: config.settings.clone(),
        })
    }

    fn chain_id(&self) -> i64 {
        self.chain.chain_id as i64
    }

    fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.settings.retry_delay_ms)
    }

    fn relevant_addresses(&self) -> Vec<Address> {
        self.handlers.iter().map(|h| h.relevant_address()).collect()
    }

    fn relevant_topics(&self) -> Vec<B256> {
        self.handlers
            .iter()
            .flat_map(|h| h.relevant_topics())
            .collect()
    }

    /// Fails when the RPC endpoint serves a different chain than configured.
    /// Transport errors are retried.
    pub async fn verify_chain(&self) -> Result<(), IndexerError> {
        let remote = with_retry_policy(self.settings.max_retries, self.retry_delay(), || {
            self.source.get_chain_id()
        })
        .await?;

        if remote != self.chain.chain_id {
            return Err(IndexerError::InvalidConfig(format!(
                "RPC endpoint serves chain {remote}, expected {}",
                self.chain.chain_id
            )));
        }
        Ok(())
    }

    /// First block still to be indexed.
    pub async fn initialize_state(&self) -> Result<u64, IndexerError> {
        let next = match self.db.get_last_synced_height(self.chain_id()).await? {
            Some(height) => height + 1,
            None => self.chain.start_block,
        };
        Ok(next)
    }

    /// Runs until a fatal error or until a batch keeps failing past
    /// `max_retries`.
    pub async fn run(&self) -> eyre::Result<()> {
        let mut next = self.initialize_state().await?;
        let idle = Duration::from_millis(self.chain.block_time_ms);
        let mut failures = 0u32;

        info!(chain_id = self.chain.chain_id, start_block = next, "Starting indexer");

        loop {
            match self.poll_once(next).await {
                Ok(Some(summary)) => {
                    failures = 0;
                    next = summary.to_block + 1;
                }
                Ok(None) => {
                    failures = 0;
                    sleep(idle).await;
                }
                Err(e @ (IndexerError::ReorgDetected { .. } | IndexerError::InvalidConfig(_))) => {
                    error!("Indexer halted: {e}");
                    return Err(e.into());
                }
                Err(e) => {
                    failures += 1;
                    if failures >= self.settings.max_retries {
                        error!(block = next, failures, "Giving up on batch: {e}");
                        return Err(e.into());
                    }

                    let delay = backoff_delay(self.retry_delay(), failures - 1);
                    warn!(block = next, failures, "Batch failed: {e}. Retrying in {:?}", delay);
                    sleep(delay).await;
                }
            }
        }
    }

    /// Indexes the next batch starting at `next`, if any block there is final.
    pub async fn poll_once(&self, next: u64) -> Result<Option<BatchSummary>, IndexerError> {
        let head = with_retry_policy(self.settings.max_retries, self.retry_delay(), || {
            self.source.get_current_chain_height()
        })
        .await?;

        let Some(safe_head) = head.checked_sub(self.chain.finality_confirmations) else {
            return Ok(None);
        };
        if next > safe_head {
            return Ok(None);
        }

        let to = next
            .saturating_add(self.chain.block_sync_batch_size - 1)
            .min(safe_head);

        self.verify_checkpoint().await?;
        self.sync_range(next, to).await.map(Some)
    }

    /// Checks that the checkpointed block is still part of the chain.
    async fn verify_checkpoint(&self) -> Result<(), IndexerError> {
        let Some(checkpoint) = self.db.get_checkpoint(self.chain_id()).await? else {
            return Ok(());
        };
        let Some(expected) = checkpoint.block_hash else {
            return Ok(());
        };

        let header = self.fetch_header(checkpoint.block_number as u64).await?;
        let found = format!("{:?}", header.hash);
        if found != expected {
            error!(
                block = checkpoint.block_number,
                %expected,
                %found,
                "Checkpointed block is no longer canonical"
            );
            return Err(IndexerError::ReorgDetected {
                block: checkpoint.block_number as u64,
                expected,
                found,
            });
        }
        Ok(())
    }

    async fn fetch_header(&self, number: u64) -> Result<BlockHeader, IndexerError> {
        with_retry_policy(self.settings.max_retries, self.retry_delay(), || {
            self.source.get_block_header(number)
        })
        .await
    }

    /// Applies every relevant log in `[from, to]` and advances the checkpoint
    /// to `to`, all in one database transaction. Replaying an already indexed
    /// range is a no-op and never moves the checkpoint back.
    #[instrument(skip(self), fields(CHAIN = %self.chain.chain_id))]
    pub async fn sync_range(&self, from: u64, to: u64) -> Result<BatchSummary, IndexerError> {
        let addresses = self.relevant_addresses();
        let topics = self.relevant_topics();

        let logs = with_retry_policy(self.settings.max_retries, self.retry_delay(), || {
            self.source
                .get_historical_logs(&addresses, &topics, from, to)
        })
        .await?;

        let logs = order_logs(logs)?;
        let timestamps = self.block_timestamps(&logs).await?;
        let checkpoint_header = self.fetch_header(to).await?;

        let mut summary = BatchSummary::new(from, to);
        summary.logs = logs.len();

        let txn = self.db.begin().await?;

        for log in &logs {
            let (block_number, log_index) = log_position(log)?;
            let timestamp = timestamps
                .get(&block_number)
                .copied()
                .ok_or(IndexerError::BlockNotFound(block_number))?;

            let Some(handler) = self
                .handlers
                .iter()
                .find(|h| h.relevant_address() == log.address())
            else {
                warn!(address = %log.address(), block_number, log_index, "Log from untracked contract");
                summary.ignored += 1;
                continue;
            };

            match handler.handle_event(&txn, log, timestamp).await {
                Ok(outcome) => summary.record(outcome),
                Err(e) if e.is_recoverable() => {
                    warn!(contract = handler.name(), block_number, log_index, "Skipping log: {e}");
                    summary.skipped += 1;
                }
                Err(e) => {
                    error!(contract = handler.name(), block_number, log_index, "Batch aborted: {e}");
                    if let Err(rollback) = txn.rollback().await {
                        error!("Rollback failed: {rollback}");
                    }
                    return Err(e.into());
                }
            }
        }

        let advanced = self
            .db
            .upsert_checkpoint(
                &txn,
                self.chain_id(),
                to as i64,
                Some(format!("{:?}", checkpoint_header.hash)),
                Utc::now(),
            )
            .await?;
        txn.commit().await?;

        if !advanced {
            debug!(to, "Range at or below checkpoint, checkpoint kept");
        }

        info!(
            from,
            to,
            logs = summary.logs,
            applied = summary.applied,
            replayed = summary.replayed,
            skipped = summary.skipped,
            anomalies = summary.anomalies,
            "Batch committed"
        );
        Ok(summary)
    }

    /// Block time for every block that has a log. Uses the timestamp the RPC
    /// attached to the log and falls back to the block header.
    async fn block_timestamps(
        &self,
        logs: &[Log],
    ) -> Result<BTreeMap<u64, DateTime<Utc>>, IndexerError> {
        let mut known: BTreeMap<u64, Option<u64>> = BTreeMap::new();
        for log in logs {
            let (block_number, _) = log_position(log)?;
            let entry = known.entry(block_number).or_default();
            if entry.is_none() {
                *entry = log.block_timestamp;
            }
        }

        let mut timestamps = BTreeMap::new();
        for (block_number, seconds) in known {
            let seconds = match seconds {
                Some(seconds) => seconds,
                None => self.fetch_header(block_number).await?.timestamp,
            };
            let timestamp = DateTime::<Utc>::from_timestamp(seconds as i64, 0)
                .ok_or(ParserError::InvalidBlockTimestamp(seconds))?;
            timestamps.insert(block_number, timestamp);
        }
        Ok(timestamps)
    }
}

fn parse_address(field: &str, value: &str) -> Result<Address, IndexerError> {
    value
        .parse::<Address>()
        .map_err(|e| IndexerError::InvalidConfig(format!("{field} '{value}': {e}")))
}

fn log_position(log: &Log) -> Result<(u64, u64), ParserError> {
    let block_number = log.block_number.ok_or(ParserError::MissingBlockNumber)?;
    let log_index = log.log_index.ok_or(ParserError::MissingLogIndex)?;
    Ok((block_number, log_index))
}

/// Drops removed logs and sorts the rest into chain order.
fn order_logs(logs: Vec<Log>) -> Result<Vec<Log>, ParserError> {
    let mut ordered = Vec::with_capacity(logs.len());
    for log in logs {
        if log.removed {
            warn!(tx = ?log.transaction_hash, log_index = ?log.log_index, "Dropping removed log");
            continue;
        }
        let position = log_position(&log)?;
        ordered.push((position, log));
    }
    ordered.sort_by_key(|(position, _)| *position);
    Ok(ordered.into_iter().map(|(_, log)| log).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_at(block_number: u64, log_index: u64) -> Log {
        Log {
            block_number: Some(block_number),
            log_index: Some(log_index),
            ..Default::default()
        }
    }

    #[test]
    fn logs_are_sorted_by_block_then_index() {
        let logs = vec![log_at(101, 0), log_at(100, 5), log_at(100, 1)];
        let positions: Vec<_> = order_logs(logs)
            .unwrap()
            .iter()
            .map(|l| log_position(l).unwrap())
            .collect();
        assert_eq!(positions, vec![(100, 1), (100, 5), (101, 0)]);
    }

    #[test]
    fn removed_logs_are_dropped() {
        let mut removed = log_at(100, 0);
        removed.removed = true;
        assert_eq!(order_logs(vec![removed, log_at(100, 1)]).unwrap().len(), 1);
    }

    #[test]
    fn logs_without_position_fail_the_batch() {
        let mut log = log_at(100, 0);
        log.block_number = None;
        assert!(matches!(
            order_logs(vec![log]),
            Err(ParserError::MissingBlockNumber)
        ));
    }
}
