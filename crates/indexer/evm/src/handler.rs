use alloy_primitives::{Address, B256, U256};
use alloy_rpc_types::Log;
use alloy_sol_types::SolEvent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::DatabaseTransaction;

use crate::error::{HandlerError, ParserError};

/// A decoded event together with the position of the log that carried it.
#[derive(Debug, Clone)]
pub struct LogContext<T> {
    pub tx_hash: String,
    pub log_index: i64,
    pub block_number: i64,
    pub timestamp: DateTime<Utc>,
    pub data: T,
}

/// What applying a single log did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// The log was already applied by an earlier run.
    Replayed,
    /// The log implied an invalid state change. See the handler for the policy.
    Anomaly,
    /// Topic not understood by the handler.
    Ignored,
}

#[async_trait]
pub trait EvmEventHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn relevant_address(&self) -> Address;

    fn relevant_topics(&self) -> Vec<B256>;

    /// Applies `log` inside the batch transaction. `timestamp` is the time of
    /// the block that contains the log.
    async fn handle_event(
        &self,
        txn: &DatabaseTransaction,
        log: &Log,
        timestamp: DateTime<Utc>,
    ) -> Result<Outcome, HandlerError>;
}

pub fn extract_log<T: SolEvent>(
    log: &Log,
    timestamp: DateTime<Utc>,
    event_name: &'static str,
) -> Result<LogContext<T>, ParserError> {
    let tx_hash = log
        .transaction_hash
        .ok_or(ParserError::MissingTransactionHash)?;
    let block_number = log.block_number.ok_or(ParserError::MissingBlockNumber)? as i64;
    let log_index = log.log_index.ok_or(ParserError::MissingLogIndex)? as i64;

    let decoded = log
        .log_decode::<T>()
        .map_err(|source| ParserError::DecodeError {
            event_type: event_name,
            source,
        })?;

    Ok(LogContext {
        tx_hash: format!("{tx_hash:?}"),
        log_index,
        block_number,
        timestamp,
        data: decoded.inner.data,
    })
}

/// Identity key of an on-chain account in the store.
pub fn address_key(address: &Address) -> String {
    address.to_string().to_lowercase()
}

pub fn parse_amount(value: &str) -> Result<U256, ParserError> {
    value.parse::<U256>().map_err(|_| ParserError::InvalidAmount {
        value: value.to_owned(),
    })
}
