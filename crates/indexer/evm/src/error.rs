use alloy_primitives::B256;
use sea_orm::DbErr;
use thiserror::Error;

/// Failures turning a raw log into a typed event.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("Missing transaction hash in log")]
    MissingTransactionHash,
    #[error("Missing block number in log")]
    MissingBlockNumber,
    #[error("Missing log index in log")]
    MissingLogIndex,
    #[error("Invalid block timestamp {0}")]
    InvalidBlockTimestamp(u64),
    #[error("Log carries no topics")]
    MissingTopic0,
    #[error("Unknown event type: {signature}")]
    UnknownEvent { signature: B256 },
    #[error("Failed to decode {event_type} event: {source}")]
    DecodeError {
        event_type: &'static str,
        #[source]
        source: alloy_sol_types::Error,
    },
    #[error("Stored amount '{value}' is not a valid uint256")]
    InvalidAmount { value: String },
}

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Parser(#[from] ParserError),
    #[error("Agent {address} is not indexed")]
    MissingAgent { address: String },
    #[error("Job {job_id} is not indexed")]
    MissingJob { job_id: String },
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl HandlerError {
    /// Errors that only affect the log being handled. The batch carries on.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            HandlerError::MissingAgent { .. } | HandlerError::MissingJob { .. }
        )
    }
}

#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("RPC error: {0}")]
    Rpc(String),
    #[error("Block {0} not found")]
    BlockNotFound(u64),
    #[error(transparent)]
    Parser(#[from] ParserError),
    #[error(transparent)]
    Handler(#[from] HandlerError),
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    #[error("Reorg detected at block {block}: checkpoint hash {expected}, chain hash {found}")]
    ReorgDetected {
        block: u64,
        expected: String,
        found: String,
    },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
