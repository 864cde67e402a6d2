use alloy_rpc_types::Log;
use alloy_sol_types::SolEvent;
use chrono::{DateTime, Utc};

use super::JobEscrow::{
    JobApproved, JobCreated, JobDisputed, JobSubmitted, PaymentReleased, RevisionRequested,
};
use crate::{
    error::ParserError,
    handler::{extract_log, LogContext},
};

#[derive(Debug)]
pub enum EscrowEvent {
    JobCreated(LogContext<JobCreated>),
    JobSubmitted(LogContext<JobSubmitted>),
    RevisionRequested(LogContext<RevisionRequested>),
    JobApproved(LogContext<JobApproved>),
    JobDisputed(LogContext<JobDisputed>),
    PaymentReleased(LogContext<PaymentReleased>),
}

impl EscrowEvent {
    pub fn decode(log: &Log, timestamp: DateTime<Utc>) -> Result<Self, ParserError> {
        let topic0 = log.topic0().ok_or(ParserError::MissingTopic0)?;

        match *topic0 {
            JobCreated::SIGNATURE_HASH => {
                extract_log(log, timestamp, "JobCreated").map(Self::JobCreated)
            }
            JobSubmitted::SIGNATURE_HASH => {
                extract_log(log, timestamp, "JobSubmitted").map(Self::JobSubmitted)
            }
            RevisionRequested::SIGNATURE_HASH => {
                extract_log(log, timestamp, "RevisionRequested").map(Self::RevisionRequested)
            }
            JobApproved::SIGNATURE_HASH => {
                extract_log(log, timestamp, "JobApproved").map(Self::JobApproved)
            }
            JobDisputed::SIGNATURE_HASH => {
                extract_log(log, timestamp, "JobDisputed").map(Self::JobDisputed)
            }
            PaymentReleased::SIGNATURE_HASH => {
                extract_log(log, timestamp, "PaymentReleased").map(Self::PaymentReleased)
            }
            signature => Err(ParserError::UnknownEvent { signature }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EscrowEvent::JobCreated(_) => "JobCreated",
            EscrowEvent::JobSubmitted(_) => "JobSubmitted",
            EscrowEvent::RevisionRequested(_) => "RevisionRequested",
            EscrowEvent::JobApproved(_) => "JobApproved",
            EscrowEvent::JobDisputed(_) => "JobDisputed",
            EscrowEvent::PaymentReleased(_) => "PaymentReleased",
        }
    }
}
