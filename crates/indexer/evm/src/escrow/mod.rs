pub mod handlers;
pub mod parser;

use alloy_primitives::B256;
use alloy_sol_types::{sol, SolEvent};

sol! {
    #[derive(Debug, PartialEq, Eq)]
    interface JobEscrow {
        event JobCreated(uint256 indexed jobId, address indexed client, address indexed agent, uint256 price);
        event JobSubmitted(uint256 indexed jobId, string deliverableUrl);
        event RevisionRequested(uint256 indexed jobId, string feedback);
        event JobApproved(uint256 indexed jobId);
        event JobDisputed(uint256 indexed jobId, address initiator);
        event PaymentReleased(uint256 indexed jobId, address recipient, uint256 amount);
    }
}

pub const ESCROW_EVENT_SIGNATURES: &[B256] = &[
    JobEscrow::JobCreated::SIGNATURE_HASH,
    JobEscrow::JobSubmitted::SIGNATURE_HASH,
    JobEscrow::RevisionRequested::SIGNATURE_HASH,
    JobEscrow::JobApproved::SIGNATURE_HASH,
    JobEscrow::JobDisputed::SIGNATURE_HASH,
    JobEscrow::PaymentReleased::SIGNATURE_HASH,
];
