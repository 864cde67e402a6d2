pub mod handlers;
pub mod parser;

use alloy_primitives::B256;
use alloy_sol_types::{sol, SolEvent};

sol! {
    #[derive(Debug, PartialEq, Eq)]
    interface AgentRegistry {
        event AgentRegistered(address indexed agent, uint256 stake, string ensName);
        event StakeAdded(address indexed agent, uint256 amount, uint256 newTotal);
        event StakeWithdrawn(address indexed agent, uint256 amount, uint256 newTotal);
        event StakeLocked(address indexed agent, uint256 amount, uint256 jobId);
        event StakeUnlocked(address indexed agent, uint256 amount, uint256 jobId);
    }
}

pub const REGISTRY_EVENT_SIGNATURES: &[B256] = &[
    AgentRegistry::AgentRegistered::SIGNATURE_HASH,
    AgentRegistry::StakeAdded::SIGNATURE_HASH,
    AgentRegistry::StakeWithdrawn::SIGNATURE_HASH,
    AgentRegistry::StakeLocked::SIGNATURE_HASH,
    AgentRegistry::StakeUnlocked::SIGNATURE_HASH,
];
