use alloy_rpc_types::Log;
use alloy_sol_types::SolEvent;
use chrono::{DateTime, Utc};

use super::AgentRegistry::{
    AgentRegistered, StakeAdded, StakeLocked, StakeUnlocked, StakeWithdrawn,
};
use crate::{
    error::ParserError,
    handler::{extract_log, LogContext},
};

#[derive(Debug)]
pub enum RegistryEvent {
    AgentRegistered(LogContext<AgentRegistered>),
    StakeAdded(LogContext<StakeAdded>),
    StakeWithdrawn(LogContext<StakeWithdrawn>),
    StakeLocked(LogContext<StakeLocked>),
    StakeUnlocked(LogContext<StakeUnlocked>),
}

impl RegistryEvent {
    pub fn decode(log: &Log, timestamp: DateTime<Utc>) -> Result<Self, ParserError> {
        let topic0 = log.topic0().ok_or(ParserError::MissingTopic0)?;

        match *topic0 {
            AgentRegistered::SIGNATURE_HASH => {
                extract_log(log, timestamp, "AgentRegistered").map(Self::AgentRegistered)
            }
            StakeAdded::SIGNATURE_HASH => {
                extract_log(log, timestamp, "StakeAdded").map(Self::StakeAdded)
            }
            StakeWithdrawn::SIGNATURE_HASH => {
                extract_log(log, timestamp, "StakeWithdrawn").map(Self::StakeWithdrawn)
            }
            StakeLocked::SIGNATURE_HASH => {
                extract_log(log, timestamp, "StakeLocked").map(Self::StakeLocked)
            }
            StakeUnlocked::SIGNATURE_HASH => {
                extract_log(log, timestamp, "StakeUnlocked").map(Self::StakeUnlocked)
            }
            signature => Err(ParserError::UnknownEvent { signature }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RegistryEvent::AgentRegistered(_) => "AgentRegistered",
            RegistryEvent::StakeAdded(_) => "StakeAdded",
            RegistryEvent::StakeWithdrawn(_) => "StakeWithdrawn",
            RegistryEvent::StakeLocked(_) => "StakeLocked",
            RegistryEvent::StakeUnlocked(_) => "StakeUnlocked",
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{address, keccak256, Address, Bytes, LogData, B256, U256};
    use chrono::TimeZone;

    use super::*;

    const REGISTRY: Address = address!("0x1000000000000000000000000000000000000001");
    const AGENT: Address = address!("0x00000000000000000000000000000000000000aa");

    fn rpc_log(data: LogData) -> Log {
        Log {
            inner: alloy_primitives::Log {
                address: REGISTRY,
                data,
            },
            block_number: Some(100),
            transaction_hash: Some(B256::repeat_byte(0x11)),
            log_index: Some(3),
            ..Default::default()
        }
    }

    fn ts() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn topics_match_canonical_signatures() {
        assert_eq!(
            AgentRegistered::SIGNATURE_HASH,
            keccak256("AgentRegistered(address,uint256,string)")
        );
        assert_eq!(
            StakeAdded::SIGNATURE_HASH,
            keccak256("StakeAdded(address,uint256,uint256)")
        );
        assert_eq!(
            StakeWithdrawn::SIGNATURE_HASH,
            keccak256("StakeWithdrawn(address,uint256,uint256)")
        );
        assert_eq!(
            StakeLocked::SIGNATURE_HASH,
            keccak256("StakeLocked(address,uint256,uint256)")
        );
        assert_eq!(
            StakeUnlocked::SIGNATURE_HASH,
            keccak256("StakeUnlocked(address,uint256,uint256)")
        );
    }

    #[test]
    fn indexed_agent_comes_from_low_bytes_of_topic1() {
        let event = StakeLocked {
            agent: AGENT,
            amount: U256::from(200),
            jobId: U256::from(7),
        };
        let mut data = event.encode_log_data();
        // Dirty padding must not leak into the address.
        let mut topics = data.topics().to_vec();
        topics[1].0[0] = 0xff;
        data = LogData::new_unchecked(topics, data.data.clone());

        let RegistryEvent::StakeLocked(ctx) = RegistryEvent::decode(&rpc_log(data), ts()).unwrap()
        else {
            panic!("expected StakeLocked");
        };
        assert_eq!(ctx.data.agent, AGENT);
        assert_eq!(ctx.data.amount, U256::from(200));
        assert_eq!(ctx.data.jobId, U256::from(7));
        assert_eq!(ctx.log_index, 3);
        assert_eq!(ctx.block_number, 100);
        assert_eq!(ctx.tx_hash, format!("{:?}", B256::repeat_byte(0x11)));
    }

    #[test]
    fn truncated_data_is_a_decode_error() {
        let event = StakeAdded {
            agent: AGENT,
            amount: U256::from(500),
            newTotal: U256::from(1500),
        };
        let full = event.encode_log_data();
        let data = LogData::new_unchecked(full.topics().to_vec(), Bytes::from(vec![0u8; 40]));

        let err = RegistryEvent::decode(&rpc_log(data), ts()).unwrap_err();
        assert!(matches!(
            err,
            ParserError::DecodeError {
                event_type: "StakeAdded",
                ..
            }
        ));
    }

    #[test]
    fn unknown_topic_is_reported_with_its_hash() {
        let unknown = keccak256("Paused(address)");
        let data = LogData::new_unchecked(vec![unknown], Bytes::new());

        let err = RegistryEvent::decode(&rpc_log(data), ts()).unwrap_err();
        assert!(matches!(err, ParserError::UnknownEvent { signature } if signature == unknown));
    }

    #[test]
    fn empty_topics_are_rejected() {
        let data = LogData::new_unchecked(vec![], Bytes::new());
        assert!(matches!(
            RegistryEvent::decode(&rpc_log(data), ts()),
            Err(ParserError::MissingTopic0)
        ));
    }
}
