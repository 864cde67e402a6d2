#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use alloy_primitives::{address, Address, B256};
use alloy_rpc_types::Log;
use alloy_sol_types::SolEvent;
use async_trait::async_trait;
use common::config::{
    ChainConfig, ContractsConfig, DatabaseConfig, IndexerConfig, IndexerSettings,
};
use database::{client::DbClient, connect::connect};
use evm::{
    error::IndexerError,
    indexer::EvmIndexer,
    provider::{BlockHeader, ChainSource},
};
use migration::{Migrator, MigratorTrait};

pub const CHAIN_ID: u64 = 31337;
pub const REGISTRY: Address = address!("0x1000000000000000000000000000000000000001");
pub const ESCROW: Address = address!("0x2000000000000000000000000000000000000002");
pub const AGENT: Address = address!("0x00000000000000000000000000000000000000aa");
pub const CLIENT: Address = address!("0x00000000000000000000000000000000000000cc");
pub const GENESIS_TIME: u64 = 1_700_000_000;

pub async fn setup_db() -> Arc<DbClient> {
    let conn = connect("sqlite::memory:").await.unwrap();
    Migrator::up(&conn, None).await.unwrap();
    Arc::new(DbClient::new(conn))
}

pub fn test_config() -> IndexerConfig {
    IndexerConfig {
        database: DatabaseConfig {
            url: "sqlite::memory:".into(),
        },
        chain: ChainConfig {
            http_rpc_url: "http://localhost:8545".into(),
            chain_id: CHAIN_ID,
            start_block: 100,
            block_sync_batch_size: 50,
            block_time_ms: 10,
            finality_confirmations: 10,
            rpc_rate_limit: 100,
        },
        contracts: ContractsConfig {
            agent_registry_address: REGISTRY.to_string(),
            job_escrow_address: ESCROW.to_string(),
        },
        settings: IndexerSettings {
            max_retries: 3,
            retry_delay_ms: 1,
            run_migrations: true,
        },
    }
}

pub fn block_hash(number: u64, fork: u8) -> B256 {
    let mut bytes = [0u8; 32];
    bytes[0] = fork;
    bytes[24..].copy_from_slice(&number.to_be_bytes());
    B256::from(bytes)
}

pub fn block_time(number: u64) -> u64 {
    GENESIS_TIME + number * 12
}

pub fn tx_hash(n: u64) -> B256 {
    let mut bytes = [0xeeu8; 32];
    bytes[24..].copy_from_slice(&n.to_be_bytes());
    B256::from(bytes)
}

/// Builds the RPC form of `event` as emitted by `address`.
pub fn make_log<E: SolEvent>(
    address: Address,
    event: &E,
    block_number: u64,
    tx: u64,
    log_index: u64,
) -> Log {
    Log {
        inner: alloy_primitives::Log {
            address,
            data: event.encode_log_data(),
        },
        block_number: Some(block_number),
        block_hash: Some(block_hash(block_number, 0)),
        transaction_hash: Some(tx_hash(tx)),
        log_index: Some(log_index),
        ..Default::default()
    }
}

#[derive(Default)]
struct MockState {
    head: u64,
    logs: Vec<Log>,
    fork: u8,
    failing_log_calls: u32,
    log_calls: u32,
    chain_id: u64,
    failing_chain_id_calls: u32,
    chain_id_calls: u32,
}

/// In-memory chain that answers like a node's `eth_getLogs`.
#[derive(Clone, Default)]
pub struct MockChain {
    state: Arc<Mutex<MockState>>,
}

impl MockChain {
    pub fn new(head: u64) -> Self {
        let chain = Self::default();
        chain.set_head(head);
        chain.set_chain_id(CHAIN_ID);
        chain
    }

    pub fn set_head(&self, head: u64) {
        self.state.lock().unwrap().head = head;
    }

    pub fn set_chain_id(&self, chain_id: u64) {
        self.state.lock().unwrap().chain_id = chain_id;
    }

    pub fn fail_next_chain_id_calls(&self, n: u32) {
        self.state.lock().unwrap().failing_chain_id_calls = n;
    }

    pub fn chain_id_calls(&self) -> u32 {
        self.state.lock().unwrap().chain_id_calls
    }

    pub fn push(&self, log: Log) {
        self.state.lock().unwrap().logs.push(log);
    }

    pub fn replace_logs(&self, logs: Vec<Log>) {
        self.state.lock().unwrap().logs = logs;
    }

    /// Changes every block hash, as if the chain had been rewritten.
    pub fn reorg(&self) {
        self.state.lock().unwrap().fork += 1;
    }

    pub fn fail_next_log_calls(&self, n: u32) {
        self.state.lock().unwrap().failing_log_calls = n;
    }

    pub fn log_calls(&self) -> u32 {
        self.state.lock().unwrap().log_calls
    }
}

#[async_trait]
impl ChainSource for MockChain {
    async fn get_chain_id(&self) -> Result<u64, IndexerError> {
        let mut state = self.state.lock().unwrap();
        state.chain_id_calls += 1;
        if state.failing_chain_id_calls > 0 {
            state.failing_chain_id_calls -= 1;
            return Err(IndexerError::Rpc("connection refused".into()));
        }
        Ok(state.chain_id)
    }

    async fn get_current_chain_height(&self) -> Result<u64, IndexerError> {
        Ok(self.state.lock().unwrap().head)
    }

    async fn get_historical_logs(
        &self,
        addresses: &[Address],
        topics: &[B256],
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<Log>, IndexerError> {
        let mut state = self.state.lock().unwrap();
        state.log_calls += 1;
        if state.failing_log_calls > 0 {
            state.failing_log_calls -= 1;
            return Err(IndexerError::Rpc("connection reset".into()));
        }

        Ok(state
            .logs
            .iter()
            .filter(|log| {
                let block = log.block_number.unwrap_or_default();
                (from_block..=to_block).contains(&block)
                    && addresses.contains(&log.address())
                    && log.topic0().is_some_and(|t| topics.contains(t))
            })
            .cloned()
            .collect())
    }

    async fn get_block_header(&self, number: u64) -> Result<BlockHeader, IndexerError> {
        let state = self.state.lock().unwrap();
        if number > state.head {
            return Err(IndexerError::BlockNotFound(number));
        }
        Ok(BlockHeader {
            number,
            hash: block_hash(number, state.fork),
            timestamp: block_time(number),
        })
    }
}

pub async fn setup_indexer() -> (EvmIndexer<MockChain>, MockChain, Arc<DbClient>) {
    let db = setup_db().await;
    let chain = MockChain::new(200);
    let indexer = EvmIndexer::new(chain.clone(), db.clone(), &test_config()).unwrap();
    (indexer, chain, db)
}

pub fn agent_key() -> String {
    AGENT.to_string().to_lowercase()
}
