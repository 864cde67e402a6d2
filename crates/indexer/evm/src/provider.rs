use std::sync::Arc;

use alloy_primitives::{Address, B256};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_types::{BlockNumberOrTag, Filter, Log};
use async_trait::async_trait;

use crate::{error::IndexerError, rate_limit::RateLimiter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub number: u64,
    pub hash: B256,
    pub timestamp: u64,
}

/// Read access to the chain the indexer follows.
#[async_trait]
pub trait ChainSource: Send + Sync {
    /// Chain id reported by the node.
    async fn get_chain_id(&self) -> Result<u64, IndexerError>;

    async fn get_current_chain_height(&self) -> Result<u64, IndexerError>;

    /// Logs emitted by `addresses` with one of `topics` as topic0, over the
    /// inclusive range `[from_block, to_block]`.
    async fn get_historical_logs(
        &self,
        addresses: &[Address],
        topics: &[B256],
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<Log>, IndexerError>;

    async fn get_block_header(&self, number: u64) -> Result<BlockHeader, IndexerError>;
}

/// JSON-RPC backed [`ChainSource`], throttled to the configured rate.
#[derive(Clone)]
pub struct EvmProvider {
    http: DynProvider,
    limiter: Arc<RateLimiter>,
}

impl EvmProvider {
    pub fn new(http_url: &str, rate_limit: u32) -> Result<Self, IndexerError> {
        let http = match http_url.parse() {
            Ok(url) => ProviderBuilder::new().connect_http(url).erased(),
            Err(e) => {
                return Err(IndexerError::InvalidConfig(format!(
                    "invalid RPC url {http_url}: {e}"
                )))
            }
        };

        Ok(Self {
            http,
            limiter: Arc::new(RateLimiter::new(rate_limit)),
        })
    }
}

#[async_trait]
impl ChainSource for EvmProvider {
    async fn get_chain_id(&self) -> Result<u64, IndexerError> {
        self.limiter.acquire().await;
        self.http
            .get_chain_id()
            .await
            .map_err(|e| IndexerError::Rpc(e.to_string()))
    }

    async fn get_current_chain_height(&self) -> Result<u64, IndexerError> {
        self.limiter.acquire().await;
        self.http
            .get_block_number()
            .await
            .map_err(|e| IndexerError::Rpc(e.to_string()))
    }

    async fn get_historical_logs(
        &self,
        addresses: &[Address],
        topics: &[B256],
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<Log>, IndexerError> {
        let filter = Filter::new()
            .address(addresses.to_vec())
            .event_signature(topics.to_vec())
            .from_block(from_block)
            .to_block(to_block);

        self.limiter.acquire().await;
        self.http
            .get_logs(&filter)
            .await
            .map_err(|e| IndexerError::Rpc(e.to_string()))
    }

    async fn get_block_header(&self, number: u64) -> Result<BlockHeader, IndexerError> {
        self.limiter.acquire().await;
        let block = self
            .http
            .get_block_by_number(BlockNumberOrTag::Number(number))
            .await
            .map_err(|e| IndexerError::Rpc(e.to_string()))?
            .ok_or(IndexerError::BlockNotFound(number))?;

        Ok(BlockHeader {
            number,
            hash: block.header.hash,
            timestamp: block.header.inner.timestamp,
        })
    }
}
