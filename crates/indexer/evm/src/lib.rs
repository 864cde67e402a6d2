pub mod error;
pub mod escrow;
pub mod handler;
pub mod indexer;
pub mod provider;
pub mod rate_limit;
pub mod registry;
