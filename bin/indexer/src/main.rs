use std::sync::Arc;

use common::{
    config::{IndexerConfig, LoadFromEnv},
    indexer::with_retry,
};
use database::{client::DbClient, connect::connect};
use evm::{indexer::EvmIndexer, provider::EvmProvider};
use eyre::Result;
use migration::{Migrator, MigratorTrait};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = IndexerConfig::load()?;

    let db_conn = with_retry(|| connect(&cfg.database.url)).await?;
    info!("Connected to Indexer's DB");

    if cfg.settings.run_migrations {
        Migrator::up(&db_conn, None).await?;
        info!("Migrations applied");
    }

    let db = Arc::new(DbClient::new(db_conn));

    let provider = EvmProvider::new(&cfg.chain.http_rpc_url, cfg.chain.rpc_rate_limit)?;
    let indexer = EvmIndexer::new(provider, db, &cfg)?;
    indexer.verify_chain().await?;

    tokio::select! {
        result = indexer.run() => {
            if let Err(e) = &result {
                error!("Indexer stopped: {e:?}");
            }
            result
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, stopping indexer");
            Ok(())
        }
    }
}
