use sea_orm::{DatabaseConnection, DatabaseTransaction, DbErr, TransactionTrait};

/// Handle on the indexer's store.
///
/// Reads used by the write path take any [`sea_orm::ConnectionTrait`] so the
/// same queries run inside the per-batch transaction.
#[derive(Clone, Debug)]
pub struct DbClient {
    pub primary: DatabaseConnection,
}

impl DbClient {
    pub fn new(primary: DatabaseConnection) -> Self {
        Self { primary }
    }

    /// Opens the unit of work one batch of blocks is applied in.
    pub async fn begin(&self) -> Result<DatabaseTransaction, DbErr> {
        self.primary.begin().await
    }
}
