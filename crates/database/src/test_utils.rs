use migration::{Migrator, MigratorTrait};

use crate::{client::DbClient, connect::connect};

pub async fn setup_db() -> DbClient {
    let conn = connect("sqlite::memory:").await.unwrap();
    Migrator::up(&conn, None).await.unwrap();
    DbClient::new(conn)
}
