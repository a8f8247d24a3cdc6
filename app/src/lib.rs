//! ABOUTME: Host application library wiring its models into the backoffice
//! ABOUTME: Shared by the binary and the integration tests

use bo_core::Result;
use bo_db::Db;

pub mod backoffice;
pub mod models;

/// Apply the application's own migrations on top of the auth tables
pub async fn migrate(db: &Db) -> Result<()> {
    db.migrate_with(sqlx::migrate!("./migrations")).await
}

/// Open the database with every migration applied
pub async fn open_db(path: &str, pool_size: u32) -> Result<Db> {
    let db = Db::with_pool_size(path, pool_size).await?;
    migrate(&db).await?;
    Ok(db)
}
