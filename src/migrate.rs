use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// `scuba init`: create the database file and schema, then close.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;

    tracing::info!(path = %config.db.path.display(), "database initialized");
    Ok(())
}

/// Create the schema on an open pool. Idempotent.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
