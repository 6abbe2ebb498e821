use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create the manifest log schema on an existing pool. Idempotent.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // Append-only: rows are inserted, never updated or deleted.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS manifests (
            id INTEGER PRIMARY KEY,
            version TEXT,
            payload_json TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_manifests_version ON manifests(version)")
        .execute(pool)
        .await?;

    Ok(())
}
