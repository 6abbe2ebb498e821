//! SQLite-backed [`ManifestStore`].

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::info;

use super::ManifestStore;
use crate::error::Result;
use crate::models::{manifest_version, ManifestRecord};

/// Manifest log stored in the `manifests` table (see [`crate::migrate`]).
pub struct SqliteManifestStore {
    pool: SqlitePool,
}

impl SqliteManifestStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ManifestRecord> {
    let payload_json: String = row.try_get("payload_json")?;
    Ok(ManifestRecord {
        id: row.try_get("id")?,
        payload: serde_json::from_str(&payload_json)?,
    })
}

#[async_trait]
impl ManifestStore for SqliteManifestStore {
    async fn append(&self, payload: &serde_json::Value) -> Result<ManifestRecord> {
        let now = chrono::Utc::now().timestamp_millis();
        let payload_json = serde_json::to_string(payload)?;

        // Id assignment and insert happen in one statement, so racing
        // appends are serialized by SQLite and ids stay strictly increasing.
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO manifests (id, version, payload_json)
            SELECT MAX(?, COALESCE(MAX(id), 0) + 1), ?, ? FROM manifests
            RETURNING id
            "#,
        )
        .bind(now)
        .bind(manifest_version(payload))
        .bind(&payload_json)
        .fetch_one(&self.pool)
        .await?;

        info!(id, version = ?manifest_version(payload), "appended manifest");

        Ok(ManifestRecord {
            id,
            payload: payload.clone(),
        })
    }

    async fn current(&self) -> Result<Option<ManifestRecord>> {
        let row = sqlx::query("SELECT id, payload_json FROM manifests ORDER BY id DESC LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn history(&self, limit: usize) -> Result<Vec<ManifestRecord>> {
        let rows = sqlx::query("SELECT id, payload_json FROM manifests ORDER BY id DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(record_from_row).collect()
    }
}
