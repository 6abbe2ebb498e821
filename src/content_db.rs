//! Lifecycle of one open locale content database.
//!
//! A [`ContentDatabase`] moves through `unopened → open → closed` exactly
//! once. Querying outside the open state is a [`Error::Fault`]; closing is
//! idempotent. Handles are owned by a single logical operation and never
//! shared; [`ContentLibrary`](crate::content::ContentLibrary) opens one per
//! lookup and closes it on every exit path.
//!
//! # Table layout
//!
//! Each definition table has the shape `(id INTEGER PRIMARY KEY, json BLOB)`
//! where `id` is the definition's 32-bit hash reinterpreted as a signed
//! integer. Lookups match that key exactly.

use std::path::{Path, PathBuf};

use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection, Row};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{content_file_name, ContentTable};

enum HandleState {
    Unopened,
    Open {
        conn: SqliteConnection,
        path: PathBuf,
    },
    Closed,
}

/// A single-use connection to one content database file.
pub struct ContentDatabase {
    state: HandleState,
}

impl Default for ContentDatabase {
    fn default() -> Self {
        Self::new()
    }
}

/// Join the base name of a manifest-advertised path onto `content_dir`.
///
/// Directory components of `advertised` are discarded, so a path such as
/// `../../etc/passwd` resolves to `<content_dir>/passwd`.
pub fn resolve_content_path(content_dir: &Path, advertised: &str) -> Result<PathBuf> {
    let name = content_file_name(advertised).ok_or_else(|| {
        Error::InvalidArgument(format!("content path '{}' has no file name", advertised))
    })?;
    Ok(content_dir.join(name))
}

/// Hashes are unsigned 32-bit on the wire but stored as signed row ids.
pub fn hash_to_row_id(hash: u32) -> i64 {
    hash as i32 as i64
}

impl ContentDatabase {
    pub fn new() -> Self {
        Self {
            state: HandleState::Unopened,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, HandleState::Open { .. })
    }

    /// Path of the open database, if any.
    pub fn path(&self) -> Option<&Path> {
        match &self.state {
            HandleState::Open { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Open the content database named by `advertised` inside `content_dir`.
    ///
    /// Fails with [`Error::FileNotFound`] if the sanitized path does not
    /// exist, and with [`Error::Fault`] if this handle was already used.
    pub async fn open(&mut self, content_dir: &Path, advertised: &str) -> Result<()> {
        match self.state {
            HandleState::Unopened => {}
            HandleState::Open { .. } => return Err(Error::Fault("content database already open")),
            HandleState::Closed => return Err(Error::Fault("content database handle already closed")),
        }

        let path = resolve_content_path(content_dir, advertised)?;
        if !tokio::fs::try_exists(&path).await? {
            return Err(Error::FileNotFound(path));
        }

        let conn = SqliteConnectOptions::new()
            .filename(&path)
            .read_only(true)
            .connect()
            .await?;

        debug!(path = %path.display(), "opened content database");
        self.state = HandleState::Open { conn, path };
        Ok(())
    }

    /// Decoded JSON document for `hash` in `table`, or `None` if no row has
    /// that key.
    pub async fn query_by_hash(&mut self, table: ContentTable, hash: u32) -> Result<Option<Value>> {
        let conn = match &mut self.state {
            HandleState::Open { conn, .. } => conn,
            HandleState::Unopened => return Err(Error::Fault("content database queried before open")),
            HandleState::Closed => return Err(Error::Fault("content database queried after close")),
        };

        // Table names come from a closed enum, never from input.
        let sql = format!(
            "SELECT CAST(json AS TEXT) AS json FROM {} WHERE id = ?",
            table.table_name()
        );
        let row = sqlx::query(&sql)
            .bind(hash_to_row_id(hash))
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => {
                let json: String = row.try_get("json")?;
                Ok(Some(serde_json::from_str(&json)?))
            }
            None => {
                debug!(%table, hash, "no content row for hash");
                Ok(None)
            }
        }
    }

    /// Release the connection. Safe to call in any state, any number of times.
    pub async fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, HandleState::Closed) {
            HandleState::Open { conn, path } => {
                conn.close().await?;
                debug!(path = %path.display(), "closed content database");
                Ok(())
            }
            HandleState::Unopened | HandleState::Closed => Ok(()),
        }
    }
}

impl Drop for ContentDatabase {
    fn drop(&mut self) {
        if let HandleState::Open { path, .. } = &self.state {
            warn!(path = %path.display(), "content database handle dropped while open");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sqlx::sqlite::SqliteJournalMode;
    use tempfile::TempDir;

    const FILE: &str = "world_sql_content_test.content";

    async fn write_fixture(dir: &Path, rows: &[(ContentTable, u32, Value)]) -> PathBuf {
        let path = dir.join(FILE);
        let mut conn = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Delete)
            .connect()
            .await
            .unwrap();
        for table in ContentTable::ALL {
            sqlx::query(&format!(
                "CREATE TABLE {} (id INTEGER PRIMARY KEY NOT NULL, json BLOB)",
                table.table_name()
            ))
            .execute(&mut conn)
            .await
            .unwrap();
        }
        for (table, hash, doc) in rows {
            sqlx::query(&format!(
                "INSERT INTO {} (id, json) VALUES (?, ?)",
                table.table_name()
            ))
            .bind(hash_to_row_id(*hash))
            .bind(doc.to_string().into_bytes())
            .execute(&mut conn)
            .await
            .unwrap();
        }
        conn.close().await.unwrap();
        path
    }

    #[test]
    fn test_hash_to_row_id_wraps_high_hashes() {
        assert_eq!(hash_to_row_id(12345), 12345);
        assert_eq!(hash_to_row_id(3_628_991_658), -665_975_638);
    }

    #[test]
    fn test_resolve_content_path_drops_directories() {
        let dir = Path::new("/srv/content");
        assert_eq!(
            resolve_content_path(dir, "/common/destiny2_content/sqlite/en/a.content").unwrap(),
            PathBuf::from("/srv/content/a.content")
        );
        assert_eq!(
            resolve_content_path(dir, "../../../etc/passwd").unwrap(),
            PathBuf::from("/srv/content/passwd")
        );
        assert!(resolve_content_path(dir, "../").is_err());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mut never_opened = ContentDatabase::new();
        never_opened.close().await.unwrap();
        never_opened.close().await.unwrap();

        let tmp = TempDir::new().unwrap();
        write_fixture(tmp.path(), &[]).await;
        let mut db = ContentDatabase::new();
        db.open(tmp.path(), FILE).await.unwrap();
        assert!(db.is_open());
        db.close().await.unwrap();
        db.close().await.unwrap();
        assert!(!db.is_open());
    }

    #[tokio::test]
    async fn test_query_outside_open_state_faults() {
        let mut db = ContentDatabase::new();
        let err = db
            .query_by_hash(ContentTable::InventoryItemDefinition, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Fault(_)));

        let tmp = TempDir::new().unwrap();
        write_fixture(tmp.path(), &[]).await;
        db.open(tmp.path(), FILE).await.unwrap();
        db.close().await.unwrap();
        let err = db
            .query_by_hash(ContentTable::InventoryItemDefinition, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Fault(_)));
    }

    #[tokio::test]
    async fn test_missing_file_is_file_not_found() {
        let tmp = TempDir::new().unwrap();
        let mut db = ContentDatabase::new();
        let err = db
            .open(tmp.path(), "/common/destiny2_content/sqlite/en/missing.content")
            .await
            .unwrap_err();
        match err {
            Error::FileNotFound(path) => assert_eq!(path, tmp.path().join("missing.content")),
            other => panic!("expected FileNotFound, got {:?}", other),
        }
        assert!(!db.is_open());
    }

    #[tokio::test]
    async fn test_traversal_cannot_escape_content_dir() {
        let tmp = TempDir::new().unwrap();
        let content_dir = tmp.path().join("content");
        std::fs::create_dir_all(&content_dir).unwrap();
        // A real database one level up must not be reachable.
        write_fixture(tmp.path(), &[]).await;

        let mut db = ContentDatabase::new();
        let err = db
            .open(&content_dir, &format!("../{}", FILE))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_query_by_hash_exact_match() {
        let tmp = TempDir::new().unwrap();
        write_fixture(
            tmp.path(),
            &[
                (
                    ContentTable::InventoryItemDefinition,
                    12345,
                    json!({ "hash": 12345, "displayProperties": { "name": "Ace of Spades" } }),
                ),
                (
                    // Mentions 12345 inside a larger number; must not match.
                    ContentTable::InventoryItemDefinition,
                    999,
                    json!({ "hash": 999, "summaryItemHash": 1234567 }),
                ),
                (
                    ContentTable::VendorDefinition,
                    3_628_991_658,
                    json!({ "hash": 3_628_991_658u32, "displayProperties": { "icon": "/img/v.png" } }),
                ),
            ],
        )
        .await;

        let mut db = ContentDatabase::new();
        db.open(tmp.path(), FILE).await.unwrap();

        let item = db
            .query_by_hash(ContentTable::InventoryItemDefinition, 12345)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item["displayProperties"]["name"], "Ace of Spades");

        let vendor = db
            .query_by_hash(ContentTable::VendorDefinition, 3_628_991_658)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(vendor["displayProperties"]["icon"], "/img/v.png");

        assert!(db
            .query_by_hash(ContentTable::InventoryItemDefinition, 1234)
            .await
            .unwrap()
            .is_none());
        assert!(db
            .query_by_hash(ContentTable::ClassDefinition, 12345)
            .await
            .unwrap()
            .is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_handle_is_single_use() {
        let tmp = TempDir::new().unwrap();
        write_fixture(tmp.path(), &[]).await;
        let mut db = ContentDatabase::new();
        db.open(tmp.path(), FILE).await.unwrap();
        assert!(matches!(
            db.open(tmp.path(), FILE).await.unwrap_err(),
            Error::Fault(_)
        ));
        db.close().await.unwrap();
        assert!(matches!(
            db.open(tmp.path(), FILE).await.unwrap_err(),
            Error::Fault(_)
        ));
    }
}
