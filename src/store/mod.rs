//! Append-only manifest log.
//!
//! The [`ManifestStore`] trait records every manifest ever fetched and
//! derives the current one as the record with the largest id. Records are
//! never updated or deleted; manifests change roughly once per content
//! patch, so the log stays small.
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`SqliteManifestStore`](sqlite::SqliteManifestStore) | Durable store behind the CLI and [`Gunsmith`](crate::app::Gunsmith) |
//! | [`InMemoryManifestStore`](memory::InMemoryManifestStore) | Tests and embedding |

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::ManifestRecord;

pub use memory::InMemoryManifestStore;
pub use sqlite::SqliteManifestStore;

/// Abstract manifest log.
///
/// Implementations must make each append a single atomic insertion so
/// concurrent readers never observe a partial record, and must hand out
/// strictly increasing ids even when two appends land in the same
/// millisecond.
#[async_trait]
pub trait ManifestStore: Send + Sync {
    /// Record a freshly fetched manifest payload and return the stored record.
    async fn append(&self, payload: &serde_json::Value) -> Result<ManifestRecord>;

    /// The record with the largest id, or `None` if nothing was ever appended.
    async fn current(&self) -> Result<Option<ManifestRecord>>;

    /// Up to `limit` records, newest first.
    async fn history(&self, limit: usize) -> Result<Vec<ManifestRecord>>;
}

/// Next id for the log: wall-clock milliseconds, bumped past `last` when
/// the clock has not advanced (or went backwards).
pub(crate) fn next_id(last: Option<i64>) -> i64 {
    let now = chrono::Utc::now().timestamp_millis();
    match last {
        Some(last) if last >= now => last + 1,
        _ => now,
    }
}
