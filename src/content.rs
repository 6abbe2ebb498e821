//! Hash-keyed game content lookups against the current manifest.
//!
//! [`ContentLibrary::lookup`] is the single entry point: it resolves the
//! current manifest, derives the locale content database path, opens a
//! [`ContentDatabase`], runs the query and closes the handle before
//! returning, on success and on failure alike.
//!
//! No connection outlives a call. A lookup that raced a manifest append
//! completes against the manifest it resolved when it started.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::content_db::ContentDatabase;
use crate::error::{Error, Result};
use crate::models::ContentTable;
use crate::store::ManifestStore;

pub struct ContentLibrary {
    store: Arc<dyn ManifestStore>,
    content_dir: PathBuf,
    locale: String,
}

impl ContentLibrary {
    pub fn new(
        store: Arc<dyn ManifestStore>,
        content_dir: impl Into<PathBuf>,
        locale: impl Into<String>,
    ) -> Self {
        Self {
            store,
            content_dir: content_dir.into(),
            locale: locale.into(),
        }
    }

    pub fn content_dir(&self) -> &Path {
        &self.content_dir
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Look up one definition by hash in the current content database.
    ///
    /// # Errors
    ///
    /// - [`Error::ContentNotSynchronized`] if no manifest was ever recorded.
    /// - [`Error::MissingContentPath`] if the manifest has no database for the locale.
    /// - [`Error::FileNotFound`] if the database file is not on disk.
    pub async fn lookup(&self, table: ContentTable, hash: u32) -> Result<Option<Value>> {
        let manifest = self
            .store
            .current()
            .await?
            .ok_or(Error::ContentNotSynchronized)?;

        let advertised = manifest
            .content_path(&self.locale)
            .ok_or_else(|| Error::MissingContentPath {
                locale: self.locale.clone(),
            })?;

        let mut db = ContentDatabase::new();
        let result = async {
            db.open(&self.content_dir, advertised).await?;
            db.query_by_hash(table, hash).await
        }
        .await;

        if let Err(e) = db.close().await {
            warn!(error = %e, "failed to close content database");
        }

        result
    }

    pub async fn class_definition(&self, hash: u32) -> Result<Option<Value>> {
        self.lookup(ContentTable::ClassDefinition, hash).await
    }

    pub async fn item_definition(&self, hash: u32) -> Result<Option<Value>> {
        self.lookup(ContentTable::InventoryItemDefinition, hash).await
    }

    pub async fn item_category(&self, hash: u32) -> Result<Option<Value>> {
        self.lookup(ContentTable::ItemCategoryDefinition, hash).await
    }

    pub async fn vendor_definition(&self, hash: u32) -> Result<Option<Value>> {
        self.lookup(ContentTable::VendorDefinition, hash).await
    }

    /// Icon path from a vendor definition's display properties.
    pub async fn vendor_icon(&self, vendor_hash: u32) -> Result<Option<String>> {
        Ok(self.vendor_definition(vendor_hash).await?.and_then(|def| {
            def.pointer("/displayProperties/icon")
                .and_then(|icon| icon.as_str())
                .map(str::to_string)
        }))
    }
}
