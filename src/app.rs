//! Composition root.
//!
//! [`Gunsmith`] owns every long-lived piece (manifest log, remote client,
//! response cache, content library) and is constructed explicitly by the
//! embedding application. Nothing here is a process-wide singleton; two
//! instances share no state.
//!
//! Remote reads that change on a slow cadence go through the cache:
//!
//! | Operation | Cache key |
//! |-----------|-----------|
//! | [`manifest`](Gunsmith::manifest) | `manifest` |
//! | [`vendor_sale_items`](Gunsmith::vendor_sale_items) | `vendor:<type>:<membership>:<character>:<vendor>:<category>` |
//! | [`membership_id_for`](Gunsmith::membership_id_for) | `membership:<type>:<display name>` |
//!
//! Access tokens never appear in a key.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use sqlx::SqlitePool;
use tracing::info;

use crate::api::{ApiClient, CharacterRef, Rotation};
use crate::cache::ResponseCache;
use crate::config::Config;
use crate::content::ContentLibrary;
use crate::error::{Error, Result};
use crate::models::{ContentTable, MembershipType, SaleItem};
use crate::store::{ManifestStore, SqliteManifestStore};
use crate::{db, migrate};

pub const MANIFEST_KEY: &str = "manifest";

pub struct Gunsmith {
    config: Config,
    pool: Option<SqlitePool>,
    store: Arc<dyn ManifestStore>,
    client: ApiClient,
    cache: ResponseCache<Value>,
    content: ContentLibrary,
}

impl Gunsmith {
    /// Connect to the manifest database, apply migrations and wire up
    /// the client, cache and content library.
    pub async fn init(config: Config) -> anyhow::Result<Self> {
        let pool = db::connect(&config).await?;
        migrate::apply(&pool).await?;
        std::fs::create_dir_all(&config.content.dir)?;

        let store: Arc<dyn ManifestStore> = Arc::new(SqliteManifestStore::new(pool.clone()));
        let client = ApiClient::new(&config.api)?;
        let mut app = Self::from_parts(config, store, client);
        app.pool = Some(pool);

        info!(
            db = %app.config.db.path.display(),
            content_dir = %app.config.content.dir.display(),
            locale = %app.config.content.locale,
            "gunsmith initialized"
        );
        Ok(app)
    }

    /// Assemble from already-built parts, e.g. an in-memory manifest store.
    pub fn from_parts(config: Config, store: Arc<dyn ManifestStore>, client: ApiClient) -> Self {
        let cache = ResponseCache::from_config(&config.cache);
        let content = ContentLibrary::new(
            store.clone(),
            config.content.dir.clone(),
            config.content.locale.clone(),
        );
        Self {
            config,
            pool: None,
            store,
            client,
            cache,
            content,
        }
    }

    /// Close the manifest database. Cached responses are dropped with `self`.
    pub async fn shutdown(self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
        info!("gunsmith shut down");
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ManifestStore> {
        &self.store
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn cache(&self) -> &ResponseCache<Value> {
        &self.cache
    }

    pub fn content(&self) -> &ContentLibrary {
        &self.content
    }

    pub fn content_dir(&self) -> &Path {
        self.content.content_dir()
    }

    /// Manifest descriptor, fetched once and then served from the cache.
    pub async fn manifest(&self) -> Result<Value> {
        self.cache
            .get_or_fetch(MANIFEST_KEY, || self.client.get_manifest())
            .await
    }

    /// Sale items of one category at one vendor, cached per character.
    pub async fn vendor_sale_items(
        &self,
        character: &CharacterRef,
        vendor_hash: &str,
        category: &str,
        access_token: Option<&str>,
    ) -> Result<Vec<SaleItem>> {
        let key = format!(
            "vendor:{}:{}:{}:{}:{}",
            character.membership_type,
            character.membership_id,
            character.character_id,
            vendor_hash,
            category
        );
        let value = self
            .cache
            .get_or_fetch(&key, || async {
                let items = self
                    .client
                    .get_vendor_sale_items_by_category(character, vendor_hash, category, access_token)
                    .await?;
                Ok::<_, Error>(serde_json::to_value(items)?)
            })
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn rotation(
        &self,
        rotation: Rotation,
        character: &CharacterRef,
        access_token: Option<&str>,
    ) -> Result<Vec<SaleItem>> {
        self.vendor_sale_items(
            character,
            rotation.vendor_hash(),
            rotation.category(),
            access_token,
        )
        .await
    }

    /// Membership id for a display name; misses are cached too.
    pub async fn membership_id_for(
        &self,
        membership_type: MembershipType,
        display_name: &str,
    ) -> Result<Option<String>> {
        let key = format!("membership:{}:{}", membership_type, display_name);
        let value = self
            .cache
            .get_or_fetch(&key, || async {
                let id = self
                    .client
                    .get_membership_id_from_display_name(membership_type, display_name)
                    .await?;
                Ok::<_, Error>(id.map(Value::String).unwrap_or(Value::Null))
            })
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    pub async fn lookup(&self, table: ContentTable, hash: u32) -> Result<Option<Value>> {
        self.content.lookup(table, hash).await
    }

    pub async fn item_definition(&self, hash: u32) -> Result<Option<Value>> {
        self.content.item_definition(hash).await
    }

    pub async fn vendor_icon(&self, vendor_hash: u32) -> Result<Option<String>> {
        self.content.vendor_icon(vendor_hash).await
    }

    /// Called after a new manifest is recorded. Clears cached responses when
    /// `cache.invalidate_on_manifest` is set, then primes the manifest entry.
    pub(crate) fn manifest_changed(&self, manifest: &Value) {
        if self.config.cache.invalidate_on_manifest {
            let dropped = self.cache.clear();
            info!(dropped, "response cache cleared after manifest change");
        }
        self.cache.insert(MANIFEST_KEY, manifest.clone());
    }
}
