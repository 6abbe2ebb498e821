//! Client for the Destiny 2 platform API.
//!
//! Every call sends the `X-API-Key` header; user-scoped calls also send a
//! bearer access token. Responses arrive wrapped in an envelope:
//!
//! ```json
//! { "Response": { ... }, "ErrorCode": 1, "ErrorStatus": "Success", "Message": "Ok" }
//! ```
//!
//! # Outcome mapping
//!
//! | Situation | Result |
//! |-----------|--------|
//! | Transport failure (connect, reset, timeout) | [`Error::Network`] |
//! | `ErrorCode` 1 | `Ok(Some(Response))`, or `Ok(None)` if the envelope has no payload |
//! | `ErrorCode` 1627 (vendor not available) | `Ok(None)`, an empty result and never an error |
//! | Any other `ErrorCode` | [`Error::Remote`] with code, message and status |
//! | Body is not an envelope | [`Error::UnexpectedResponse`] |
//!
//! The client never retries and never touches the [`ResponseCache`](crate::cache::ResponseCache);
//! caching is up to the caller (see [`Gunsmith`](crate::app::Gunsmith)).

use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::models::{MembershipType, SaleCategory, SaleItem};

/// Envelope code for a successful call.
pub const SUCCESS: i64 = 1;

/// Envelope code returned when a vendor is not currently available
/// (e.g. Iron Banner is not running). Resolves to an empty result.
pub const FEATURE_UNAVAILABLE: i64 = 1627;

/// Vendor hashes for the rotations the convenience calls cover.
pub mod vendors {
    /// Banshee-44, the gunsmith.
    pub const GUNSMITH: &str = "672118013";
    /// Lord Saladin, Iron Banner.
    pub const IRON_BANNER: &str = "895295461";
    /// Xur, agent of the Nine.
    pub const XUR: &str = "2190858386";
}

/// Sale category titles as the vendor responses spell them. Matching is
/// exact and case-sensitive.
pub mod categories {
    pub const FIELD_TEST_WEAPONS: &str = "Field Test Weapons";
    pub const FOUNDRY_ORDERS: &str = "Foundry Orders";
    pub const EVENT_REWARDS: &str = "Event Rewards";
    pub const EXOTIC_GEAR: &str = "Exotic Gear";
}

/// A named vendor rotation: one category at one vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    FieldTestWeapons,
    FoundryOrders,
    IronBannerEventRewards,
    ExoticGear,
}

impl Rotation {
    pub fn vendor_hash(self) -> &'static str {
        match self {
            Rotation::FieldTestWeapons | Rotation::FoundryOrders => vendors::GUNSMITH,
            Rotation::IronBannerEventRewards => vendors::IRON_BANNER,
            Rotation::ExoticGear => vendors::XUR,
        }
    }

    pub fn category(self) -> &'static str {
        match self {
            Rotation::FieldTestWeapons => categories::FIELD_TEST_WEAPONS,
            Rotation::FoundryOrders => categories::FOUNDRY_ORDERS,
            Rotation::IronBannerEventRewards => categories::EVENT_REWARDS,
            Rotation::ExoticGear => categories::EXOTIC_GEAR,
        }
    }
}

impl std::str::FromStr for Rotation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "field-test" | "field-test-weapons" => Ok(Rotation::FieldTestWeapons),
            "foundry" | "foundry-orders" => Ok(Rotation::FoundryOrders),
            "iron-banner" => Ok(Rotation::IronBannerEventRewards),
            "xur" | "exotic-gear" => Ok(Rotation::ExoticGear),
            other => Err(format!(
                "unknown rotation '{}': expected field-test, foundry, iron-banner or xur",
                other
            )),
        }
    }
}

/// Vendor components: 400 vendors, 402 sales.
const VENDOR_COMPONENTS: &str = "400,402";
/// Character component.
const CHARACTER_COMPONENTS: &str = "200";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Envelope {
    error_code: i64,
    #[serde(default)]
    error_status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    response: Option<Value>,
}

/// The character a user-scoped call is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterRef {
    pub membership_type: MembershipType,
    pub membership_id: String,
    pub character_id: String,
}

impl CharacterRef {
    pub fn new(
        membership_type: MembershipType,
        membership_id: impl Into<String>,
        character_id: impl Into<String>,
    ) -> Self {
        Self {
            membership_type,
            membership_id: membership_id.into(),
            character_id: character_id.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        require("membership_id", &self.membership_id)?;
        require("character_id", &self.character_id)
    }
}

fn require(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidArgument(format!("{} must not be empty", name)));
    }
    Ok(())
}

/// Translate one HTTP response into the client's outcome.
///
/// Kept free of I/O so the mapping table above can be tested directly.
pub fn interpret_envelope(status: StatusCode, body: &[u8]) -> Result<Option<Value>> {
    let envelope: Envelope = match serde_json::from_slice(body) {
        Ok(env) => env,
        Err(e) => {
            let snippet: String = String::from_utf8_lossy(body).chars().take(200).collect();
            return Err(Error::UnexpectedResponse {
                status: status.as_u16(),
                detail: if snippet.is_empty() {
                    e.to_string()
                } else {
                    snippet
                },
            });
        }
    };

    match envelope.error_code {
        SUCCESS => Ok(envelope.response),
        FEATURE_UNAVAILABLE => {
            info!(
                status = envelope.error_status.as_deref().unwrap_or(""),
                "remote feature unavailable, resolving to empty result"
            );
            Ok(None)
        }
        code => {
            let err = Error::Remote {
                code,
                message: envelope.message.unwrap_or_default(),
                status: envelope.error_status.unwrap_or_default(),
            };
            warn!(%err, "remote call failed");
            Err(err)
        }
    }
}

/// Pick the sale items of the category titled exactly `title`.
///
/// The vendor payload bundles sale groups as
/// `{"categories": [{"title": ..., "items": [...]}, ...]}`. A missing
/// payload, a missing `categories` array or no matching title all yield
/// an empty list. Items keep the order the remote listed them in.
pub fn select_category(response: Option<&Value>, title: &str) -> Result<Vec<SaleItem>> {
    let Some(raw) = response.and_then(|r| r.get("categories")) else {
        return Ok(Vec::new());
    };
    let groups: Vec<SaleCategory> = serde_json::from_value(raw.clone())?;
    Ok(groups
        .into_iter()
        .filter(|group| group.title == title)
        .flat_map(|group| group.items)
        .collect())
}

/// HTTP client for the platform API.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    content_base_url: Url,
    api_key: Option<String>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(format!(
            "gunsmith/{}",
            option_env!("CARGO_PKG_VERSION").unwrap_or("0.0.0")
        ));
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(Error::Network)?;

        Ok(Self {
            http,
            base_url: parse_base(&config.base_url)?,
            content_base_url: parse_base(&config.content_base_url)?,
            api_key: config.resolve_api_key(),
        })
    }

    /// Build `base/<segments...>/`; each segment is percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| Error::InvalidArgument("api.base_url cannot be a base".into()))?;
            path.pop_if_empty();
            path.extend(segments);
            // The platform expects a trailing slash.
            path.push("");
        }
        Ok(url)
    }

    async fn send(&self, url: Url, access_token: Option<&str>) -> Result<Option<Value>> {
        debug!(%url, "remote request");
        let mut request = self.http.get(url);
        if let Some(key) = &self.api_key {
            request = request.header("X-API-Key", key);
        }
        if let Some(token) = access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(Error::Network)?;
        let status = response.status();
        let body = response.bytes().await.map_err(Error::Network)?;
        interpret_envelope(status, &body)
    }

    /// Current manifest descriptor.
    pub async fn get_manifest(&self) -> Result<Value> {
        let url = self.endpoint(&["Destiny2", "Manifest"])?;
        self.send(url, None)
            .await?
            .ok_or_else(|| Error::UnexpectedResponse {
                status: StatusCode::OK.as_u16(),
                detail: "manifest response carried no payload".into(),
            })
    }

    /// Character summary for one character of a membership.
    pub async fn get_character_summary(
        &self,
        character: &CharacterRef,
        access_token: Option<&str>,
    ) -> Result<Option<Value>> {
        character.validate()?;
        let membership_type = character.membership_type.to_string();
        let mut url = self.endpoint(&[
            "Destiny2",
            &membership_type,
            "Profile",
            &character.membership_id,
            "Character",
            &character.character_id,
        ])?;
        url.query_pairs_mut()
            .append_pair("components", CHARACTER_COMPONENTS);
        self.send(url, access_token).await
    }

    /// Sale items of one titled category at one vendor.
    ///
    /// An unavailable vendor, an empty payload or a missing category all
    /// resolve to an empty list.
    pub async fn get_vendor_sale_items_by_category(
        &self,
        character: &CharacterRef,
        vendor_hash: &str,
        category: &str,
        access_token: Option<&str>,
    ) -> Result<Vec<SaleItem>> {
        character.validate()?;
        require("vendor_hash", vendor_hash)?;
        require("category", category)?;

        let membership_type = character.membership_type.to_string();
        let mut url = self.endpoint(&[
            "Destiny2",
            &membership_type,
            "Profile",
            &character.membership_id,
            "Character",
            &character.character_id,
            "Vendors",
            vendor_hash,
        ])?;
        url.query_pairs_mut()
            .append_pair("components", VENDOR_COMPONENTS);

        let response = self.send(url, access_token).await?;
        select_category(response.as_ref(), category)
    }

    /// Inventory item definition straight from the remote manifest service.
    pub async fn get_item_definition(&self, item_hash: &str) -> Result<Option<Value>> {
        require("item_hash", item_hash)?;
        let url = self.endpoint(&[
            "Destiny2",
            "Manifest",
            "DestinyInventoryItemDefinition",
            item_hash,
        ])?;
        self.send(url, None).await
    }

    /// Resolve a display name to a membership id on one platform.
    ///
    /// Returns `None` when no player matches.
    pub async fn get_membership_id_from_display_name(
        &self,
        membership_type: MembershipType,
        display_name: &str,
    ) -> Result<Option<String>> {
        require("display_name", display_name)?;
        let membership_type = membership_type.to_string();
        let url = self.endpoint(&[
            "Destiny2",
            "SearchDestinyPlayer",
            &membership_type,
            display_name,
        ])?;

        let response = self.send(url, None).await?;
        Ok(response
            .as_ref()
            .and_then(|r| r.as_array())
            .and_then(|players| players.first())
            .and_then(|player| player.get("membershipId"))
            .and_then(|id| match id {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            }))
    }

    /// Sale items of a named rotation. Empty while the vendor is away.
    pub async fn rotation(
        &self,
        rotation: Rotation,
        character: &CharacterRef,
        access_token: Option<&str>,
    ) -> Result<Vec<SaleItem>> {
        self.get_vendor_sale_items_by_category(
            character,
            rotation.vendor_hash(),
            rotation.category(),
            access_token,
        )
        .await
    }

    pub async fn field_test_weapons(
        &self,
        character: &CharacterRef,
        access_token: Option<&str>,
    ) -> Result<Vec<SaleItem>> {
        self.rotation(Rotation::FieldTestWeapons, character, access_token)
            .await
    }

    pub async fn foundry_orders(
        &self,
        character: &CharacterRef,
        access_token: Option<&str>,
    ) -> Result<Vec<SaleItem>> {
        self.rotation(Rotation::FoundryOrders, character, access_token)
            .await
    }

    /// Empty while Iron Banner is not running.
    pub async fn iron_banner_event_rewards(
        &self,
        character: &CharacterRef,
        access_token: Option<&str>,
    ) -> Result<Vec<SaleItem>> {
        self.rotation(Rotation::IronBannerEventRewards, character, access_token)
            .await
    }

    /// Empty while Xur is away.
    pub async fn exotic_gear(
        &self,
        character: &CharacterRef,
        access_token: Option<&str>,
    ) -> Result<Vec<SaleItem>> {
        self.rotation(Rotation::ExoticGear, character, access_token)
            .await
    }

    /// Resolve a manifest-advertised content path against `content_base_url`.
    ///
    /// The result must stay on the configured content origin; absolute and
    /// scheme-relative paths pointing elsewhere are rejected.
    pub fn content_url(&self, advertised_path: &str) -> Result<Url> {
        require("content path", advertised_path)?;
        let url = self
            .content_base_url
            .join(advertised_path)
            .map_err(|e| Error::InvalidArgument(format!("content path: {}", e)))?;
        if url.origin() != self.content_base_url.origin() {
            return Err(Error::InvalidArgument(format!(
                "content path '{}' leaves the content host",
                advertised_path
            )));
        }
        Ok(url)
    }

    /// Download a zipped content database advertised by the manifest.
    ///
    /// Sent without the API key; the content host does not need it.
    pub async fn download_content(&self, advertised_path: &str) -> Result<Vec<u8>> {
        let url = self.content_url(advertised_path)?;

        debug!(%url, "downloading content database");
        let response = self.http.get(url).send().await.map_err(Error::Network)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::UnexpectedResponse {
                status: status.as_u16(),
                detail: body.chars().take(200).collect(),
            });
        }
        let bytes = response.bytes().await.map_err(Error::Network)?;
        Ok(bytes.to_vec())
    }
}

fn parse_base(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| Error::InvalidArgument(format!("invalid base url '{}': {}", raw, e)))
}
