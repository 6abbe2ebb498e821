//! Core data types shared by the store, the remote client and the content layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// One fetched manifest, as recorded in the append-only manifest log.
///
/// `id` is the creation timestamp in milliseconds and doubles as the
/// ordering key: the current manifest is the record with the largest id.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestRecord {
    pub id: i64,
    pub payload: serde_json::Value,
}

impl ManifestRecord {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.id)
    }

    pub fn version(&self) -> Option<&str> {
        manifest_version(&self.payload)
    }

    /// The advertised path of the content database for `locale`.
    pub fn content_path(&self, locale: &str) -> Option<&str> {
        manifest_content_path(&self.payload, locale)
    }

    /// Base name of the advertised content path, the only part that is
    /// ever joined onto the local content directory.
    pub fn content_file_name(&self, locale: &str) -> Option<String> {
        self.content_path(locale).and_then(content_file_name)
    }
}

pub fn manifest_version(payload: &serde_json::Value) -> Option<&str> {
    payload.get("version").and_then(|v| v.as_str())
}

pub fn manifest_content_path<'a>(payload: &'a serde_json::Value, locale: &str) -> Option<&'a str> {
    payload
        .get("mobileWorldContentPaths")
        .and_then(|paths| paths.get(locale))
        .and_then(|p| p.as_str())
}

/// Reduce a remote-controlled path to its final component.
///
/// Both separators are honored so `..\\..\\evil` and `../../evil` both
/// collapse to `evil`. Returns `None` for empty, `.` or `..` names.
pub fn content_file_name(advertised: &str) -> Option<String> {
    let last = advertised
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();
    if last.is_empty() || last == "." || last == ".." {
        return None;
    }
    Path::new(last)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
}

/// Platform a Destiny membership lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MembershipType {
    Xbox = 1,
    Psn = 2,
}

impl MembershipType {
    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Xbox),
            2 => Some(Self::Psn),
            _ => None,
        }
    }
}

impl fmt::Display for MembershipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for MembershipType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "xbox" | "xbl" => Ok(Self::Xbox),
            "2" | "psn" | "playstation" => Ok(Self::Psn),
            other => Err(format!(
                "unknown membership type '{}': expected xbox (1) or psn (2)",
                other
            )),
        }
    }
}

/// Content tables that hash lookups may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentTable {
    ClassDefinition,
    InventoryItemDefinition,
    ItemCategoryDefinition,
    VendorDefinition,
}

impl ContentTable {
    pub const ALL: [ContentTable; 4] = [
        ContentTable::ClassDefinition,
        ContentTable::InventoryItemDefinition,
        ContentTable::ItemCategoryDefinition,
        ContentTable::VendorDefinition,
    ];

    pub fn table_name(self) -> &'static str {
        match self {
            ContentTable::ClassDefinition => "DestinyClassDefinition",
            ContentTable::InventoryItemDefinition => "DestinyInventoryItemDefinition",
            ContentTable::ItemCategoryDefinition => "DestinyItemCategoryDefinition",
            ContentTable::VendorDefinition => "DestinyVendorDefinition",
        }
    }
}

impl fmt::Display for ContentTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

impl FromStr for ContentTable {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        let name = name.strip_prefix("Destiny").unwrap_or(name);
        match name {
            "ClassDefinition" | "class" => Ok(ContentTable::ClassDefinition),
            "InventoryItemDefinition" | "ItemDefinition" | "item" => {
                Ok(ContentTable::InventoryItemDefinition)
            }
            "ItemCategoryDefinition" | "ItemCategory" | "category" => {
                Ok(ContentTable::ItemCategoryDefinition)
            }
            "VendorDefinition" | "vendor" => Ok(ContentTable::VendorDefinition),
            _ => Err(format!("unknown content table '{}'", s)),
        }
    }
}

/// A single cost line of a sale item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleCost {
    pub item_hash: u32,
    #[serde(default)]
    pub quantity: i64,
}

/// An item a vendor is currently offering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleItem {
    pub item_hash: u32,
    #[serde(default)]
    pub vendor_item_index: Option<i64>,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    #[serde(default)]
    pub costs: Vec<SaleCost>,
}

fn default_quantity() -> i64 {
    1
}

/// A titled group of sale items inside a vendor response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleCategory {
    pub title: String,
    #[serde(default)]
    pub items: Vec<SaleItem>,
}
