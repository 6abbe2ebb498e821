//! Shared fixtures: a local stand-in for the platform API and a content
//! database builder.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{json, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::{ConnectOptions, Connection};

use gunsmith::api::vendors;
use gunsmith::config::Config;
use gunsmith::content_db::hash_to_row_id;
use gunsmith::models::ContentTable;

pub const API_KEY: &str = "test-api-key";
pub const CONTENT_PREFIX: &str = "/common/destiny2_content/sqlite/en/";

/// One request as the mock server saw it.
#[derive(Debug, Clone)]
pub struct Seen {
    pub path: String,
    pub query: Option<String>,
    pub api_key: Option<String>,
    pub authorization: Option<String>,
}

pub struct MockState {
    pub requests: Mutex<Vec<Seen>>,
    pub manifest_hits: AtomicUsize,
    pub vendor_hits: AtomicUsize,
    pub downloads: AtomicUsize,
    pub version: Mutex<String>,
    /// Zipped content database served for every content path.
    pub content_zip: Mutex<Vec<u8>>,
}

pub struct MockApi {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
}

impl MockApi {
    pub fn base_url(&self) -> String {
        format!("http://{}/Platform", self.addr)
    }

    pub fn content_base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn set_version(&self, version: &str) {
        *self.state.version.lock().unwrap() = version.to_string();
    }

    pub fn set_content(&self, zip: Vec<u8>) {
        *self.state.content_zip.lock().unwrap() = zip;
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn last_seen(&self) -> Seen {
        self.seen().last().cloned().expect("no requests recorded")
    }

    /// A config rooted at `root` that talks to this server.
    pub fn config(&self, root: &Path) -> Config {
        let mut cfg = Config::minimal(root);
        cfg.api.base_url = self.base_url();
        cfg.api.content_base_url = self.content_base_url();
        cfg.api.api_key = Some(API_KEY.to_string());
        cfg
    }
}

pub fn content_file_for(version: &str) -> String {
    format!("world_sql_content_{}.content", version)
}

fn envelope(response: Value) -> Response {
    Json(json!({
        "Response": response,
        "ErrorCode": 1,
        "ThrottleSeconds": 0,
        "ErrorStatus": "Success",
        "Message": "Ok",
        "MessageData": {}
    }))
    .into_response()
}

fn error_envelope(status: StatusCode, code: i64, error_status: &str, message: &str) -> Response {
    (
        status,
        Json(json!({
            "ErrorCode": code,
            "ThrottleSeconds": 0,
            "ErrorStatus": error_status,
            "Message": message,
            "MessageData": {}
        })),
    )
        .into_response()
}

fn vendor_bundle() -> Value {
    json!({
        "categories": [
            {
                "title": "Foundry Orders",
                "items": [
                    { "itemHash": 3001, "vendorItemIndex": 0, "quantity": 1 },
                    { "itemHash": 3002, "vendorItemIndex": 1, "quantity": 1 }
                ]
            },
            {
                "title": "Field Test Weapons",
                "items": [
                    { "itemHash": 2002, "vendorItemIndex": 7, "quantity": 1,
                      "costs": [ { "itemHash": 3159615086u32, "quantity": 500 } ] },
                    { "itemHash": 2001, "vendorItemIndex": 3, "quantity": 1 }
                ]
            }
        ]
    })
}

async fn handle(State(state): State<Arc<MockState>>, uri: Uri, headers: HeaderMap) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let path = uri.path().to_string();
    state.requests.lock().unwrap().push(Seen {
        path: path.clone(),
        query: uri.query().map(str::to_string),
        api_key: header("x-api-key"),
        authorization: header("authorization"),
    });

    if let Some(file) = path.strip_prefix(CONTENT_PREFIX) {
        state.downloads.fetch_add(1, Ordering::SeqCst);
        let version = state.version.lock().unwrap().clone();
        if file != content_file_for(&version) {
            return (StatusCode::NOT_FOUND, "no such content").into_response();
        }
        return state.content_zip.lock().unwrap().clone().into_response();
    }

    let segments: Vec<&str> = path
        .trim_start_matches("/Platform/")
        .trim_end_matches('/')
        .split('/')
        .collect();

    match segments.as_slice() {
        ["Destiny2", "Manifest"] => {
            state.manifest_hits.fetch_add(1, Ordering::SeqCst);
            let version = state.version.lock().unwrap().clone();
            envelope(json!({
                "version": version,
                "mobileWorldContentPaths": {
                    "en": format!("{}{}", CONTENT_PREFIX, content_file_for(&version)),
                    "fr": format!("/common/destiny2_content/sqlite/fr/{}", content_file_for(&version))
                }
            }))
        }
        ["Destiny2", "Manifest", "DestinyInventoryItemDefinition", "666"] => error_envelope(
            StatusCode::SERVICE_UNAVAILABLE,
            5,
            "SystemDisabled",
            "This system is temporarily disabled for maintenance.",
        ),
        ["Destiny2", "Manifest", "DestinyInventoryItemDefinition", "502"] => {
            (StatusCode::BAD_GATEWAY, "<html>502 Bad Gateway</html>").into_response()
        }
        ["Destiny2", "Manifest", "DestinyInventoryItemDefinition", hash] => envelope(json!({
            "hash": hash.parse::<u64>().unwrap_or(0),
            "displayProperties": { "name": "Remote Item" }
        })),
        ["Destiny2", "SearchDestinyPlayer", _, name] => {
            if *name == "Nobody" {
                envelope(json!([]))
            } else {
                envelope(json!([{ "membershipId": "4611686018467284386", "displayName": name }]))
            }
        }
        ["Destiny2", _, "Profile", _, "Character", cid, "Vendors", vendor] => {
            state.vendor_hits.fetch_add(1, Ordering::SeqCst);
            match *vendor {
                v if v == vendors::GUNSMITH => envelope(vendor_bundle()),
                v if v == vendors::IRON_BANNER => error_envelope(
                    StatusCode::OK,
                    1627,
                    "DestinyVendorNotFound",
                    "The Vendor you requested was not found.",
                ),
                // Xur away: success with no payload at all.
                v if v == vendors::XUR => Json(json!({
                    "ErrorCode": 1,
                    "ErrorStatus": "Success",
                    "Message": "Ok"
                }))
                .into_response(),
                _ if *cid == "broken" => error_envelope(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    1618,
                    "DestinyUnexpectedError",
                    "Unexpected error",
                ),
                _ => envelope(json!({ "categories": [] })),
            }
        }
        ["Destiny2", _, "Profile", mid, "Character", cid] => envelope(json!({
            "character": { "data": { "membershipId": mid, "characterId": cid, "classHash": 2271682572u32 } }
        })),
        _ => error_envelope(StatusCode::NOT_FOUND, 2, "NotFound", "unknown route"),
    }
}

/// Start the mock API on an ephemeral port.
pub async fn start_mock_api(version: &str) -> MockApi {
    let state = Arc::new(MockState {
        requests: Mutex::new(Vec::new()),
        manifest_hits: AtomicUsize::new(0),
        vendor_hits: AtomicUsize::new(0),
        downloads: AtomicUsize::new(0),
        version: Mutex::new(version.to_string()),
        content_zip: Mutex::new(Vec::new()),
    });

    let app = Router::new().fallback(handle).with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockApi { addr, state }
}

/// Create a content database at `path` holding `rows`.
pub async fn write_content_db(path: &Path, rows: &[(ContentTable, u32, Value)]) {
    let mut conn = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Delete)
        .connect()
        .await
        .unwrap();
    for table in ContentTable::ALL {
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (id INTEGER PRIMARY KEY NOT NULL, json BLOB)",
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
}

/// Build a content database in `scratch` and return it zipped.
pub async fn zipped_content_db(scratch: &Path, rows: &[(ContentTable, u32, Value)]) -> Vec<u8> {
    let path: PathBuf = scratch.join("fixture.content");
    let _ = std::fs::remove_file(&path);
    write_content_db(&path, rows).await;
    let bytes = std::fs::read(&path).unwrap();

    let mut buf = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buf);
        zip.start_file("world_sql_content.content", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(&bytes).unwrap();
        zip.finish().unwrap();
    }
    buf.into_inner()
}

pub fn sample_rows() -> Vec<(ContentTable, u32, Value)> {
    vec![
        (
            ContentTable::InventoryItemDefinition,
            347366834,
            json!({ "hash": 347366834u32, "displayProperties": { "name": "Ace of Spades" } }),
        ),
        (
            ContentTable::ClassDefinition,
            2271682572,
            json!({ "hash": 2271682572u32, "displayProperties": { "name": "Warlock" } }),
        ),
        (
            ContentTable::ItemCategoryDefinition,
            1,
            json!({ "hash": 1, "displayProperties": { "name": "Weapon" } }),
        ),
        (
            ContentTable::VendorDefinition,
            2190858386,
            json!({ "hash": 2190858386u32, "displayProperties": { "name": "Xur", "icon": "/common/destiny2_content/icons/xur.png" } }),
        ),
    ]
}
