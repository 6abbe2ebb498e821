//! # Gunsmith
//!
//! **Manifest-versioned game content access with a cache-aside remote client.**
//!
//! Gunsmith tracks which Destiny 2 manifest version is current, mirrors the
//! locale content database that version advertises, answers hash-keyed
//! content lookups against it, and caches slow-changing remote reads such
//! as daily vendor rotations.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────────────────────┐
//!                 │          Gunsmith            │
//!                 └──┬──────────┬─────────────┬──┘
//!                    ▼          ▼             ▼
//!            ┌────────────┐ ┌─────────┐ ┌─────────────┐
//!            │ Response   │ │  API    │ │  Content    │
//!            │ Cache      │◀│ Client  │ │  Library    │
//!            └────────────┘ └─────────┘ └──┬───────┬──┘
//!                                           ▼       ▼
//!                                  ┌──────────┐ ┌──────────┐
//!                                  │ Manifest │ │ Content  │
//!                                  │ Store    │ │ Database │
//!                                  └──────────┘ └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! gunsmith init                                   # create the manifest database
//! gunsmith sync                                   # fetch manifest + content database
//! gunsmith lookup ItemDefinition 347366834        # hash lookup
//! gunsmith vendor xur --membership-type psn \
//!     --membership-id 4611686018 --character-id 2305843009
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`api`] | Remote API client, envelope mapping, sale category selection |
//! | [`cache`] | Cache-aside response cache with pluggable expiry |
//! | [`store`] | Append-only manifest log (SQLite and in-memory) |
//! | [`content_db`] | Open/query/close lifecycle of one content database |
//! | [`content`] | Hash lookups against the current manifest |
//! | [`sync`] | Manifest synchronization and content materialization |
//! | [`app`] | Composition root wiring everything together |
//! | [`config`] | TOML configuration parsing and validation |
//! | [`error`] | Error taxonomy |
//! | [`models`] | Shared data types |
//! | [`db`] | SQLite connection pool |
//! | [`migrate`] | Schema migrations (idempotent) |
//! | [`commands`] | CLI command implementations |

pub mod api;
pub mod app;
pub mod cache;
pub mod commands;
pub mod config;
pub mod content;
pub mod content_db;
pub mod db;
pub mod error;
pub mod migrate;
pub mod models;
pub mod store;
pub mod sync;

pub use app::Gunsmith;
pub use error::{Error, Result};
