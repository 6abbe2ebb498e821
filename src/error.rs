//! Error taxonomy for the content access layer.
//!
//! Callers need to tell "not warmed up yet" ([`Error::ContentNotSynchronized`],
//! [`Error::FileNotFound`]) apart from "the remote service is broken"
//! ([`Error::Remote`], [`Error::UnexpectedResponse`]) and from "try again"
//! ([`Error::Network`]). A vendor that is not currently selling anything is
//! not an error at all; those calls resolve to an empty result.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// The request never produced a response (DNS, connect, reset, timeout).
    #[error("network failure: {0}")]
    Network(#[source] reqwest::Error),

    /// The remote envelope carried a non-success error code.
    #[error("remote error {code} ({status}): {message}")]
    Remote {
        code: i64,
        message: String,
        status: String,
    },

    /// The remote answered with something that is not an envelope.
    #[error("unexpected response (HTTP {status}): {detail}")]
    UnexpectedResponse { status: u16, detail: String },

    #[error("content database not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// No manifest has ever been recorded locally.
    #[error("content not synchronized: no manifest has been fetched yet")]
    ContentNotSynchronized,

    #[error("manifest has no content database for locale '{locale}'")]
    MissingContentPath { locale: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A programming error, e.g. querying a handle that is not open.
    #[error("fault: {0}")]
    Fault(&'static str),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}

impl Error {
    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Network(_))
    }

    /// Whether the failure means local content has not been set up yet,
    /// as opposed to a broken remote.
    pub fn is_not_synchronized(&self) -> bool {
        matches!(
            self,
            Error::ContentNotSynchronized | Error::FileNotFound(_) | Error::MissingContentPath { .. }
        )
    }
}
