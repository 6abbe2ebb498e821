//! Manifest synchronization: fetch the remote manifest, materialize the
//! locale content database it advertises, and record it as current.
//!
//! The content file is written before the manifest is appended, so the
//! current manifest never points at a database that is not on disk.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::info;

use crate::app::Gunsmith;
use crate::config::Config;
use crate::content_db::resolve_content_path;
use crate::error::{Error, Result};
use crate::models::{manifest_content_path, manifest_version};

const SQLITE_MAGIC: &[u8] = b"SQLite format 3\0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The current manifest already matches the remote one and its
    /// content database is present.
    UpToDate { version: Option<String> },
    /// A new manifest was recorded and its content database written.
    Updated {
        version: Option<String>,
        path: PathBuf,
    },
}

pub async fn sync_manifest(app: &Gunsmith) -> Result<SyncOutcome> {
    let locale = app.content().locale().to_string();
    let manifest = app.client().get_manifest().await?;
    let version = manifest_version(&manifest).map(str::to_string);

    let advertised = manifest_content_path(&manifest, &locale)
        .ok_or_else(|| Error::MissingContentPath {
            locale: locale.clone(),
        })?
        .to_string();
    let path = resolve_content_path(app.content_dir(), &advertised)?;

    if let Some(current) = app.store().current().await? {
        let same_version = current.version().map(str::to_string) == version;
        if same_version && tokio::fs::try_exists(&path).await? {
            info!(version = ?version, "manifest up to date");
            return Ok(SyncOutcome::UpToDate { version });
        }
    }

    info!(version = ?version, path = %advertised, "downloading content database");
    let bytes = app.client().download_content(&advertised).await?;

    let dest = path.clone();
    tokio::task::spawn_blocking(move || write_content(&bytes, &dest))
        .await
        .map_err(|_| Error::Fault("content extraction task panicked"))??;

    app.store().append(&manifest).await?;
    app.manifest_changed(&manifest);

    info!(version = ?version, path = %path.display(), "manifest synchronized");
    Ok(SyncOutcome::Updated { version, path })
}

/// Write a downloaded content database to `dest`.
///
/// The download is normally a zip holding one SQLite file; a bare SQLite
/// file is accepted as-is. Data lands in a sibling temp file first and is
/// renamed into place; the temp file is removed if anything fails.
pub fn write_content(bytes: &[u8], dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = dest.with_extension("partial");

    let written = stage_content(bytes, &tmp)
        .and_then(|()| std::fs::rename(&tmp, dest).map_err(Error::from));
    if written.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    written
}

fn stage_content(bytes: &[u8], tmp: &Path) -> Result<()> {
    if bytes.starts_with(SQLITE_MAGIC) {
        std::fs::write(tmp, bytes)?;
        return Ok(());
    }

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    if archive.len() == 0 {
        return Err(Error::Archive(zip::result::ZipError::FileNotFound));
    }
    let mut entry = archive.by_index(0)?;
    // Streamed to disk; the header's uncompressed size is not trusted.
    let mut out = std::fs::File::create(tmp)?;
    std::io::copy(&mut entry, &mut out)?;
    out.sync_all()?;
    Ok(())
}

/// CLI entry point for `gunsmith sync`.
pub async fn run_sync(config: &Config) -> anyhow::Result<()> {
    let app = Gunsmith::init(config.clone()).await?;
    let outcome = sync_manifest(&app)
        .await
        .context("manifest sync failed");
    app.shutdown().await;

    match outcome? {
        SyncOutcome::UpToDate { version } => {
            println!(
                "manifest up to date: {}",
                version.as_deref().unwrap_or("(unversioned)")
            );
        }
        SyncOutcome::Updated { version, path } => {
            println!(
                "manifest updated: {}",
                version.as_deref().unwrap_or("(unversioned)")
            );
            println!("content database: {}", path.display());
        }
    }
    Ok(())
}
