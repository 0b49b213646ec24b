//! File-backed storage for the ranking archive.
//!
//! Everything lives under one data directory:
//! - raw/<date>/<platform>/<category>.json: one ranking snapshot, write-once
//! - new_apps/<date>.json: detection result for a target date, overwritten on re-run
//! - analyzed_apps.json: suppression ledger of ids already surfaced
//!
//! Supports:
//! - Loading snapshots with "missing" kept distinct from "empty"
//! - Atomic writes (temp file in the same directory, then rename)
//! - Listing the dates that have snapshots or results

pub mod diff;
pub mod ledger;
pub mod result;
pub mod snapshot;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::platform::Platform;

/// One entry of a ranking snapshot.
///
/// `app_id` is the only field that carries identity. `rank` is display-only:
/// search-derived rankings renumber it, so nothing orders or matches on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedApp {
    /// Overwritten from the snapshot address on load.
    #[serde(default, deserialize_with = "null_as_default")]
    pub platform: Platform,
    #[serde(default, deserialize_with = "null_as_default")]
    pub category: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub app_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rank: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub developer: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub store_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub icon_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: String,
}

/// Scrapers write `null` for fields they could not fill; read it like a
/// missing key.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl RankedApp {
    /// Apps without an id never take part in a comparison.
    pub fn has_id(&self) -> bool {
        !self.app_id.trim().is_empty()
    }
}

/// Result of reading one (date, platform, category) snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snapshot {
    /// No file for this address.
    Missing,
    /// File exists; the list may still be empty.
    Loaded(Vec<RankedApp>),
}

impl Snapshot {
    pub fn apps(&self) -> &[RankedApp] {
        match self {
            Snapshot::Missing => &[],
            Snapshot::Loaded(apps) => apps,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Snapshot::Missing)
    }

    pub fn is_empty(&self) -> bool {
        self.apps().is_empty()
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid json in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("snapshot already exists: {}", .0.display())]
    AlreadyExists(PathBuf),
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io { path: path.to_path_buf(), source }
    }
}

/// Read and parse a json file. A missing file is `Ok(None)`.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e)),
    };

    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| StoreError::Parse { path: path.to_path_buf(), source })
}

/// Write pretty json through a temp file in the destination directory, then
/// rename it over `path`. A crash mid-write leaves the old file intact.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let tmp = stage_json(path, value)?;
    tmp.persist(path).map_err(|e| StoreError::io(path, e.error))?;
    Ok(())
}

/// Like `write_json_atomic` but never replaces an existing file.
pub(crate) fn write_json_new<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if path.exists() {
        return Err(StoreError::AlreadyExists(path.to_path_buf()));
    }

    let tmp = stage_json(path, value)?;
    tmp.persist_noclobber(path).map_err(|e| {
        if e.error.kind() == io::ErrorKind::AlreadyExists {
            StoreError::AlreadyExists(path.to_path_buf())
        } else {
            StoreError::io(path, e.error)
        }
    })?;
    Ok(())
}

fn stage_json<T: Serialize>(path: &Path, value: &T) -> Result<NamedTempFile, StoreError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| StoreError::io(parent, e))?;
    serde_json::to_writer_pretty(tmp.as_file_mut(), value).map_err(|e| write_error(path, e))?;
    tmp.write_all(b"\n").map_err(|e| StoreError::io(path, e))?;
    tmp.as_file().sync_all().map_err(|e| StoreError::io(path, e))?;

    Ok(tmp)
}

/// serde_json reports failed writes as its own error type; keep those as io.
fn write_error(path: &Path, source: serde_json::Error) -> StoreError {
    if source.is_io() {
        StoreError::io(path, source.into())
    } else {
        StoreError::Parse { path: path.to_path_buf(), source }
    }
}
