use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use super::{null_as_default, read_json, write_json_new, RankedApp, Snapshot, StoreError};
use crate::platform::Platform;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// On-disk shape of one snapshot file
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    #[serde(default, deserialize_with = "null_as_default")]
    date: String,
    #[serde(default)]
    platform: Option<Platform>,
    #[serde(default, deserialize_with = "null_as_default")]
    category: String,
    #[serde(default, deserialize_with = "null_as_default")]
    category_key: String,
    #[serde(default, deserialize_with = "null_as_default")]
    total_apps: usize,
    #[serde(default, deserialize_with = "null_as_default")]
    apps: Vec<RankedApp>,
}

/// Dated ranking archive under `<data_dir>/raw`.
///
/// Read-only from the detection side. Nothing is cached: every `load` goes
/// back to disk.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(data_dir: &Path) -> Self {
        SnapshotStore { root: data_dir.join("raw") }
    }

    pub fn path_for(&self, date: NaiveDate, platform: Platform, category: &str) -> PathBuf {
        self.root
            .join(date.format(DATE_FORMAT).to_string())
            .join(platform.dir_name())
            .join(format!("{category}.json"))
    }

    pub fn exists(&self, date: NaiveDate, platform: Platform, category: &str) -> bool {
        self.path_for(date, platform, category).is_file()
    }

    /// Load one snapshot. A missing file is `Snapshot::Missing`, never an error.
    ///
    /// Each app's platform and category are taken from the address, since
    /// scrapers write display names into those fields.
    pub fn load(&self, date: NaiveDate, platform: Platform, category: &str) -> Result<Snapshot, StoreError> {
        let path = self.path_for(date, platform, category);

        let Some(file) = read_json::<SnapshotFile>(&path)? else {
            return Ok(Snapshot::Missing);
        };

        let foreign_key = !file.category_key.is_empty() && file.category_key != category;
        if foreign_key || file.platform.is_some_and(|p| p != platform) {
            tracing::warn!(
                "{} declares {:?} / {} ({}), using its location instead",
                path.display(),
                file.platform,
                file.category_key,
                file.category
            );
        }
        if file.total_apps != file.apps.len() {
            tracing::debug!(
                declared = file.total_apps,
                actual = file.apps.len(),
                date = %file.date,
                "snapshot app count mismatch"
            );
        }

        let apps = file
            .apps
            .into_iter()
            .map(|mut app| {
                app.platform = platform;
                app.category = category.to_string();
                app
            })
            .collect();

        Ok(Snapshot::Loaded(apps))
    }

    /// Write a new snapshot. Snapshots are immutable once written, so an
    /// existing file is an error.
    pub fn save(
        &self,
        date: NaiveDate,
        platform: Platform,
        category: &str,
        apps: &[RankedApp],
    ) -> Result<PathBuf, StoreError> {
        let path = self.path_for(date, platform, category);

        let apps: Vec<RankedApp> = apps
            .iter()
            .cloned()
            .map(|mut app| {
                app.platform = platform;
                app.category = category.to_string();
                app
            })
            .collect();

        let file = SnapshotFile {
            date: date.format(DATE_FORMAT).to_string(),
            platform: Some(platform),
            category: category.to_string(),
            category_key: category.to_string(),
            total_apps: apps.len(),
            apps,
        };

        write_json_new(&path, &file)?;
        Ok(path)
    }

    /// Dates that have a snapshot directory, newest first.
    pub fn list_dates(&self) -> Result<Vec<NaiveDate>, StoreError> {
        list_dated_entries(&self.root, |entry| {
            entry.file_type().is_dir().then(|| entry.file_name().to_str()).flatten()
        })
    }
}

/// Scan one directory level and keep entries whose name parses as a date.
pub(crate) fn list_dated_entries<F>(dir: &Path, name_of: F) -> Result<Vec<NaiveDate>, StoreError>
where
    F: Fn(&walkdir::DirEntry) -> Option<&str>,
{
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut dates = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            StoreError::Io { path, source: e.into() }
        })?;

        if let Some(date) = name_of(&entry).and_then(|name| NaiveDate::parse_from_str(name, DATE_FORMAT).ok()) {
            dates.push(date);
        }
    }

    dates.sort_unstable_by(|a, b| b.cmp(a));
    dates.dedup();
    Ok(dates)
}
