//! Suppression ledger: app ids that have already been surfaced for analysis.
//!
//! Loaded once per run, threaded through the run as a value, and written back
//! by the caller. One global file, not per date.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{read_json, write_json_atomic, RankedApp, StoreError};

pub const LEDGER_FILE: &str = "analyzed_apps.json";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Serialize, Deserialize)]
struct LedgerFile {
    #[serde(default)]
    analyzed_apps: BTreeSet<String>,
    #[serde(default)]
    last_updated: Option<String>,
    #[serde(default)]
    total_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    ids: BTreeSet<String>,
    last_updated: Option<String>,
}

impl Ledger {
    pub fn path(data_dir: &Path) -> PathBuf {
        data_dir.join(LEDGER_FILE)
    }

    /// Empty ledger when nothing has been persisted yet.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let Some(file) = read_json::<LedgerFile>(path)? else {
            return Ok(Ledger::default());
        };

        let ids: BTreeSet<String> = file.analyzed_apps.into_iter().filter(|id| !id.is_empty()).collect();
        if ids.len() != file.total_count {
            tracing::debug!(declared = file.total_count, actual = ids.len(), "ledger count mismatch");
        }

        Ok(Ledger {
            ids,
            last_updated: file.last_updated,
        })
    }

    /// Persist with `last_updated` set to `now`. Ids are stored sorted.
    pub fn save(&mut self, path: &Path, now: NaiveDateTime) -> Result<(), StoreError> {
        let stamp = now.format(TIMESTAMP_FORMAT).to_string();

        let file = LedgerFile {
            analyzed_apps: self.ids.clone(),
            last_updated: Some(stamp.clone()),
            total_count: self.ids.len(),
        };

        write_json_atomic(path, &file)?;
        self.last_updated = Some(stamp);
        Ok(())
    }

    pub fn contains(&self, app_id: &str) -> bool {
        self.ids.contains(app_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn last_updated(&self) -> Option<&str> {
        self.last_updated.as_deref()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Drop apps already in the ledger, keeping order.
    pub fn filter(&self, apps: Vec<RankedApp>) -> Vec<RankedApp> {
        apps.into_iter().filter(|app| !self.contains(&app.app_id)).collect()
    }

    /// Record every app id in `apps`. Returns how many ids were new to the ledger.
    pub fn absorb(&mut self, apps: &[RankedApp]) -> usize {
        apps.iter()
            .filter(|app| app.has_id())
            .filter(|app| self.ids.insert(app.app_id.clone()))
            .count()
    }
}
