use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::snapshot::{list_dated_entries, DATE_FORMAT};
use super::{read_json, write_json_atomic, RankedApp, StoreError};

/// New apps found for one target date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub date: NaiveDate,
    pub compare_date: NaiveDate,
    pub total_count: usize,
    pub new_apps: Vec<RankedApp>,
    pub generated_at: String,
}

/// Detection results under `<data_dir>/new_apps`, one file per target date.
#[derive(Debug, Clone)]
pub struct ResultStore {
    root: PathBuf,
}

impl ResultStore {
    pub fn new(data_dir: &Path) -> Self {
        ResultStore { root: data_dir.join("new_apps") }
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.root.join(format!("{}.json", date.format(DATE_FORMAT)))
    }

    /// Replace whatever result was stored for this date.
    pub fn save(&self, result: &DetectionResult) -> Result<PathBuf, StoreError> {
        let path = self.path_for(result.date);
        write_json_atomic(&path, result)?;
        Ok(path)
    }

    pub fn load(&self, date: NaiveDate) -> Result<Option<DetectionResult>, StoreError> {
        read_json(&self.path_for(date))
    }

    /// Dates with a stored result, newest first.
    pub fn list_dates(&self) -> Result<Vec<NaiveDate>, StoreError> {
        list_dated_entries(&self.root, |entry| {
            if !entry.file_type().is_file() {
                return None;
            }
            entry.file_name().to_str()?.strip_suffix(".json")
        })
    }
}
