//! Snapshot comparison engine.
//!
//! Finds apps that entered a category ranking between a baseline snapshot and
//! today's snapshot:
//! - Matches apps by app_id only (rank and name are never compared)
//! - Keeps today's ordering for the apps it reports
//! - Skips a category when either side has nothing to compare
//!
//! Pure functions, no I/O.

use std::collections::HashSet;

use super::RankedApp;
use crate::platform::Platform;

/// Why a category produced no comparison, or how many apps it contributed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryOutcome {
    /// No snapshot file for the target date.
    NoTodayData,
    /// Snapshot for the target date exists but lists no apps.
    EmptyToday,
    /// No snapshot file for the comparison date.
    NoBaselineData,
    /// Snapshot for the comparison date exists but lists no apps.
    EmptyBaseline,
    /// One of the two snapshots could not be read.
    LoadFailed(String),
    /// Both sides compared; count of apps absent from the baseline.
    Compared { new_apps: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryDiff {
    pub platform: Platform,
    pub category: String,
    pub outcome: CategoryOutcome,
}

fn id_set(apps: &[RankedApp]) -> HashSet<&str> {
    apps.iter()
        .filter(|app| app.has_id())
        .map(|app| app.app_id.as_str())
        .collect()
}

/// Apps in `today` whose id does not appear in `baseline`, in today's order.
///
/// An empty side means there is no comparison to make, so the result is
/// empty rather than "everything is new".
pub fn diff_category(today: &[RankedApp], baseline: &[RankedApp]) -> Vec<RankedApp> {
    if today.is_empty() || baseline.is_empty() {
        return Vec::new();
    }

    let baseline_ids = id_set(baseline);

    today
        .iter()
        .filter(|app| app.has_id() && !baseline_ids.contains(app.app_id.as_str()))
        .cloned()
        .collect()
}
