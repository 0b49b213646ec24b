use chrono::{Days, NaiveDate};

use crate::config::Probe;
use crate::store::snapshot::SnapshotStore;

/// Most recent date before `target` whose probe snapshot exists, looking back
/// at most `max_lookback_days` days. Only the probe file is checked, not
/// every category.
pub fn find_comparison_date(
    store: &SnapshotStore,
    probe: &Probe,
    target: NaiveDate,
    max_lookback_days: i64,
) -> Option<NaiveDate> {
    let lookback = u64::try_from(max_lookback_days).unwrap_or(0);

    for days in 1..=lookback {
        let candidate = target.checked_sub_days(Days::new(days))?;
        let found = store.exists(candidate, probe.platform, &probe.category);

        tracing::debug!(date = %candidate, found, "probe snapshot");

        if found {
            tracing::info!("comparison date: {candidate} ({days} day(s) back)");
            return Some(candidate);
        }
    }

    tracing::warn!("no comparison date found within {max_lookback_days} day(s) before {target}");
    None
}
