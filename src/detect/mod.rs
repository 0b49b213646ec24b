//! New-app detection run.
//!
//! Stages: Init -> ResolvingBaseline -> Diffing -> Persisting -> Done, or
//! Aborted when no comparison date exists.
//!
//! - Init loads the suppression ledger (non-forced runs only)
//! - ResolvingBaseline walks back from the target date to a date with data
//! - Diffing compares every configured category, then drops ledger ids
//! - Persisting writes the result for the target date, then the ledger
//!
//! A category that fails to load is logged and skipped. The result file and
//! the ledger are written independently: a ledger failure does not undo the
//! result.

pub mod resolver;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::config::Config;
use crate::store::diff::{diff_category, CategoryDiff, CategoryOutcome};
use crate::store::ledger::Ledger;
use crate::store::result::{DetectionResult, ResultStore};
use crate::store::snapshot::SnapshotStore;
use crate::store::{RankedApp, StoreError};

const GENERATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    ResolvingBaseline,
    Diffing,
    Persisting,
    Done,
    Aborted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "init",
            Stage::ResolvingBaseline => "resolving-baseline",
            Stage::Diffing => "diffing",
            Stage::Persisting => "persisting",
            Stage::Done => "done",
            Stage::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

fn enter(stage: Stage) {
    tracing::debug!(%stage, "detection stage");
}

#[derive(Debug, Error)]
pub enum DetectError {
    #[error(
        "no comparison data within {lookback_days} day(s) before {date}; ingest ranking snapshots for earlier dates first"
    )]
    NoComparisonDateFound { date: NaiveDate, lookback_days: i64 },
    #[error("failed to load suppression ledger: {0}")]
    LedgerLoad(#[source] StoreError),
    #[error("failed to write detection result: {0}")]
    ResultPersist(#[source] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectOptions {
    pub date: NaiveDate,
    /// Ignore the ledger entirely: no filtering, no update.
    pub force: bool,
}

/// Outcome of the in-memory part of a run.
#[derive(Debug, Clone)]
pub struct Detection {
    pub result: DetectionResult,
    pub categories: Vec<CategoryDiff>,
    /// Apps new versus the baseline but dropped because the ledger had them.
    pub suppressed: usize,
    /// Ledger after absorbing this run's ids. Unchanged for forced runs.
    pub ledger: Ledger,
    pub ledger_additions: usize,
}

#[derive(Debug)]
pub struct RunSummary {
    pub detection: Detection,
    pub result_path: PathBuf,
    /// Set when the ledger had new ids but could not be written.
    pub ledger_error: Option<StoreError>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn result(&self) -> &DetectionResult {
        &self.detection.result
    }

    pub fn ledger_saved(&self) -> bool {
        self.detection.ledger_additions > 0 && self.ledger_error.is_none()
    }
}

/// Compare every configured category for `date` against `compare_date`,
/// App Store categories first. Load failures are logged and skipped.
pub fn collect_new_apps(
    store: &SnapshotStore,
    config: &Config,
    date: NaiveDate,
    compare_date: NaiveDate,
) -> (Vec<RankedApp>, Vec<CategoryDiff>) {
    let mut new_apps = Vec::new();
    let mut categories = Vec::new();

    for (platform, category) in config.catalog() {
        let label = format!("{platform} / {}", category.display_name());

        let loaded = store
            .load(date, platform, &category.key)
            .and_then(|today| Ok((today, store.load(compare_date, platform, &category.key)?)));

        let outcome = match loaded {
            Err(e) => {
                tracing::warn!("{label}: skipped, snapshot could not be read: {e}");
                CategoryOutcome::LoadFailed(e.to_string())
            }
            Ok((today, _)) if today.is_missing() => {
                tracing::warn!("{label}: no data for {date}");
                CategoryOutcome::NoTodayData
            }
            Ok((today, _)) if today.is_empty() => {
                tracing::warn!("{label}: snapshot for {date} lists no apps");
                CategoryOutcome::EmptyToday
            }
            Ok((_, baseline)) if baseline.is_missing() => {
                tracing::warn!("{label}: no data for comparison date {compare_date}");
                CategoryOutcome::NoBaselineData
            }
            Ok((_, baseline)) if baseline.is_empty() => {
                tracing::warn!("{label}: snapshot for comparison date {compare_date} lists no apps");
                CategoryOutcome::EmptyBaseline
            }
            Ok((today, baseline)) => {
                let found = diff_category(today.apps(), baseline.apps());
                if found.is_empty() {
                    tracing::info!("{label}: no new apps");
                } else {
                    tracing::info!("{label}: {} new app(s)", found.len());
                }
                let count = found.len();
                new_apps.extend(found);
                CategoryOutcome::Compared { new_apps: count }
            }
        };

        categories.push(CategoryDiff {
            platform,
            category: category.key.clone(),
            outcome,
        });
    }

    (new_apps, categories)
}

/// Resolve the baseline, diff every category and apply the ledger.
///
/// Reads snapshots but writes nothing. The updated ledger is handed back for
/// the caller to persist.
pub fn detect(
    store: &SnapshotStore,
    config: &Config,
    options: &DetectOptions,
    mut ledger: Ledger,
    generated_at: NaiveDateTime,
) -> Result<Detection, DetectError> {
    enter(Stage::ResolvingBaseline);
    let Some(compare_date) =
        resolver::find_comparison_date(store, &config.probe, options.date, config.max_lookback_days)
    else {
        enter(Stage::Aborted);
        return Err(DetectError::NoComparisonDateFound {
            date: options.date,
            lookback_days: config.max_lookback_days,
        });
    };

    enter(Stage::Diffing);
    tracing::info!("detecting new apps for {} against {compare_date}", options.date);
    let (found, categories) = collect_new_apps(store, config, options.date, compare_date);

    let (new_apps, suppressed, ledger_additions) = if options.force {
        (found, 0, 0)
    } else {
        let before = found.len();
        let kept = ledger.filter(found);
        let suppressed = before - kept.len();
        if suppressed > 0 {
            tracing::info!("{suppressed} app(s) skipped, already analyzed");
        }
        let additions = ledger.absorb(&kept);
        (kept, suppressed, additions)
    };

    let result = DetectionResult {
        date: options.date,
        compare_date,
        total_count: new_apps.len(),
        new_apps,
        generated_at: generated_at.format(GENERATED_AT_FORMAT).to_string(),
    };

    Ok(Detection {
        result,
        categories,
        suppressed,
        ledger,
        ledger_additions,
    })
}

/// Full run against `config.data_dir`. `now` is the only wall-clock read and
/// stamps both the result and the ledger.
pub fn run(config: &Config, options: &DetectOptions, now: NaiveDateTime) -> Result<RunSummary, DetectError> {
    let start = Instant::now();
    let store = SnapshotStore::new(&config.data_dir);
    let ledger_path = Ledger::path(&config.data_dir);

    enter(Stage::Init);
    let ledger = if options.force {
        tracing::info!("forced run: suppression ledger ignored");
        Ledger::default()
    } else {
        let ledger = Ledger::load(&ledger_path).map_err(DetectError::LedgerLoad)?;
        tracing::debug!(ids = ledger.len(), "suppression ledger loaded");
        ledger
    };

    let mut detection = detect(&store, config, options, ledger, now)?;

    enter(Stage::Persisting);
    let results = ResultStore::new(&config.data_dir);
    let (result_path, ledger_error) = persist(&mut detection, &results, &ledger_path, options.force, now)?;

    enter(Stage::Done);
    let elapsed = start.elapsed();
    tracing::info!(
        "detection finished: {} new app(s) in {}",
        detection.result.total_count,
        humantime::format_duration(Duration::from_millis(elapsed.as_millis() as u64))
    );

    Ok(RunSummary {
        detection,
        result_path,
        ledger_error,
        elapsed,
    })
}

/// Write the result, then the ledger if it gained ids. A result failure stops
/// before the ledger is touched; a ledger failure is logged and handed back.
fn persist(
    detection: &mut Detection,
    results: &ResultStore,
    ledger_path: &Path,
    force: bool,
    now: NaiveDateTime,
) -> Result<(PathBuf, Option<StoreError>), DetectError> {
    let result_path = results.save(&detection.result).map_err(|e| {
        tracing::error!("failed to write detection result: {e}");
        DetectError::ResultPersist(e)
    })?;
    tracing::info!("result written to {}", result_path.display());

    if force || detection.ledger_additions == 0 {
        return Ok((result_path, None));
    }

    match detection.ledger.save(ledger_path, now) {
        Ok(()) => {
            tracing::info!("suppression ledger updated ({} apps)", detection.ledger.len());
            Ok((result_path, None))
        }
        Err(e) => {
            tracing::error!("failed to update suppression ledger, rerun to retry: {e}");
            Ok((result_path, Some(e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Categories, Category};
    use crate::platform::Platform;
    use crate::store::test_support::app;
    use std::fs;
    use tempfile::TempDir;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, day).unwrap()
    }

    fn now() -> NaiveDateTime {
        date(12).and_hms_opt(9, 0, 0).unwrap()
    }

    fn category(key: &str) -> Category {
        Category { key: key.to_string(), name: String::new() }
    }

    fn config(dir: &TempDir) -> Config {
        let mut config = Config::with_data_dir(dir.path());
        config.probe.category = "games".to_string();
        config.categories = Categories {
            app_store: vec![category("games"), category("social")],
            google_play: vec![category("games")],
        };
        config
    }

    fn seed(config: &Config, day: u32, platform: Platform, key: &str, ids: &[&str]) {
        let apps: Vec<RankedApp> = ids.iter().enumerate().map(|(i, id)| app(id, i as u32 + 1)).collect();
        SnapshotStore::new(&config.data_dir).save(date(day), platform, key, &apps).unwrap();
    }

    fn ids(apps: &[RankedApp]) -> Vec<&str> {
        apps.iter().map(|a| a.app_id.as_str()).collect()
    }

    fn options(force: bool) -> DetectOptions {
        DetectOptions { date: date(12), force }
    }

    #[test]
    fn aggregates_in_catalog_order() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        seed(&config, 12, Platform::GooglePlay, "games", &["g1", "g0"]);
        seed(&config, 11, Platform::GooglePlay, "games", &["g0"]);
        seed(&config, 12, Platform::AppStore, "social", &["s1"]);
        seed(&config, 11, Platform::AppStore, "social", &["s0"]);
        seed(&config, 12, Platform::AppStore, "games", &["a1", "a2"]);
        seed(&config, 11, Platform::AppStore, "games", &["a2"]);

        let detection = detect(
            &SnapshotStore::new(&config.data_dir),
            &config,
            &options(false),
            Ledger::default(),
            now(),
        )
        .unwrap();

        assert_eq!(ids(&detection.result.new_apps), vec!["a1", "s1", "g1"]);
        assert_eq!(detection.result.total_count, 3);
        assert_eq!(detection.result.compare_date, date(11));
        assert_eq!(detection.result.generated_at, "2026-02-12 09:00:00");
        assert_eq!(detection.ledger_additions, 3);
    }

    #[test]
    fn category_outcomes_distinguish_missing_from_empty() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        seed(&config, 12, Platform::AppStore, "games", &["a1"]);
        seed(&config, 11, Platform::AppStore, "games", &[]);
        seed(&config, 12, Platform::AppStore, "social", &["s1"]);
        seed(&config, 11, Platform::GooglePlay, "games", &["g1"]);

        let (found, categories) =
            collect_new_apps(&SnapshotStore::new(&config.data_dir), &config, date(12), date(11));

        assert!(found.is_empty());
        let outcomes: Vec<&CategoryOutcome> = categories.iter().map(|c| &c.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                &CategoryOutcome::EmptyBaseline,
                &CategoryOutcome::NoBaselineData,
                &CategoryOutcome::NoTodayData,
            ]
        );
    }

    #[test]
    fn unreadable_category_does_not_stop_the_run() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let store = SnapshotStore::new(&config.data_dir);
        seed(&config, 11, Platform::AppStore, "games", &["a0"]);
        let broken = store.path_for(date(12), Platform::AppStore, "games");
        fs::create_dir_all(broken.parent().unwrap()).unwrap();
        fs::write(&broken, "{\"apps\": [").unwrap();
        seed(&config, 12, Platform::AppStore, "social", &["s1"]);
        seed(&config, 11, Platform::AppStore, "social", &["s0"]);

        let detection = detect(&store, &config, &options(false), Ledger::default(), now()).unwrap();

        assert_eq!(ids(&detection.result.new_apps), vec!["s1"]);
        assert!(matches!(detection.categories[0].outcome, CategoryOutcome::LoadFailed(_)));
    }

    #[test]
    fn ledger_filters_after_diff_and_absorbs_the_rest() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        seed(&config, 12, Platform::AppStore, "games", &["a1", "a2", "a3"]);
        seed(&config, 11, Platform::AppStore, "games", &["a3"]);

        let mut ledger = Ledger::default();
        ledger.absorb(&[app("a2", 1), app("zz", 1)]);

        let detection =
            detect(&SnapshotStore::new(&config.data_dir), &config, &options(false), ledger, now()).unwrap();

        assert_eq!(ids(&detection.result.new_apps), vec!["a1"]);
        assert_eq!(detection.suppressed, 1);
        assert_eq!(detection.ledger_additions, 1);
        assert!(detection.ledger.contains("a1"));
        assert_eq!(detection.ledger.len(), 3);
    }

    #[test]
    fn forced_detection_ignores_ledger() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        seed(&config, 12, Platform::AppStore, "games", &["a1", "a2"]);
        seed(&config, 11, Platform::AppStore, "games", &["a0"]);

        let mut ledger = Ledger::default();
        ledger.absorb(&[app("a1", 1)]);
        let before = ledger.clone();

        let detection =
            detect(&SnapshotStore::new(&config.data_dir), &config, &options(true), ledger, now()).unwrap();

        assert_eq!(ids(&detection.result.new_apps), vec!["a1", "a2"]);
        assert_eq!(detection.ledger, before);
        assert_eq!(detection.ledger_additions, 0);
    }

    #[test]
    fn aborts_without_comparison_date_and_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        seed(&config, 12, Platform::AppStore, "games", &["a1"]);

        let err = run(&config, &options(false), now()).unwrap_err();
        assert!(matches!(err, DetectError::NoComparisonDateFound { lookback_days: 3, .. }));
        assert!(err.to_string().contains("ingest"));
        assert!(!dir.path().join("new_apps").exists());
        assert!(!Ledger::path(dir.path()).exists());
    }

    #[test]
    fn run_persists_result_and_ledger() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        seed(&config, 12, Platform::AppStore, "games", &["a1", "a2"]);
        seed(&config, 11, Platform::AppStore, "games", &["a2"]);

        let summary = run(&config, &options(false), now()).unwrap();
        assert_eq!(summary.result().total_count, 1);
        assert!(summary.ledger_saved());
        assert!(summary.result_path.ends_with("new_apps/2026-02-12.json"));

        let ledger = Ledger::load(&Ledger::path(dir.path())).unwrap();
        assert!(ledger.contains("a1"));
        assert_eq!(ledger.last_updated(), Some("2026-02-12 09:00:00"));
    }

    #[test]
    fn empty_run_leaves_ledger_untouched() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        seed(&config, 12, Platform::AppStore, "games", &["a1"]);
        seed(&config, 11, Platform::AppStore, "games", &["a1"]);

        let summary = run(&config, &options(false), now()).unwrap();
        assert_eq!(summary.result().total_count, 0);
        assert!(!summary.ledger_saved());
        assert!(summary.result_path.exists());
        assert!(!Ledger::path(dir.path()).exists());
    }

    #[test]
    fn corrupt_ledger_aborts_non_forced_run_only() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        seed(&config, 12, Platform::AppStore, "games", &["a1"]);
        seed(&config, 11, Platform::AppStore, "games", &["a0"]);
        fs::write(Ledger::path(dir.path()), "garbage").unwrap();

        let err = run(&config, &options(false), now()).unwrap_err();
        assert!(matches!(err, DetectError::LedgerLoad(_)));

        let summary = run(&config, &options(true), now()).unwrap();
        assert_eq!(summary.result().total_count, 1);
        assert_eq!(fs::read_to_string(Ledger::path(dir.path())).unwrap(), "garbage");
    }

    #[test]
    fn result_write_failure_leaves_ledger_alone() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        seed(&config, 12, Platform::AppStore, "games", &["a1", "a2"]);
        seed(&config, 11, Platform::AppStore, "games", &["a2"]);
        fs::write(dir.path().join("new_apps"), "not a directory").unwrap();

        let err = run(&config, &options(false), now()).unwrap_err();
        assert!(matches!(err, DetectError::ResultPersist(_)));
        assert!(!Ledger::path(dir.path()).exists());
    }

    #[test]
    fn ledger_write_failure_keeps_result() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        seed(&config, 12, Platform::AppStore, "games", &["a1", "a2"]);
        seed(&config, 11, Platform::AppStore, "games", &["a2"]);

        let store = SnapshotStore::new(&config.data_dir);
        let mut detection = detect(&store, &config, &options(false), Ledger::default(), now()).unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();

        let results = ResultStore::new(&config.data_dir);
        let (result_path, ledger_error) =
            persist(&mut detection, &results, &Ledger::path(&blocker), false, now()).unwrap();

        assert!(result_path.exists());
        assert!(matches!(ledger_error, Some(StoreError::Io { .. })));
        let saved = results.load(date(12)).unwrap().unwrap();
        assert_eq!(ids(&saved.new_apps), vec!["a1"]);
        assert_eq!(detection.ledger.last_updated(), None);
    }

    #[test]
    fn forced_persist_skips_ledger() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        seed(&config, 12, Platform::AppStore, "games", &["a1"]);
        seed(&config, 11, Platform::AppStore, "games", &["a0"]);

        let store = SnapshotStore::new(&config.data_dir);
        let mut detection = detect(&store, &config, &options(true), Ledger::default(), now()).unwrap();
        let ledger_path = Ledger::path(dir.path());

        let (_, ledger_error) =
            persist(&mut detection, &ResultStore::new(&config.data_dir), &ledger_path, true, now()).unwrap();
        assert!(ledger_error.is_none());
        assert!(!ledger_path.exists());
    }

    #[test]
    fn stage_names() {
        assert_eq!(Stage::ResolvingBaseline.to_string(), "resolving-baseline");
        assert_eq!(Stage::Aborted.to_string(), "aborted");
    }
}
