pub mod json;
pub mod table;

use crate::detect::RunSummary;
use crate::store::diff::CategoryOutcome;
use crate::store::result::DetectionResult;

pub fn print(result: &DetectionResult, json_output: bool) {
    if json_output {
        println!("{}", json::render(result));
    } else {
        print!("{}", table::render(result));
    }
}

/// Result plus the run details that are not part of the stored artifact.
pub fn print_run(summary: &RunSummary, json_output: bool, verbose: bool) {
    print(summary.result(), json_output);
    if json_output {
        return;
    }

    let detection = &summary.detection;
    let compared = detection
        .categories
        .iter()
        .filter(|c| matches!(c.outcome, CategoryOutcome::Compared { .. }))
        .count();

    println!();
    println!("compared {compared} of {} categories", detection.categories.len());

    if verbose {
        for category in &detection.categories {
            println!(
                "  {:<12} {:<16} {}",
                category.platform.dir_name(),
                category.category,
                outcome_label(&category.outcome)
            );
        }
    }

    if detection.suppressed > 0 {
        println!("already analyzed: {} app(s) skipped", detection.suppressed);
    }
    if summary.ledger_saved() {
        println!("ledger: {} app(s) recorded", detection.ledger.len());
    }
    println!("result: {}", summary.result_path.display());
    println!("finished in {:.2}s", summary.elapsed.as_secs_f64());
}

fn outcome_label(outcome: &CategoryOutcome) -> String {
    match outcome {
        CategoryOutcome::NoTodayData => "no data for target date".to_string(),
        CategoryOutcome::EmptyToday => "target snapshot empty".to_string(),
        CategoryOutcome::NoBaselineData => "no data for comparison date".to_string(),
        CategoryOutcome::EmptyBaseline => "comparison snapshot empty".to_string(),
        CategoryOutcome::LoadFailed(e) => format!("load failed: {e}"),
        CategoryOutcome::Compared { new_apps } => format!("{new_apps} new"),
    }
}
