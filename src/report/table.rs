//! Terminal table for detection results.
//!
//! Groups new apps by platform and category in the order they were found,
//! which is the configured category order.

use crate::platform::Platform;
use crate::store::result::DetectionResult;
use crate::store::RankedApp;

pub fn render(result: &DetectionResult) -> String {
    let mut output = format!("\nNew apps on {} (compared with {})\n", result.date, result.compare_date);

    if result.new_apps.is_empty() {
        output.push_str("No new apps detected.\n");
        return output;
    }

    let mut current: Option<(Platform, &str)> = None;

    for app in &result.new_apps {
        let group = (app.platform, app.category.as_str());
        if current != Some(group) {
            output.push_str(&format!("\n{} / {}\n", app.platform, app.category));
            output.push_str(&"-".repeat(60));
            output.push('\n');
            current = Some(group);
        }
        output.push_str(&row(app));
    }

    output.push_str(&format!("\n{:>60}\n", format!("TOTAL: {}", result.total_count)));
    output
}

fn row(app: &RankedApp) -> String {
    format!(
        "  {:>4}  {:32} {}\n",
        format!("#{}", app.rank),
        truncate(&app.name, 32),
        truncate(&app.developer, 20)
    )
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{truncated}...")
    }
}
