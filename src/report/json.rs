//! JSON output for detection results.
//!
//! Same shape as the stored artifact, for scripting and piping.

use crate::store::result::DetectionResult;

pub fn render(result: &DetectionResult) -> String {
    serde_json::to_string_pretty(result).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
}
