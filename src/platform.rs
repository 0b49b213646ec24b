use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Ranking source a snapshot was captured from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Platform {
    #[default]
    #[serde(rename = "App Store", alias = "app_store")]
    AppStore,
    #[serde(rename = "Google Play", alias = "google_play")]
    GooglePlay,
}

impl Platform {
    /// Directory name used in the snapshot archive.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Platform::AppStore => "app_store",
            Platform::GooglePlay => "google_play",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Platform::AppStore => "App Store",
            Platform::GooglePlay => "Google Play",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "app_store" | "appstore" | "ios" => Ok(Platform::AppStore),
            "google_play" | "googleplay" | "android" => Ok(Platform::GooglePlay),
            other => Err(format!("unknown platform '{other}', expected app_store or google_play")),
        }
    }
}
