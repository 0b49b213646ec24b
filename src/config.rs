use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cli::GlobalArgs;
use crate::platform::Platform;

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_MAX_LOOKBACK_DAYS: i64 = 3;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config TOML {}: {source}", path.display())]
    TomlParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("could not determine a data directory, pass --data-dir")]
    NoDataDir,
}

/// One ranking category. `key` names the snapshot file, `name` is for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub key: String,
    #[serde(default)]
    pub name: String,
}

impl Category {
    fn new(key: &str, name: &str) -> Self {
        Category { key: key.to_string(), name: name.to_string() }
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.key
        } else {
            &self.name
        }
    }
}

/// Snapshot checked to decide whether a date has any data at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Probe {
    pub platform: Platform,
    pub category: String,
}

impl Default for Probe {
    fn default() -> Self {
        Probe { platform: Platform::AppStore, category: "health_fitness".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Categories {
    #[serde(default)]
    pub app_store: Vec<Category>,
    #[serde(default)]
    pub google_play: Vec<Category>,
}

impl Default for Categories {
    fn default() -> Self {
        Categories {
            app_store: vec![
                Category::new("health_fitness", "Health & Fitness"),
                Category::new("social", "Social Networking"),
                Category::new("lifestyle", "Lifestyle"),
                Category::new("games", "Games"),
            ],
            google_play: vec![
                Category::new("health_fitness", "Health & Fitness"),
                Category::new("social", "Social"),
                Category::new("lifestyle", "Lifestyle"),
                Category::new("games", "Games"),
                Category::new("dating", "Dating"),
                Category::new("tools", "Tools"),
            ],
        }
    }
}

/// Contents of config.toml. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    data_dir: Option<PathBuf>,
    max_lookback_days: Option<i64>,
    probe: Option<Probe>,
    categories: Option<Categories>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub max_lookback_days: i64,
    pub probe: Probe,
    pub categories: Categories,
    pub verbose: bool,
}

impl Config {
    /// Resolve config from the file named by `--config` (or the platform
    /// config dir) and apply command line overrides on top.
    pub fn from_global_args(args: &GlobalArgs) -> Result<Self, ConfigError> {
        let path = args.config.clone().or_else(default_config_path);

        let file = match path {
            Some(path) => read_file_config(&path, args.config.is_some())?,
            None => FileConfig::default(),
        };

        let data_dir = args
            .data_dir
            .clone()
            .or(file.data_dir)
            .or_else(default_data_dir)
            .ok_or(ConfigError::NoDataDir)?;

        let mut config = Config {
            data_dir,
            max_lookback_days: file.max_lookback_days.unwrap_or(DEFAULT_MAX_LOOKBACK_DAYS),
            probe: file.probe.unwrap_or_default(),
            categories: file.categories.unwrap_or_default(),
            verbose: args.verbose,
        };
        config.normalize();
        Ok(config)
    }

    /// Defaults rooted at an explicit data directory.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Config {
            data_dir: data_dir.into(),
            max_lookback_days: DEFAULT_MAX_LOOKBACK_DAYS,
            probe: Probe::default(),
            categories: Categories::default(),
            verbose: false,
        }
    }

    /// Every configured (platform, category) pair, App Store first, each
    /// platform in configured order.
    pub fn catalog(&self) -> impl Iterator<Item = (Platform, &Category)> {
        [Platform::AppStore, Platform::GooglePlay]
            .into_iter()
            .flat_map(move |platform| self.categories_for(platform).iter().map(move |c| (platform, c)))
    }

    pub fn categories_for(&self, platform: Platform) -> &[Category] {
        match platform {
            Platform::AppStore => &self.categories.app_store,
            Platform::GooglePlay => &self.categories.google_play,
        }
    }

    fn normalize(&mut self) {
        normalize_categories(&mut self.categories.app_store);
        normalize_categories(&mut self.categories.google_play);
        self.probe.category = normalize_key(&self.probe.category);
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

fn normalize_categories(categories: &mut Vec<Category>) {
    let mut seen = HashSet::new();
    categories.retain_mut(|category| {
        category.key = normalize_key(&category.key);
        category.name = category.name.trim().to_string();
        !category.key.is_empty() && seen.insert(category.key.clone())
    });
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "rankwatch")
}

/// ~/.config/rankwatch/config.toml or platform equivalent
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

/// ~/.local/share/rankwatch or platform equivalent
pub fn default_data_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
}

/// An explicitly requested file must exist; the default location may not.
fn read_file_config(path: &Path, required: bool) -> Result<FileConfig, ConfigError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound && !required => return Ok(FileConfig::default()),
        Err(source) => return Err(ConfigError::Io { path: path.to_path_buf(), source }),
    };

    toml::from_str(&raw).map_err(|source| ConfigError::TomlParse { path: path.to_path_buf(), source })
}
