use crate::error::ConfigError;
use log::LevelFilter;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const CONFIG_FILE: &str = "config.json";
pub const DATA_FILE: &str = "decks.json";
pub const DATA_FILE_ENV: &str = "FLASHCARDS_DATA_FILE";
pub const LOG_ENV: &str = "FLASHCARDS_LOG";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_file: PathBuf,
    pub log_level: LevelFilter,
    /// Create the sample deck when there are no decks yet.
    pub seed_sample_deck: bool,
}

/// On-disk shape of `config.json`; every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    data_file: Option<PathBuf>,
    log_level: Option<String>,
    seed_sample_deck: Option<bool>,
}

impl Config {
    /// Load from the platform data directory.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&default_config_dir())
    }

    /// Defaults, then `<dir>/config.json`, then environment overrides.
    pub fn load_from(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE);
        let file = if path.exists() {
            serde_json::from_str(&std::fs::read_to_string(&path)?)?
        } else {
            ConfigFile::default()
        };

        let mut config = Config {
            data_file: file.data_file.unwrap_or_else(|| dir.join(DATA_FILE)),
            log_level: file
                .log_level
                .as_deref()
                .and_then(parse_level)
                .unwrap_or(LevelFilter::Info),
            seed_sample_deck: file.seed_sample_deck.unwrap_or(true),
        };

        if let Ok(data_file) = std::env::var(DATA_FILE_ENV) {
            if !data_file.trim().is_empty() {
                config.data_file = PathBuf::from(data_file);
            }
        }
        if let Some(level) = std::env::var(LOG_ENV).ok().as_deref().and_then(parse_level) {
            config.log_level = level;
        }

        Ok(config)
    }
}

fn default_config_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("flashcards")
}

fn parse_level(level: &str) -> Option<LevelFilter> {
    LevelFilter::from_str(level.trim()).ok()
}
