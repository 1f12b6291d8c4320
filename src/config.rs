// src/config.rs
//! Application configuration: `config/app.toml` plus environment overrides.
//!
//! Lookup order for the file: `$APP_CONFIG_PATH`, then `config/app.toml`.
//! A missing file yields the defaults; a malformed one is an error.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::ingest::DEFAULT_CONTENT_MAX_CHARS;
use crate::lexicon::DEFAULT_LEARNING_RATE;

pub const ENV_CONFIG_PATH: &str = "APP_CONFIG_PATH";
pub const ENV_REFRESH_INTERVAL: &str = "REFRESH_INTERVAL_SECS";
pub const ENV_LEXICON_PATH: &str = "LEXICON_PATH";
pub const ENV_THEMES_PATH: &str = "THEMES_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/app.toml";

fn default_lexicon_path() -> PathBuf {
    PathBuf::from("state/sentiment-lexicon.json")
}
fn default_themes_path() -> PathBuf {
    PathBuf::from("config/themes.json")
}
fn default_refresh_interval_secs() -> u64 {
    1800
}
fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}
fn default_content_max_chars() -> usize {
    DEFAULT_CONTENT_MAX_CHARS
}
fn default_learning_rate() -> f64 {
    DEFAULT_LEARNING_RATE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_lexicon_path")]
    pub lexicon_path: PathBuf,
    #[serde(default = "default_themes_path")]
    pub themes_path: PathBuf,
    /// RSS feed URLs.
    #[serde(default)]
    pub feeds: Vec<String>,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    #[serde(default = "default_content_max_chars")]
    pub content_max_chars: usize,
    /// Only used when seeding a fresh lexicon.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            lexicon_path: default_lexicon_path(),
            themes_path: default_themes_path(),
            feeds: Vec::new(),
            refresh_interval_secs: default_refresh_interval_secs(),
            history_capacity: default_history_capacity(),
            content_max_chars: default_content_max_chars(),
            learning_rate: default_learning_rate(),
        }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading app config from {}", path.display()))?;
        let mut cfg: AppConfig = toml::from_str(&data)
            .with_context(|| format!("parsing app config {}", path.display()))?;
        cfg.sanitize();
        Ok(cfg)
    }

    /// File (if present) + env overrides.
    pub fn load() -> Result<Self> {
        let path = std::env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        let mut cfg = if path.exists() {
            Self::load_from_file(&path)?
        } else {
            Self::default()
        };
        cfg.apply_env()?;
        Ok(cfg)
    }

    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(v) = std::env::var(ENV_REFRESH_INTERVAL) {
            self.refresh_interval_secs = v
                .trim()
                .parse()
                .map_err(|_| anyhow!("{ENV_REFRESH_INTERVAL} must be an integer, got '{v}'"))?;
        }
        if let Ok(v) = std::env::var(ENV_LEXICON_PATH) {
            self.lexicon_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var(ENV_THEMES_PATH) {
            self.themes_path = PathBuf::from(v);
        }
        self.sanitize();
        Ok(())
    }

    fn sanitize(&mut self) {
        if self.refresh_interval_secs == 0 {
            self.refresh_interval_secs = default_refresh_interval_secs();
        }
        if self.history_capacity == 0 {
            self.history_capacity = default_history_capacity();
        }
        if self.content_max_chars == 0 {
            self.content_max_chars = default_content_max_chars();
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            self.learning_rate = default_learning_rate();
        }
        self.feeds.retain(|f| !f.trim().is_empty());
        for f in self.feeds.iter_mut() {
            *f = f.trim().to_string();
        }
    }
}
