//! Configuration loading
//!
//! Resolution priority, highest first:
//! 1. Command-line overrides
//! 2. Environment variables (`EXO_*`)
//! 3. TOML config file (`--config` or `~/.config/exovision/config.toml`)
//! 4. Compiled defaults
//!
//! A missing TOML file is not an error: a warning is logged and defaults apply.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

use crate::{Error, Result};

/// Default listen address
pub const DEFAULT_BIND: &str = "127.0.0.1:5730";

/// Logging section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// tracing filter directive, e.g. "info" or "exo_vision=debug"
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Local inference server used by the chat assistant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub host: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            host: "http://127.0.0.1:11434".to_string(),
            model: "llama3.2".to_string(),
            temperature: 0.7,
            max_tokens: 512,
            timeout_secs: 300,
        }
    }
}

impl ChatConfig {
    /// Overlay `EXO_CHAT_*` variables
    fn apply_env_from<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        if let Some(host) = lookup("EXO_CHAT_HOST") {
            self.host = host;
        }
        if let Some(model) = lookup("EXO_CHAT_MODEL") {
            self.model = model;
        }
        override_parsed(&lookup, "EXO_CHAT_TEMPERATURE", &mut self.temperature);
        override_parsed(&lookup, "EXO_CHAT_MAX_TOKENS", &mut self.max_tokens);
        override_parsed(&lookup, "EXO_CHAT_TIMEOUT_SECS", &mut self.timeout_secs);
    }
}

/// Complete service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub bind: String,
    /// Directory holding the model, manifest and metrics files
    pub artifacts_dir: PathBuf,
    pub model_file: String,
    pub features_file: String,
    pub metrics_file: String,
    /// Decision threshold on P(CONFIRMED)
    pub threshold: f64,
    /// Value substituted for missing or non-numeric features
    pub missing_value_default: f64,
    pub rounds_total: u32,
    pub curve_points: usize,
    pub game_noise_sigma: f64,
    pub session_idle_secs: u64,
    pub logging: LoggingConfig,
    pub chat: ChatConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            artifacts_dir: PathBuf::from("./artifacts"),
            model_file: "model.json".to_string(),
            features_file: "features.json".to_string(),
            metrics_file: "metrics.json".to_string(),
            threshold: 0.5,
            missing_value_default: 0.0,
            rounds_total: 5,
            curve_points: 400,
            game_noise_sigma: 0.0015,
            session_idle_secs: 3600,
            logging: LoggingConfig::default(),
            chat: ChatConfig::default(),
        }
    }
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind: Option<String>,
    pub artifacts_dir: Option<PathBuf>,
    pub threshold: Option<f64>,
    pub log_level: Option<String>,
}

impl ServiceConfig {
    /// Resolve configuration from all tiers
    pub fn resolve(config_path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        let mut config = match config_path.map(Path::to_path_buf).or_else(default_config_file) {
            Some(path) => Self::from_toml_file(&path)?,
            None => Self::default(),
        };
        config.apply_env_from(|key| std::env::var(key).ok());
        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file; a missing file falls back to defaults
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
        let config = Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("Parse TOML {} failed: {}", path.display(), e)))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Overlay `EXO_*` variables provided by `lookup`
    ///
    /// Unparseable values are logged and ignored.
    pub fn apply_env_from<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        if let Some(bind) = lookup("EXO_BIND") {
            self.bind = bind;
        }
        if let Some(dir) = lookup("EXO_ARTIFACTS_DIR") {
            self.artifacts_dir = PathBuf::from(dir);
        }
        if let Some(file) = lookup("EXO_MODEL_FILE") {
            self.model_file = file;
        }
        if let Some(file) = lookup("EXO_FEATURES_FILE") {
            self.features_file = file;
        }
        if let Some(file) = lookup("EXO_METRICS_FILE") {
            self.metrics_file = file;
        }
        if let Some(level) = lookup("EXO_LOG_LEVEL") {
            self.logging.level = level;
        }
        override_parsed(&lookup, "EXO_THRESHOLD", &mut self.threshold);
        override_parsed(&lookup, "EXO_MISSING_VALUE_DEFAULT", &mut self.missing_value_default);
        override_parsed(&lookup, "EXO_ROUNDS_TOTAL", &mut self.rounds_total);
        override_parsed(&lookup, "EXO_CURVE_POINTS", &mut self.curve_points);
        override_parsed(&lookup, "EXO_GAME_NOISE_SIGMA", &mut self.game_noise_sigma);
        override_parsed(&lookup, "EXO_SESSION_IDLE_SECS", &mut self.session_idle_secs);
        self.chat.apply_env_from(&lookup);
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(bind) = &overrides.bind {
            self.bind = bind.clone();
        }
        if let Some(dir) = &overrides.artifacts_dir {
            self.artifacts_dir = dir.clone();
        }
        if let Some(threshold) = overrides.threshold {
            self.threshold = threshold;
        }
        if let Some(level) = &overrides.log_level {
            self.logging.level = level.clone();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(Error::Config(format!(
                "threshold must be between 0 and 1, got {}",
                self.threshold
            )));
        }
        if !self.missing_value_default.is_finite() {
            return Err(Error::Config("missing_value_default must be finite".to_string()));
        }
        if self.rounds_total == 0 {
            return Err(Error::Config("rounds_total must be at least 1".to_string()));
        }
        if self.curve_points == 0 {
            return Err(Error::Config("curve_points must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn model_path(&self) -> PathBuf {
        self.artifacts_dir.join(&self.model_file)
    }

    pub fn features_path(&self) -> PathBuf {
        self.artifacts_dir.join(&self.features_file)
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.artifacts_dir.join(&self.metrics_file)
    }
}

/// `~/.config/exovision/config.toml` when it exists
fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir()
        .map(|d| d.join("exovision").join("config.toml"))
        .filter(|p| p.exists())
}

fn override_parsed<T, F>(lookup: &F, key: &str, target: &mut T)
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(key) {
        match raw.trim().parse::<T>() {
            Ok(value) => *target = value,
            Err(_) => warn!("Ignoring {}={:?}: not a valid value", key, raw),
        }
    }
}
