use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },
}

/// Inline completion settings (`[completion]`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub enabled: bool,
    pub model: String,
    /// Base URL of an OpenAI-compatible API
    pub api_base: String,
    /// Environment variable holding the API key. The key itself never goes
    /// in the config file.
    pub api_key_env: String,
    pub max_tokens: u32,
    pub debounce_ms: u64,
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "gpt-4o-mini".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            max_tokens: 50,
            debounce_ms: 500,
            timeout_secs: 30,
        }
    }
}

impl CompletionConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// `[autosave]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutosaveConfig {
    pub interval_ms: u64,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self { interval_ms: 1000 }
    }
}

impl AutosaveConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub notes_path: PathBuf,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub autosave: AutosaveConfig,
}

impl Config {
    pub fn new(notes_path: impl Into<PathBuf>) -> Self {
        Self {
            notes_path: notes_path.into(),
            completion: CompletionConfig::default(),
            autosave: AutosaveConfig::default(),
        }
    }

    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        Self::parse(&content, config_path).map(Some)
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    fn parse(content: &str, config_path: &Path) -> Result<Self, ConfigError> {
        let mut config: Config =
            toml::from_str(content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        // Expand shell variables and tilde in the notes path
        config.notes_path = Self::expand_path(&config.notes_path).unwrap_or(config.notes_path);
        Ok(config)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        self.save_to_path(&config_path)
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/inkling");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    /// The completion API key, read from the configured environment variable
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.completion.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    fn expand_path(path: &Path) -> Option<PathBuf> {
        let path_str = path.to_string_lossy();
        shellexpand::full(&path_str)
            .ok()
            .map(|expanded| PathBuf::from(expanded.as_ref()))
    }
}
