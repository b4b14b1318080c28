use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

fn default_base_url() -> String {
    DEFAULT_BACKEND_URL.to_string()
}

fn default_preview_width() -> usize {
    32
}

fn default_history_limit() -> usize {
    50
}

#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub min_width: u32,
    pub min_height: u32,
}

#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct HistoryConfig {
    /// Columns shown per query in the history panel.
    #[serde(default = "default_preview_width")]
    pub preview_width: usize,
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            base_url: default_base_url(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            width: 960,
            height: 720,
            min_width: 480,
            min_height: 360,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        HistoryConfig {
            preview_width: default_preview_width(),
            limit: default_history_limit(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            backend: BackendConfig::default(),
            window: WindowConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}

impl Config {
    /// Reads `config.toml` from the config dir, falling back to defaults when
    /// the file is missing or broken.
    pub fn load() -> Self {
        Self::load_from(&Self::get_config_path())
    }

    pub fn load_from(config_path: &Path) -> Self {
        if !config_path.exists() {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            return Config::default();
        }

        match fs::read_to_string(config_path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(
                        path = %config_path.display(),
                        error = %e,
                        "error parsing config, using defaults"
                    )
                }
            },
            Err(e) => {
                tracing::warn!(
                    path = %config_path.display(),
                    error = %e,
                    "error reading config, using defaults"
                )
            }
        }

        Config::default()
    }

    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn get_config_path() -> PathBuf {
        Self::get_config_dir().join("config.toml")
    }

    pub fn get_config_dir() -> PathBuf {
        if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home).join(".config/study-buddy")
        } else {
            PathBuf::from(".")
        }
    }
}
