use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::category::DEFAULT_LANGUAGE;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write config '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid toml config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("failed to encode config: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("invalid json5 config: {0}")]
    Json5(#[from] json5::Error),
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub index_db_path: PathBuf,
    pub log_dir: PathBuf,
    pub stored_list_paths: Vec<PathBuf>,
    pub min_key_length: usize,
    /// Fan-out timeout in milliseconds; 0 waits for every provider.
    pub search_timeout_ms: u64,
    pub default_language: String,
    pub service_name: String,
    pub app_manager_service: String,
    pub settings_service: String,
    pub media_catalog_service: String,
}

impl Default for Config {
    fn default() -> Self {
        let base = std::env::temp_dir().join("unisearch");
        Self {
            index_db_path: base.join("index.sqlite3"),
            log_dir: base.join("logs"),
            stored_list_paths: vec![base.join("lists")],
            min_key_length: 2,
            search_timeout_ms: 0,
            default_language: DEFAULT_LANGUAGE.to_string(),
            service_name: "unisearch".to_string(),
            app_manager_service: "app-manager".to_string(),
            settings_service: "settings".to_string(),
            media_catalog_service: "media-catalog".to_string(),
        }
    }
}

impl Config {
    pub fn search_timeout(&self) -> Option<Duration> {
        (self.search_timeout_ms > 0).then(|| Duration::from_millis(self.search_timeout_ms))
    }
}

pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json") || ext.eq_ignore_ascii_case("json5"));
    let cfg: Config = if is_json {
        json5::from_str(&raw)?
    } else {
        toml::from_str(&raw)?
    };
    validate(&cfg)?;
    Ok(cfg)
}

pub fn save(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    let encoded = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, encoded).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.index_db_path.as_os_str().is_empty() {
        return Err(ConfigError::Invalid("index_db_path is required".into()));
    }

    if cfg.log_dir.as_os_str().is_empty() {
        return Err(ConfigError::Invalid("log_dir is required".into()));
    }

    if cfg.min_key_length < 1 || cfg.min_key_length > 32 {
        return Err(ConfigError::Invalid("min_key_length out of range".into()));
    }

    if cfg.search_timeout_ms > 60_000 {
        return Err(ConfigError::Invalid("search_timeout_ms out of range".into()));
    }

    if cfg.default_language.trim().is_empty() {
        return Err(ConfigError::Invalid("default_language is required".into()));
    }

    let names = [
        ("service_name", &cfg.service_name),
        ("app_manager_service", &cfg.app_manager_service),
        ("settings_service", &cfg.settings_service),
        ("media_catalog_service", &cfg.media_catalog_service),
    ];
    for (field, value) in names {
        if value.trim().is_empty() || value.contains('/') {
            return Err(ConfigError::Invalid(format!("{field} must be a plain service name")));
        }
    }

    Ok(())
}
