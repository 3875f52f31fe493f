use crate::error::AppError;
use crate::storage::json_store;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_ENV_VAR: &str = "TODOAPP_CONFIG_PATH";

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Task store file; the per-user default is used when unset.
    #[serde(default)]
    pub store_path: Option<PathBuf>,
    /// `tracing` filter directive, e.g. `todo_core=debug`.
    #[serde(default)]
    pub log_filter: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub error: Option<AppError>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub store_path: Option<PathBuf>,
    pub log_filter: Option<String>,
}

pub fn config_path() -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    if cfg!(windows) {
        let appdata =
            std::env::var("APPDATA").map_err(|_| AppError::invalid_data("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata)
            .join("todoapp")
            .join(CONFIG_FILE_NAME))
    } else {
        let home = std::env::var("HOME").map_err(|_| AppError::invalid_data("HOME is not set"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("todoapp")
            .join(CONFIG_FILE_NAME))
    }
}

/// Loads the config file, falling back to defaults when it is missing or
/// broken. A broken file is reported in [`ConfigLoad::error`].
pub fn load_config_with_fallback() -> ConfigLoad {
    match config_path() {
        Ok(path) => load_config_with_fallback_from_path(&path),
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_with_fallback_from_path(path: &Path) -> ConfigLoad {
    if !path.exists() {
        return ConfigLoad {
            config: Config::default(),
            error: None,
        };
    }

    match load_config_from_path(path) {
        Ok(config) => ConfigLoad {
            config,
            error: None,
        },
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_from_path(path: &Path) -> Result<Config, AppError> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| AppError::io(format!("{}: {}", path.display(), err)))?;
    let config: Config = serde_json::from_str(&content).map_err(|err| {
        AppError::invalid_data(format!("invalid JSON in {}: {}", path.display(), err))
    })?;
    Ok(normalize(config))
}

fn normalize(mut config: Config) -> Config {
    config.log_filter = config
        .log_filter
        .map(|filter| filter.trim().to_string())
        .filter(|filter| !filter.is_empty());
    config.store_path = config
        .store_path
        .filter(|path| !path.as_os_str().is_empty());
    config
}

pub fn merge_overrides(base: &Config, overrides: &ConfigOverrides) -> Config {
    let mut merged = base.clone();
    if let Some(store_path) = overrides.store_path.as_ref() {
        merged.store_path = Some(store_path.clone());
    }
    if let Some(log_filter) = overrides.log_filter.as_ref() {
        merged.log_filter = Some(log_filter.clone());
    }
    normalize(merged)
}

/// Store location: an explicit override, then `TODOAPP_STORE_PATH`, then
/// the config file, then the per-user default.
pub fn resolve_store_path(
    config: &Config,
    overrides: &ConfigOverrides,
) -> Result<PathBuf, AppError> {
    let from_env = std::env::var(json_store::STORE_PATH_ENV_VAR).ok();
    match pick_store_path(from_env, config, overrides) {
        Some(path) => Ok(path),
        None => json_store::default_store_path(),
    }
}

fn pick_store_path(
    from_env: Option<String>,
    config: &Config,
    overrides: &ConfigOverrides,
) -> Option<PathBuf> {
    overrides
        .store_path
        .clone()
        .filter(|path| !path.as_os_str().is_empty())
        .or_else(|| {
            from_env
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from)
        })
        .or_else(|| config.store_path.clone())
}
