use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use crate::error::PopoError;
use crate::restore::RestoreMode;

/// Environment variable that overrides the data directory.
pub const DATA_DIR_ENV: &str = "POPO_DATA_DIR";

/// Which [`crate::store::DocumentStore`] backs the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Memory,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RestoreConfig {
    #[serde(default)]
    pub default_mode: RestoreMode,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub restore: RestoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub user: UserConfig,
    pub data_dir: PathBuf,
    pub resolved_output: String,
}

/// Default location of the user config file, if the platform has one.
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("popo/config.toml"))
}

pub fn load_user_config() -> Result<UserConfig> {
    match user_config_path() {
        Some(path) => load_config_file(&path),
        None => Ok(UserConfig::default()),
    }
}

/// Read a config file, returning defaults when it does not exist.
pub fn load_config_file(path: &Path) -> Result<UserConfig> {
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content).map_err(|err| {
        anyhow::Error::new(PopoError::Config {
            path: path.to_path_buf(),
            message: err.message().to_string(),
        })
    })
}

pub fn resolve_config(cli_data_dir: Option<&Path>, cli_json: bool) -> Result<EffectiveConfig> {
    let user = load_user_config()?;

    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(cli_json, user.output.clone(), env_format);
    let env_data_dir = env::var_os(DATA_DIR_ENV).map(PathBuf::from);
    let data_dir = resolve_data_dir(
        cli_data_dir.map(Path::to_path_buf),
        env_data_dir,
        user.storage.data_dir.clone(),
    )?;

    Ok(EffectiveConfig {
        user,
        data_dir,
        resolved_output,
    })
}

/// Flag, then environment, then config file, then the platform data dir.
fn resolve_data_dir(
    cli: Option<PathBuf>,
    env: Option<PathBuf>,
    configured: Option<PathBuf>,
) -> Result<PathBuf> {
    let chosen = cli
        .or_else(|| env.filter(|path| !path.as_os_str().is_empty()))
        .or(configured)
        .or_else(|| dirs::data_dir().map(|dir| dir.join("popo")));

    chosen.context("No data directory: pass --data-dir or set POPO_DATA_DIR")
}

fn resolve_output(cli_json: bool, user_output: Option<String>, env_format: Option<String>) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "table" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json".to_string();
    }

    if let Some(mode) = env_format.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = user_output.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if std::io::stdout().is_terminal() {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}
