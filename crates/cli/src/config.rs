use std::{
    collections::BTreeMap,
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use plex_core::RunConfig;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "plex.toml";
const CONFIG_DIR_NAME: &str = "plex";

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlexConfig {
    pub run: RunConfig,
    /// Default keyword arguments for every invocation.
    pub arguments: BTreeMap<String, Value>,
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunOverrides {
    pub name: Option<String>,
    pub return_exceptions: Option<bool>,
    pub max_concurrency: Option<NonZeroUsize>,
    pub arguments: BTreeMap<String, Value>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse toml at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

pub fn load_config(path: impl AsRef<Path>) -> Result<PlexConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: PlexConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(config)
}

/// Loads `explicit` when given. Otherwise the first existing file of
/// `./plex.toml` and `<config dir>/plex/plex.toml`, or defaults.
pub fn load_or_default(explicit: Option<&Path>) -> Result<PlexConfig, ConfigError> {
    if let Some(path) = explicit {
        return load_config(path);
    }
    match discover_config() {
        Some(path) => {
            tracing::debug!(path = %path.display(), "using discovered config");
            load_config(path)
        }
        None => Ok(PlexConfig::default()),
    }
}

pub fn discover_config() -> Option<PathBuf> {
    let local = PathBuf::from(DEFAULT_CONFIG_PATH);
    if local.is_file() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_DIR_NAME).join(DEFAULT_CONFIG_PATH))
        .filter(|path| path.is_file())
}

pub fn resolve_run(config: &PlexConfig, overrides: &RunOverrides) -> RunConfig {
    let mut run = config.run.clone();
    if let Some(name) = &overrides.name {
        run.name = name.clone();
    }
    run.return_exceptions = overrides.return_exceptions.unwrap_or(run.return_exceptions);
    run.max_concurrency = overrides.max_concurrency.or(run.max_concurrency);
    run
}

/// File arguments with command-line arguments laid over them.
pub fn resolve_arguments(config: &PlexConfig, overrides: &RunOverrides) -> BTreeMap<String, Value> {
    let mut arguments = config.arguments.clone();
    arguments.extend(
        overrides
            .arguments
            .iter()
            .map(|(name, value)| (name.clone(), value.clone())),
    );
    arguments
}
