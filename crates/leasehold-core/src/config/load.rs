//! Configuration loading from files and environment
//!
//! Layers are applied in this order, each returning a new `Config`:
//! 1. Built-in defaults and catalog (`catalog.toml`, embedded)
//! 2. Global config: ~/.config/leasehold/config.toml
//! 3. Project config: .leasehold/config.toml
//!    (steps 2 and 3 are skipped when an explicit file is given)
//! 4. Environment variables: `LEASEHOLD_*`
//! 5. CLI overrides

use std::path::{Path, PathBuf};

use super::types::{Config, ConfigLayer};
use crate::{Error, Result};

const BUILTIN_CATALOG: &str = include_str!("../../catalog.toml");

/// Environment variable overriding the store path.
pub const ENV_DB: &str = "LEASEHOLD_DB";
/// Environment variable toggling durable history.
pub const ENV_PERSIST_HISTORY: &str = "LEASEHOLD_PERSIST_HISTORY";

/// Caller-supplied overrides.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Use only this file instead of the global and project files
    pub config_file: Option<PathBuf>,
    /// Store path taking precedence over every other source
    pub db_path: Option<PathBuf>,
}

// ═══════════════════════════════════════════════════════════════════════════
// PUBLIC API
// ═══════════════════════════════════════════════════════════════════════════

/// Load configuration from all sources, reading the process environment.
pub fn load_config(options: &LoadOptions) -> Result<Config> {
    load_config_with(options, |key| std::env::var(key).ok())
}

/// Load configuration with an injected environment lookup.
pub fn load_config_with<F>(options: &LoadOptions, env: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let config = Config::builtin()?;

    let config = match &options.config_file {
        Some(path) => config.merge(load_layer(path)?),
        None => {
            let config = match global_config_path() {
                Some(global) if global.is_file() => config.merge(load_layer(&global)?),
                _ => config,
            };
            let project = project_config_path()?;
            if project.is_file() {
                config.merge(load_layer(&project)?)
            } else {
                config
            }
        }
    };

    let config = config.apply_env(env)?;
    let config = match &options.db_path {
        Some(path) => config.with_db_path(path.clone()),
        None => config,
    };

    config.validate()?;
    Ok(config)
}

// ═══════════════════════════════════════════════════════════════════════════
// PATH HELPERS
// ═══════════════════════════════════════════════════════════════════════════

/// Get path to global config file
pub fn global_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "leasehold")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Get path to project config file
pub fn project_config_path() -> Result<PathBuf> {
    std::env::current_dir()
        .map(|dir| dir.join(".leasehold/config.toml"))
        .map_err(|e| Error::IoError(format!("Failed to get current directory: {e}")))
}

fn load_layer(path: &Path) -> Result<ConfigLayer> {
    if path.is_dir() {
        return Err(Error::IoError(format!(
            "Config path is a directory, not a file: {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::IoError(format!("Failed to read config file {}: {e}", path.display()))
    })?;

    toml::from_str(&content).map_err(|e| {
        Error::ParseError(format!(
            "Failed to parse config file {}: {e}",
            path.display()
        ))
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// LAYERING
// ═══════════════════════════════════════════════════════════════════════════

impl Config {
    /// Built-in defaults and catalog.
    pub fn builtin() -> Result<Self> {
        toml::from_str(BUILTIN_CATALOG).map_err(Error::from)
    }

    /// Built-in defaults overlaid with a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let layer: ConfigLayer = toml::from_str(content)?;
        let config = Self::builtin()?.merge(layer);
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn merge(self, layer: ConfigLayer) -> Self {
        let store = match layer.store {
            Some(store) => super::types::StoreConfig {
                path: store.path.unwrap_or(self.store.path),
                persist_history: store.persist_history.unwrap_or(self.store.persist_history),
            },
            None => self.store,
        };
        Self {
            store,
            publishers: layer.publishers.unwrap_or(self.publishers),
            environments: layer.environments.unwrap_or(self.environments),
        }
    }

    /// Apply `LEASEHOLD_*` overrides.
    pub fn apply_env<F>(mut self, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = env(ENV_DB).filter(|p| !p.trim().is_empty()) {
            self.store.path = PathBuf::from(path);
        }

        if let Some(raw) = env(ENV_PERSIST_HISTORY) {
            self.store.persist_history = parse_bool(&raw).ok_or_else(|| {
                Error::InvalidConfig(format!(
                    "Invalid {ENV_PERSIST_HISTORY} value: {raw}. Must be true or false"
                ))
            })?;
        }

        Ok(self)
    }

    #[must_use]
    pub fn with_db_path(mut self, path: PathBuf) -> Self {
        self.store.path = path;
        self
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
