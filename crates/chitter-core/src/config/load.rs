//! Configuration loading from files and environment (Immutable functional pattern)
//!
//! All operations return new instances rather than mutating in place.

use std::path::{Path, PathBuf};

use super::types::{Config, ConfigFile, CoordinationMode};
use crate::{Error, Result};

/// Environment variable overriding the state directory
pub const STATE_DIR_ENV: &str = "CHITTER_HOME";

// ═══════════════════════════════════════════════════════════════════════════
// PUBLIC API
// ═══════════════════════════════════════════════════════════════════════════

/// Load configuration from all sources with hierarchy
///
/// # Errors
///
/// Returns error if:
/// - A config file is malformed TOML
/// - An environment override cannot be parsed
/// - The merged values fail validation
pub fn load_config(state_dir: &Path) -> Result<Config> {
    // 1. Start with built-in defaults
    let config = Config::default();

    // 2. Global config if it exists
    let config = match global_config_path() {
        Some(path) if path.is_file() => config.merge(load_toml_file(&path)?),
        _ => config,
    };

    // 3. State directory config if it exists
    let local = state_dir.join("config.toml");
    let config = if local.is_file() {
        config.merge(load_toml_file(&local)?)
    } else {
        config
    };

    // 4. Environment overrides
    let config = config.apply_env(|key| std::env::var(key).ok())?;

    config.validate()?;
    Ok(config)
}

// ═══════════════════════════════════════════════════════════════════════════
// PATH HELPERS
// ═══════════════════════════════════════════════════════════════════════════

/// Get path to global config file
pub fn global_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "chitter")
        .map(|proj_dirs| proj_dirs.config_dir().join("config.toml"))
}

/// Resolve the state directory: `CHITTER_HOME`, else `~/.chitter`
///
/// # Errors
///
/// Returns error if no home directory can be determined
pub fn default_state_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(STATE_DIR_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".chitter"))
        .ok_or_else(|| {
            Error::InvalidConfig(format!(
                "cannot determine home directory; set {STATE_DIR_ENV}"
            ))
        })
}

/// Load a TOML file into a config layer
///
/// # Errors
///
/// Returns error if the file cannot be read or contains invalid TOML
pub fn load_toml_file(path: &Path) -> Result<ConfigFile> {
    if path.is_dir() {
        return Err(Error::Io(format!(
            "Config path is a directory, not a file: {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Io(format!(
            "Failed to read config file {}: {e}",
            path.display()
        ))
    })?;

    toml::from_str(&content).map_err(|e| {
        Error::Parse(format!(
            "Failed to parse config file {}: {e}",
            path.display()
        ))
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// ENVIRONMENT VARIABLE OVERRIDES
// ═══════════════════════════════════════════════════════════════════════════

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::InvalidConfig(format!("Invalid {key} value '{value}': {e}")))
}

impl Config {
    /// Apply `CHITTER_*` overrides read through `lookup`
    ///
    /// # Errors
    ///
    /// Returns error if an override value cannot be parsed
    pub fn apply_env(self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mode = lookup("CHITTER_MODE")
            .map(|v| parse_env::<CoordinationMode>("CHITTER_MODE", &v))
            .transpose()?;
        let max_concurrent = lookup("CHITTER_MAX_CONCURRENT")
            .map(|v| parse_env::<u32>("CHITTER_MAX_CONCURRENT", &v))
            .transpose()?;
        let retention_hours = lookup("CHITTER_RETENTION_HOURS")
            .map(|v| parse_env::<u64>("CHITTER_RETENTION_HOURS", &v))
            .transpose()?;
        let max_decisions = lookup("CHITTER_MAX_DECISIONS")
            .map(|v| parse_env::<usize>("CHITTER_MAX_DECISIONS", &v))
            .transpose()?;

        Ok(self.merge(ConfigFile {
            mode,
            max_concurrent,
            retention_hours,
            max_decisions,
            acknowledgement_marker: None,
        }))
    }
}
