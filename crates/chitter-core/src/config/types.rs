//! Configuration type definitions

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{
    extract::{DEFAULT_MAX_DECISIONS, MAX_DECISIONS_CEILING},
    Error, Result,
};

/// Marker an agent prompt must carry in `gate` mode to prove it read the
/// coordination artifact.
pub const DEFAULT_MARKER: &str = "CHITTER_COORDINATION";

/// Retention beyond a century is treated as a century.
const MAX_RETENTION_HOURS: i64 = 24 * 365 * 100;

/// How strictly the coordinator enforces ordering between agents.
///
/// Marker-gated (`gate`) and turn-gated (`turns`) strictness are distinct
/// variants, so they cannot be requested together.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum CoordinationMode {
    /// Record agents and decisions, never intervene
    Track,
    /// Allow parallel agents but attach a warning pointing at the artifact
    #[default]
    Nudge,
    /// Deny parallel agents whose prompt lacks the acknowledgement marker
    Gate,
    /// Strict turn-taking: at most `max_concurrent` agents run at once
    Turns,
}

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub mode: CoordinationMode,
    pub max_concurrent: u32,
    pub retention_hours: u64,
    pub max_decisions: usize,
    pub acknowledgement_marker: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: CoordinationMode::default(),
            max_concurrent: 1,
            retention_hours: 24,
            max_decisions: DEFAULT_MAX_DECISIONS,
            acknowledgement_marker: DEFAULT_MARKER.to_string(),
        }
    }
}

/// A config file layer; absent keys leave the lower layer untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub mode: Option<CoordinationMode>,
    pub max_concurrent: Option<u32>,
    pub retention_hours: Option<u64>,
    pub max_decisions: Option<usize>,
    pub acknowledgement_marker: Option<String>,
}

impl Config {
    /// Overlay a file layer onto this config - immutable pattern
    #[must_use]
    pub fn merge(self, layer: ConfigFile) -> Self {
        Self {
            mode: layer.mode.unwrap_or(self.mode),
            max_concurrent: layer.max_concurrent.unwrap_or(self.max_concurrent),
            retention_hours: layer.retention_hours.unwrap_or(self.retention_hours),
            max_decisions: layer.max_decisions.unwrap_or(self.max_decisions),
            acknowledgement_marker: layer
                .acknowledgement_marker
                .unwrap_or(self.acknowledgement_marker),
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any values are out of range or invalid
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            return Err(Error::InvalidConfig(
                "max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.retention_hours == 0 {
            return Err(Error::InvalidConfig(
                "retention_hours must be at least 1".to_string(),
            ));
        }
        if !(1..=MAX_DECISIONS_CEILING).contains(&self.max_decisions) {
            return Err(Error::InvalidConfig(format!(
                "max_decisions must be 1-{MAX_DECISIONS_CEILING}"
            )));
        }
        if self.acknowledgement_marker.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "acknowledgement_marker cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Retention window as a chrono duration
    #[must_use]
    pub fn retention(&self) -> chrono::Duration {
        let hours = i64::try_from(self.retention_hours)
            .map_or(MAX_RETENTION_HOURS, |h| h.min(MAX_RETENTION_HOURS));
        chrono::Duration::hours(hours)
    }
}
