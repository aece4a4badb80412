//! Engine configuration, loaded from YAML.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Submissions allowed per client in one 1-second window.
    #[serde(default = "default_max_submit_per_sec")]
    pub max_submit_per_sec: u32,

    /// When true any client may submit; otherwise only the current authority.
    #[serde(default = "default_local_authority")]
    pub local_authority: bool,

    #[serde(default)]
    pub gaps: GapConfig,

    /// Committed events between persisted snapshots.
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval: u64,
}

fn default_max_submit_per_sec() -> u32 {
    10
}

fn default_local_authority() -> bool {
    true
}

fn default_snapshot_interval() -> u64 {
    16
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_submit_per_sec: default_max_submit_per_sec(),
            local_authority: default_local_authority(),
            gaps: GapConfig::default(),
            snapshot_interval: default_snapshot_interval(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        Ok(config)
    }

    /// Loads `path` when given and present, otherwise the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    /// Settings for a networked client that defers to a remote authority.
    pub fn remote_authority() -> Self {
        Self {
            local_authority: false,
            ..Self::default()
        }
    }
}

/// Retry and escalation policy for missing event ranges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GapConfig {
    pub initial_retry_secs: u64,
    /// Cap on the exponential backoff.
    pub max_backoff_secs: u64,
    pub max_retries: u32,
    /// Time from detection after which the engine goes read-only.
    pub deadline_secs: u64,
}

impl Default for GapConfig {
    fn default() -> Self {
        Self {
            initial_retry_secs: 1,
            max_backoff_secs: 16,
            max_retries: 5,
            deadline_secs: 31,
        }
    }
}

impl GapConfig {
    pub fn first_retry_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        after(now, self.initial_retry_secs)
    }

    pub fn deadline_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        after(now, self.deadline_secs)
    }

    /// `min(2^retry_count, max_backoff)` seconds.
    pub fn backoff_secs(&self, retry_count: u32) -> u64 {
        1u64.checked_shl(retry_count)
            .unwrap_or(u64::MAX)
            .min(self.max_backoff_secs)
    }

    pub fn next_retry_at(&self, now: DateTime<Utc>, retry_count: u32) -> DateTime<Utc> {
        after(now, self.backoff_secs(retry_count))
    }
}

fn after(now: DateTime<Utc>, secs: u64) -> DateTime<Utc> {
    let delta = i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX);
    now.checked_add_signed(delta)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
