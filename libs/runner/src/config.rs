//! Runner configuration.

use anyhow::Result;

/// Configuration for the executor.
#[derive(Debug, Clone)]
pub struct Config {
    /// Save the failing case's environment state as a snapshot named
    /// `{failure_snapshot_prefix}{case}` when a body fails.
    pub failure_snapshots: bool,

    /// Name prefix for failure snapshots.
    pub failure_snapshot_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            failure_snapshots: true,
            failure_snapshot_prefix: "error_".to_string(),
        }
    }
}

impl Config {
    /// Read configuration from `RIGOR_*` environment variables,
    /// falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let failure_snapshots = std::env::var("RIGOR_FAILURE_SNAPSHOTS")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(true);

        let failure_snapshot_prefix = std::env::var("RIGOR_FAILURE_SNAPSHOT_PREFIX")
            .unwrap_or_else(|_| "error_".to_string());

        Ok(Self {
            failure_snapshots,
            failure_snapshot_prefix,
        })
    }
}
