//! Application configuration.
//!
//! Configuration can be loaded from:
//! - TOML configuration file
//! - Environment variables (FANOUT_*)

use anyhow::{Context, Result};
use fanout_core::BusConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Event bus configuration.
    #[serde(default)]
    pub bus: BusConfig,

    /// Board configuration.
    #[serde(default)]
    pub board: BoardConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Board configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Number of card positions on the table.
    #[serde(default = "default_positions")]
    pub positions: usize,

    /// Offset into the deck where dealing starts.
    #[serde(default)]
    pub deal_offset: usize,

    /// How long to wait for the board to settle, in milliseconds.
    #[serde(default = "default_settle_timeout")]
    pub settle_timeout_ms: u64,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable the Prometheus exporter.
    #[serde(default)]
    pub enabled: bool,

    /// Exporter port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_positions() -> usize {
    10
}

fn default_settle_timeout() -> u64 {
    5_000 // 5 seconds
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            positions: default_positions(),
            deal_offset: 0,
            settle_timeout_ms: default_settle_timeout(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

impl BoardConfig {
    /// Settle timeout as a duration.
    #[must_use]
    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }
}

impl Config {
    /// Load configuration from file or defaults, then apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed, or an
    /// override is malformed.
    pub fn load() -> Result<Self> {
        let config_paths = [
            "fanout.toml",
            "/etc/fanout/fanout.toml",
            "~/.config/fanout/fanout.toml",
        ];

        let mut config = Self::default();
        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            let candidate: &str = expanded.as_ref();
            if Path::new(candidate).exists() {
                config = Self::from_file(candidate)?;
                break;
            }
        }

        // Environment overrides win over the file
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Apply `FANOUT_WORKERS`, `FANOUT_POSITIONS` and `FANOUT_METRICS_PORT`.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(workers) = var("FANOUT_WORKERS") {
            self.bus.worker_threads = workers
                .parse()
                .with_context(|| format!("Invalid FANOUT_WORKERS: {workers}"))?;
        }
        if let Some(positions) = var("FANOUT_POSITIONS") {
            self.board.positions = positions
                .parse()
                .with_context(|| format!("Invalid FANOUT_POSITIONS: {positions}"))?;
        }
        if let Some(port) = var("FANOUT_METRICS_PORT") {
            self.metrics.port = port
                .parse()
                .with_context(|| format!("Invalid FANOUT_METRICS_PORT: {port}"))?;
            self.metrics.enabled = true;
        }
        Ok(())
    }
}
