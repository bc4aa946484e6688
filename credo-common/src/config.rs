//! Configuration loading for the Credo gateway
//!
//! Resolution priority for every overridable value:
//! 1. Command-line argument (handled by the binary)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Bounded handoff worker settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HandoffConfig {
    /// Minimum simulated remote processing delay (milliseconds)
    pub delay_min_ms: u64,
    /// Maximum simulated remote processing delay (milliseconds)
    pub delay_max_ms: u64,
    /// Pending job queue capacity; enqueue fails when full
    pub queue_capacity: usize,
    /// Number of concurrent worker tasks
    pub concurrency: usize,
    /// Overall deadline for one job, delay included (seconds)
    pub job_timeout_secs: u64,
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            delay_min_ms: 5000,
            delay_max_ms: 10000,
            queue_capacity: 64,
            concurrency: 4,
            job_timeout_secs: 60,
        }
    }
}

/// Gateway service configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP listen port
    pub port: u16,
    /// SQLite database file path
    pub database_path: PathBuf,
    /// Base URL under which this gateway is reachable for callbacks
    /// (e.g. "http://127.0.0.1:5810"). Unset means handoff jobs cannot
    /// deliver their callback and record a durable failure instead.
    pub public_base_url: Option<String>,
    /// Shared secret expected in X-Callback-Token on callback endpoints.
    /// Unset disables the check (logged as a warning at startup).
    pub callback_token: Option<String>,
    /// Timeout applied to each generative call in the internal pipeline
    pub generation_timeout_secs: u64,
    /// External handoff worker settings
    pub handoff: HandoffConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 5810,
            database_path: default_database_path(),
            public_base_url: None,
            callback_token: None,
            generation_timeout_secs: 30,
            handoff: HandoffConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration: TOML file (if present) layered with environment
    /// variable overrides, then normalized.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = match resolve_config_file(config_path) {
            Some(path) => {
                let content = std::fs::read_to_string(&path)?;
                let parsed: GatewayConfig = toml::from_str(&content)
                    .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
                info!("Configuration loaded from {}", path.display());
                parsed
            }
            None => GatewayConfig::default(),
        };

        config.apply_env_overrides();
        config.normalize();
        Ok(config)
    }

    /// Apply CREDO_* environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("CREDO_PORT") {
            match port.parse() {
                Ok(p) => self.port = p,
                Err(_) => warn!("Ignoring invalid CREDO_PORT value: {}", port),
            }
        }
        if let Ok(path) = std::env::var("CREDO_DATABASE") {
            self.database_path = PathBuf::from(path);
        }
        if let Ok(url) = std::env::var("CREDO_PUBLIC_BASE_URL") {
            self.public_base_url = Some(url);
        }
        if let Ok(token) = std::env::var("CREDO_CALLBACK_TOKEN") {
            self.callback_token = Some(token);
        }
    }

    /// Clamp degenerate values so the rest of the system can rely on them
    fn normalize(&mut self) {
        if self.handoff.delay_max_ms < self.handoff.delay_min_ms {
            warn!(
                "handoff.delay_max_ms ({}) < delay_min_ms ({}); using delay_min_ms for both",
                self.handoff.delay_max_ms, self.handoff.delay_min_ms
            );
            self.handoff.delay_max_ms = self.handoff.delay_min_ms;
        }
        if self.handoff.concurrency == 0 {
            self.handoff.concurrency = 1;
        }
        if self.handoff.queue_capacity == 0 {
            self.handoff.queue_capacity = 1;
        }
        if let Some(url) = &self.public_base_url {
            let trimmed = url.trim_end_matches('/').to_string();
            self.public_base_url = Some(trimmed);
        }
    }
}

/// Locate the config file: explicit path, then CREDO_CONFIG, then the
/// platform config directory. Returns None when no file exists (defaults
/// apply).
fn resolve_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var("CREDO_CONFIG") {
        return Some(PathBuf::from(path));
    }
    let default = dirs::config_dir()?.join("credo").join("credo-gw.toml");
    if default.exists() {
        Some(default)
    } else {
        None
    }
}

/// OS-dependent default database location
fn default_database_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("credo")
        .join("credo-gw.db")
}
