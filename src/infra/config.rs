//! Configuration loading from TOML files
//!
//! The binary picks the file from `--config`, then the `CONFIG_FILE`
//! environment variable, then `config/dev.toml`. A file that cannot be
//! read or parsed falls back to defaults.

use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

/// What a trigger does while another pass holds the lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusyPolicy {
    /// Wait for the running pass, then run
    #[default]
    Queue,
    /// Fail fast with `PassError::Busy`
    Reject,
}

impl BusyPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            BusyPolicy::Queue => "queue",
            BusyPolicy::Reject => "reject",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Deployment identifier, included in the startup log
    #[serde(default = "default_site_id")]
    pub id: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self { id: default_site_id() }
    }
}

fn default_site_id() -> String {
    "parking-monitor".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_bind_address")]
    pub bind_address: String,
    /// API port (0 to disable the HTTP server)
    #[serde(default = "default_http_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { bind_address: default_http_bind_address(), port: default_http_port() }
    }
}

fn default_http_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub busy_policy: BusyPolicy,
    /// Deadline for every store call made during a pass
    #[serde(default = "default_accessor_timeout_ms")]
    pub accessor_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { busy_policy: BusyPolicy::default(), accessor_timeout_ms: default_accessor_timeout_ms() }
    }
}

fn default_accessor_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StoreConfig {
    /// JSON file with initial vehicles and regions
    #[serde(default)]
    pub seed_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval() }
    }
}

fn default_metrics_interval() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    site_id: String,
    http_bind_address: String,
    http_port: u16,
    busy_policy: BusyPolicy,
    accessor_timeout_ms: u64,
    seed_file: Option<String>,
    metrics_interval_secs: u64,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site_id: default_site_id(),
            http_bind_address: default_http_bind_address(),
            http_port: default_http_port(),
            busy_policy: BusyPolicy::Queue,
            accessor_timeout_ms: default_accessor_timeout_ms(),
            seed_file: None,
            metrics_interval_secs: default_metrics_interval(),
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self {
            site_id: toml_config.site.id,
            http_bind_address: toml_config.http.bind_address,
            http_port: toml_config.http.port,
            busy_policy: toml_config.engine.busy_policy,
            accessor_timeout_ms: toml_config.engine.accessor_timeout_ms,
            seed_file: toml_config.store.seed_file,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            config_file: path.display().to_string(),
        })
    }

    /// Load from an explicit path, falling back to defaults on any error
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    error = %format!("{e:#}"),
                    config_file = %path.display(),
                    "config_load_failed"
                );
                Self::default()
            }
        }
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn http_bind_address(&self) -> &str {
        &self.http_bind_address
    }

    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    pub fn busy_policy(&self) -> BusyPolicy {
        self.busy_policy
    }

    pub fn accessor_timeout_ms(&self) -> u64 {
        self.accessor_timeout_ms
    }

    pub fn seed_file(&self) -> Option<&str> {
        self.seed_file.as_deref()
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to set the busy policy
    #[cfg(test)]
    pub fn with_busy_policy(mut self, policy: BusyPolicy) -> Self {
        self.busy_policy = policy;
        self
    }

    /// Builder method for tests to set accessor_timeout_ms
    #[cfg(test)]
    pub fn with_accessor_timeout_ms(mut self, ms: u64) -> Self {
        self.accessor_timeout_ms = ms;
        self
    }
}
