//! Configuration file support for gtanalyzer.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags and request payloads
//! 2. Environment variables (prefixed with `GTANALYZER_`, e.g., `GTANALYZER_GITHUB_TOKEN`)
//! 3. Config file (~/.config/gtanalyzer/config.toml or ./gtanalyzer.toml)
//! 4. Built-in defaults
//!
//! Environment variables map `_` to a section separator, so only single-word
//! keys (`GTANALYZER_GITHUB_TOKEN`, `GTANALYZER_TAIGA_TOKEN`,
//! `GTANALYZER_SERVER_BIND`) are reachable that way.
//!
//! Example config file:
//! ```toml
//! [github]
//! token = "ghp_..."  # or use GTANALYZER_GITHUB_TOKEN env var
//! api_url = "https://api.github.com"
//! requests_per_second = 10
//!
//! [taiga]
//! token = "..."  # or use GTANALYZER_TAIGA_TOKEN env var
//! api_url = "https://api.taiga.io/api/v1"
//! requests_per_second = 5
//!
//! [upstream]
//! timeout_secs = 30
//! max_retries = 5
//! min_backoff_ms = 1000
//! max_backoff_ms = 60000
//!
//! [store]
//! ttl_secs = 3600
//! sweep_interval_secs = 60
//!
//! [server]
//! bind = "127.0.0.1:8000"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use gtanalyzer::platform::rate_limits;
use gtanalyzer::retry::RetryConfig;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub github: GitHubConfig,
    pub taiga: TaigaConfig,
    /// Timeouts and backoff for every upstream call.
    pub upstream: UpstreamConfig,
    /// In-memory result store.
    pub store: StoreConfig,
    pub server: ServerConfig,
}

/// GitHub configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// GitHub API token.
    /// Can also be set via GTANALYZER_GITHUB_TOKEN environment variable.
    pub token: Option<String>,
    /// API base URL; point at a GitHub Enterprise instance if needed.
    pub api_url: String,
    pub requests_per_second: u32,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: "https://api.github.com".to_string(),
            requests_per_second: rate_limits::GITHUB_DEFAULT_RPS,
        }
    }
}

/// Taiga configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TaigaConfig {
    /// Taiga bearer token.
    /// Can also be set via GTANALYZER_TAIGA_TOKEN environment variable.
    pub token: Option<String>,
    pub api_url: String,
    pub requests_per_second: u32,
}

impl Default for TaigaConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: "https://api.taiga.io/api/v1".to_string(),
            requests_per_second: rate_limits::TAIGA_DEFAULT_RPS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Retries after the first attempt; 0 disables retrying.
    pub max_retries: usize,
    pub min_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 5,
            min_backoff_ms: 1_000,
            max_backoff_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Idle time after which a request's results are dropped.
    pub ttl_secs: u64,
    /// How often the background sweeper evicts expired requests.
    pub sweep_interval_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3_600,
            sweep_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address for `gtanalyzer serve`.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
        }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/gtanalyzer/config.toml)
    /// 3. Local config file (./gtanalyzer.toml)
    /// 4. Environment variables with GTANALYZER_ prefix
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(xdg_config) = Self::default_config_path()
            && xdg_config.exists()
        {
            tracing::debug!("Loading config from {:?}", xdg_config);
            builder = builder.add_source(
                File::from(xdg_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let local_config = PathBuf::from("gtanalyzer.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./gtanalyzer.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // e.g., GTANALYZER_GITHUB_TOKEN -> github.token
        builder = builder.add_source(
            Environment::with_prefix("GTANALYZER")
                .separator("_")
                .try_parsing(true),
        );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    /// Backoff policy shared by both clients.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new(
            Duration::from_millis(self.upstream.min_backoff_ms),
            Duration::from_millis(self.upstream.max_backoff_ms),
            self.upstream.max_retries,
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.upstream.timeout_secs)
    }

    pub fn store_ttl(&self) -> Duration {
        Duration::from_secs(self.store.ttl_secs)
    }

    /// Sweep interval, never shorter than one second.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.store.sweep_interval_secs.max(1))
    }

    /// Get the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "gtanalyzer").map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
