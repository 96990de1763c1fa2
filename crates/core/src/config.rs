use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{OutreachError, OutreachResult};

/// Root application configuration. Loaded from an optional TOML file and
/// environment variables with the prefix `OUTREACH__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub review: ReviewConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Where the pipeline executor lives and how the client talks to it.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// No client-side timeout unless set.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewConfig {
    #[serde(default = "default_regen_score_min")]
    pub regen_score_min: f64,
    #[serde(default = "default_regen_score_max")]
    pub regen_score_max: f64,
}

/// Settings for the stub pipeline executor served by `outreach-engine serve`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
    #[serde(default = "default_stage_delay_ms")]
    pub stage_delay_ms: u64,
}

// Default functions
fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_poll_interval_ms() -> u64 {
    2000
}
fn default_regen_score_min() -> f64 {
    5.0
}
fn default_regen_score_max() -> f64 {
    9.0
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_stage_delay_ms() -> u64 {
    500
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: None,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            regen_score_min: default_regen_score_min(),
            regen_score_max: default_regen_score_max(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            metrics_port: default_metrics_port(),
            stage_delay_ms: default_stage_delay_ms(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            polling: PollingConfig::default(),
            review: ReviewConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

impl AppConfig {
    /// Load configuration from an optional config file and environment variables.
    /// Environment variables win over the file.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("OUTREACH")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Reject settings the session cannot run with.
    pub fn validate(&self) -> OutreachResult<()> {
        url::Url::parse(&self.backend.base_url).map_err(|e| {
            OutreachError::Config(format!(
                "backend.base_url '{}' is not a valid URL: {e}",
                self.backend.base_url
            ))
        })?;

        if self.polling.interval_ms == 0 {
            return Err(OutreachError::Config(
                "polling.interval_ms must be greater than zero".to_string(),
            ));
        }

        let (min, max) = (self.review.regen_score_min, self.review.regen_score_max);
        if !(0.0..=10.0).contains(&min) || !(0.0..=10.0).contains(&max) || min > max {
            return Err(OutreachError::Config(format!(
                "review score range [{min}, {max}] must lie within [0, 10] with min <= max"
            )));
        }

        Ok(())
    }
}
