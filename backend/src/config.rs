//! Configuration for the differer gateway.

use std::collections::BTreeMap;
use std::env;
use std::path::Path;
use std::time::Duration;

use config::{Config as ConfigLoader, Environment, File, FileFormat};
use serde::{Deserialize, Deserializer};
use tokio::sync::Semaphore;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_VAR: &str = "DIFFERER_CONFIG";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Main configuration structure for the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Runner name to service URL.
    #[serde(default)]
    pub runners: BTreeMap<String, String>,
    /// Timeout applied to every outbound runner call. Zero means "use the default".
    #[serde(default = "default_timeout", deserialize_with = "deserialize_timeout")]
    pub timeout: Duration,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Dispatch engine tuning.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DispatchConfig {
    /// Upper bound on concurrent runner calls across a batch.
    /// Unset means one call per (address, runner) pair, all at once.
    #[serde(default)]
    pub max_in_flight: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not decode: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid port number: {0}")]
    InvalidPort(String),
    #[error("Invalid URL for runner {name}: {reason}")]
    InvalidRunnerUrl { name: String, reason: String },
    #[error("dispatch.max_in_flight must be between 1 and {}, got {0}", Semaphore::MAX_PERMITS)]
    InvalidDispatchLimit(usize),
    #[error("Could not build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

// Default values
fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_log_level() -> String {
    "info".to_string()
}

/// Timeouts are written as humantime strings (`5s`, `1m30s`); bare
/// integers are read as seconds.
fn deserialize_timeout<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimeout {
        Seconds(u64),
        Text(String),
    }

    match RawTimeout::deserialize(deserializer)? {
        RawTimeout::Seconds(secs) => Ok(Duration::from_secs(secs)),
        RawTimeout::Text(text) if text.trim().is_empty() => Ok(Duration::ZERO),
        RawTimeout::Text(text) => {
            humantime::parse_duration(text.trim()).map_err(serde::de::Error::custom)
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Configuration sources (in order of precedence):
    /// 1. `PORT` environment variable (api.port only)
    /// 2. Environment variables (DIFFERER__SECTION__KEY format)
    /// 3. The YAML file named by `DIFFERER_CONFIG` (`config.*` if unset)
    /// 4. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        let (path, required) = match env::var(CONFIG_PATH_VAR) {
            Ok(path) => (path, true),
            Err(_) => ("config".to_string(), false),
        };

        let loader = ConfigLoader::builder()
            .add_source(File::with_name(&path).required(required))
            .add_source(
                Environment::with_prefix("DIFFERER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config = Self::finish(loader)?;

        if let Ok(port) = env::var("PORT") {
            config.api.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidPort(port.clone()))?;
        }

        Ok(config)
    }

    /// Read a configuration file; the format follows the file extension.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let loader = ConfigLoader::builder().add_source(File::from(path)).build()?;
        Self::finish(loader)
    }

    /// Parse a YAML document into a configuration, applying defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let loader = ConfigLoader::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?;
        Self::finish(loader)
    }

    fn finish(loader: ConfigLoader) -> Result<Self, ConfigError> {
        let mut config: Config = loader.try_deserialize()?;
        if config.timeout.is_zero() {
            config.timeout = DEFAULT_TIMEOUT;
        }
        if let Some(limit) = config.dispatch.max_in_flight {
            if limit == 0 || limit > Semaphore::MAX_PERMITS {
                return Err(ConfigError::InvalidDispatchLimit(limit));
            }
        }
        Ok(config)
    }
}
