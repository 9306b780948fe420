//! Configuration for the URL runner.

use config::{Config as ConfigLoader, ConfigError, Environment};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
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

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// `PORT` wins over `URL_RUNNER__API__PORT`, matching how container
    /// platforms hand out ports.
    pub fn load() -> Result<Self, ConfigError> {
        ConfigLoader::builder()
            .set_default("api.host", default_host())?
            .set_default("api.port", default_port() as i64)?
            .add_source(
                Environment::with_prefix("URL_RUNNER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("api.port", std::env::var("PORT").ok())?
            .build()?
            .try_deserialize()
    }
}
