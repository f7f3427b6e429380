use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::repositories::DEFAULT_CART_KEY;

const ENV_PREFIX: &str = "ROCKETSHOES";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {message}")]
    LoadError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub catalog: CatalogConfig,
    pub storage: StorageConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Where the stock/product API lives
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_catalog_timeout")]
    pub catalog_timeout_seconds: u64,
}

/// Where the cart is persisted
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,
    #[serde(default = "default_cart_key")]
    pub cart_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_service_version")]
    pub service_version: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub enable_json_logging: bool,
}

impl Config {
    /// Load configuration from `ROCKETSHOES_*` environment variables
    pub fn from_environment() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load configuration from an explicit variable map instead of the process environment.
    ///
    /// Keys carry the `ROCKETSHOES_` prefix, exactly as they would in the environment.
    pub fn from_map(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::load(Some(vars))
    }

    fn load(source: Option<HashMap<String, String>>) -> Result<Self, ConfigError> {
        info!("Loading configuration");

        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix(ENV_PREFIX).source(source))
            .build()
            .map_err(|e| ConfigError::LoadError {
                message: format!("Failed to load config: {}", e),
            })?;

        let config = Config {
            server: deserialize_section(&settings, "server")?,
            catalog: deserialize_section(&settings, "catalog")?,
            storage: deserialize_section(&settings, "storage")?,
            observability: deserialize_section(&settings, "observability")?,
        };

        config.validate()?;

        debug!("Configuration: {:?}", config);
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError {
                message: "Server port cannot be 0".to_string(),
            });
        }

        let base_url = self.catalog.api_base_url.trim();
        if base_url.is_empty() {
            return Err(ConfigError::ValidationError {
                message: "Catalog API base URL cannot be empty".to_string(),
            });
        }

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::ValidationError {
                message: format!("Catalog API base URL must be http(s): {}", base_url),
            });
        }

        if self.catalog.catalog_timeout_seconds == 0 {
            return Err(ConfigError::ValidationError {
                message: "Catalog timeout cannot be 0".to_string(),
            });
        }

        if self.storage.storage_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError {
                message: "Storage path cannot be empty".to_string(),
            });
        }

        if self.storage.cart_key.is_empty() {
            return Err(ConfigError::ValidationError {
                message: "Cart key cannot be empty".to_string(),
            });
        }

        Ok(())
    }
}

fn deserialize_section<T: serde::de::DeserializeOwned>(
    settings: &config::Config,
    section: &str,
) -> Result<T, ConfigError> {
    settings
        .clone()
        .try_deserialize()
        .map_err(|e| ConfigError::LoadError {
            message: format!("Failed to deserialize {} config: {}", section, e),
        })
}

impl CatalogConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.catalog_timeout_seconds)
    }
}

// Default value functions
pub(crate) fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub(crate) fn default_port() -> u16 {
    8080
}

pub(crate) fn default_api_base_url() -> String {
    "http://localhost:3333".to_string()
}

pub(crate) fn default_catalog_timeout() -> u64 {
    10
}

pub(crate) fn default_storage_path() -> PathBuf {
    PathBuf::from("rocketshoes-storage.json")
}

pub(crate) fn default_cart_key() -> String {
    DEFAULT_CART_KEY.to_string()
}

pub(crate) fn default_service_name() -> String {
    "rocketshoes-cart".to_string()
}

pub(crate) fn default_service_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

pub(crate) fn default_log_level() -> String {
    "info".to_string()
}
