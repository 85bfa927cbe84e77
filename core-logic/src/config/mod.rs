use crate::error::ConfigError;
use crate::utils::retry::RetryConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Transport settings shared by every HTTP-speaking crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// World root, e.g. `https://de200.die-staemme.de`
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Per-call timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Backoff is `backoff_base_ms * 2^attempt`, capped at `max_backoff_ms`
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default)]
    pub jitter: bool,
    /// Minimum gap between two outgoing requests
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
    /// TTL for cached read responses
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_min_interval_ms() -> u64 {
    500
}

fn default_cache_ttl_ms() -> u64 {
    60_000
}

impl HttpConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            jitter: false,
            min_interval_ms: default_min_interval_ms(),
            cache_ttl_ms: default_cache_ttl_ms(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new(self.max_retries, self.backoff_base_ms)
            .with_max_delay(self.max_backoff_ms)
            .with_jitter(self.jitter)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err(ConfigError::MissingField {
                field: "http.base_url".to_string(),
            });
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl {
                url: self.base_url.clone(),
            });
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "http.timeout_ms".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_backoff_ms < self.backoff_base_ms {
            return Err(ConfigError::InvalidValue {
                field: "http.max_backoff_ms".to_string(),
                reason: format!(
                    "{} is below backoff_base_ms ({})",
                    self.max_backoff_ms, self.backoff_base_ms
                ),
            });
        }
        Ok(())
    }
}

/// Reads and deserializes a TOML file.
pub fn load_toml<T: DeserializeOwned>(path: &str) -> Result<T, ConfigError> {
    if !Path::new(path).exists() {
        return Err(ConfigError::FileNotFound {
            path: path.to_string(),
        });
    }
    let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_string(),
        msg: e.to_string(),
    })?;
    toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.to_string(),
        msg: e.to_string(),
    })
}
