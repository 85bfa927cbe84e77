//! Configuration loader for attack-runner

use crate::inventory::DEFAULT_INVENTORY_TTL;
use crate::model::{LocationId, WorldBounds};
use crate::queue::QueueOptions;
use crate::token::{PageContext, DEFAULT_TOKEN_TTL};
use crate::units::TravelCalculator;
use core_logic::{load_toml, ConfigError, HttpConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

/// Overrides `session.cookie` when set.
pub const COOKIE_ENV: &str = "ATTACK_RUNNER_COOKIE";

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    pub http: HttpConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub locale: LocaleConfig,
    /// Check requested troops against the inventory before preparing
    #[serde(default = "default_true")]
    pub verify_inventory: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Raw `Cookie` header of a logged-in browser session
    pub cookie: Option<String>,
    /// Saved page markup used as the initial page context
    pub page_file: Option<String>,
    /// Location the saved page belongs to
    pub location_id: Option<LocationId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldConfig {
    #[serde(default)]
    pub bounds: WorldBounds,
    #[serde(default = "default_speed")]
    pub speed: f64,
    #[serde(default = "default_speed")]
    pub unit_speed: f64,
}

fn default_speed() -> f64 {
    1.0
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            bounds: WorldBounds::default(),
            speed: default_speed(),
            unit_speed: default_speed(),
        }
    }
}

impl WorldConfig {
    pub fn travel(&self) -> TravelCalculator {
        TravelCalculator::new(self.speed, self.unit_speed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
    #[serde(default = "default_inventory_ttl_secs")]
    pub inventory_ttl_secs: u64,
}

fn default_token_ttl_secs() -> u64 {
    DEFAULT_TOKEN_TTL.as_secs()
}

fn default_inventory_ttl_secs() -> u64 {
    DEFAULT_INVENTORY_TTL.as_secs()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            token_ttl_secs: default_token_ttl_secs(),
            inventory_ttl_secs: default_inventory_ttl_secs(),
        }
    }
}

impl CacheConfig {
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    pub fn inventory_ttl(&self) -> Duration {
        Duration::from_secs(self.inventory_ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub stop_on_error: bool,
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_jitter_ms() -> u64 {
    500
}

fn default_max_attempts() -> u32 {
    3
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            jitter_ms: default_jitter_ms(),
            max_attempts: default_max_attempts(),
            stop_on_error: false,
        }
    }
}

impl QueueConfig {
    pub fn options(&self) -> QueueOptions {
        QueueOptions {
            base_delay: Duration::from_millis(self.base_delay_ms),
            jitter: Duration::from_millis(self.jitter_ms),
            max_attempts: self.max_attempts,
            stop_on_error: self.stop_on_error,
        }
    }
}

/// Empty lists keep the built-in phrases.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocaleConfig {
    #[serde(default)]
    pub success_phrases: Vec<String>,
    #[serde(default)]
    pub challenge_markers: Vec<String>,
    #[serde(default)]
    pub stale_token_markers: Vec<String>,
}

impl RunnerConfig {
    /// Load, apply environment overrides and validate.
    pub fn from_path(path: &str) -> Result<Self, ConfigError> {
        let mut config: RunnerConfig = load_toml(path)?;
        if let Ok(cookie) = std::env::var(COOKIE_ENV) {
            if !cookie.trim().is_empty() {
                config.session.cookie = Some(cookie);
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.http.validate()?;

        let bounds = &self.world.bounds;
        if bounds.min_x > bounds.max_x || bounds.min_y > bounds.max_y {
            return Err(ConfigError::InvalidValue {
                field: "world.bounds".to_string(),
                reason: "minimum exceeds maximum".to_string(),
            });
        }
        if self.world.speed <= 0.0 || self.world.unit_speed <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "world.speed".to_string(),
                reason: "speeds must be positive".to_string(),
            });
        }
        if self.queue.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "queue.max_attempts".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.cache.token_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.token_ttl_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.session.page_file.is_some() && self.session.location_id.is_none() {
            return Err(ConfigError::MissingField {
                field: "session.location_id".to_string(),
            });
        }
        Ok(())
    }

    /// Reads `session.page_file` into a [`PageContext`], if configured.
    pub fn page_context(&self) -> Result<Option<PageContext>, ConfigError> {
        let (Some(path), Some(location_id)) = (&self.session.page_file, self.session.location_id) else {
            return Ok(None);
        };
        let raw = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.clone(),
            msg: e.to_string(),
        })?;
        Ok(Some(PageContext::new(location_id, raw)))
    }
}
