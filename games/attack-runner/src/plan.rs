//! Attack plans: a TOML file with one `[[attack]]` table per command.
//!
//! ```toml
//! [[attack]]
//! origin = 12345
//! origin_coords = "480|480"
//! target = "500|500"
//! command = "attack"
//! troops = { light = 50, spy = 1 }
//! ```

use crate::model::AttackRequest;
use core_logic::{load_toml, ConfigError};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttackPlan {
    #[serde(rename = "attack", default)]
    pub attacks: Vec<AttackRequest>,
}

impl AttackPlan {
    pub fn from_path(path: &str) -> Result<Self, ConfigError> {
        load_toml(path)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: "<inline>".to_string(),
            msg: e.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.attacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attacks.is_empty()
    }

    pub fn into_requests(self) -> Vec<AttackRequest> {
        self.attacks
    }
}
