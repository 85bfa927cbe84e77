//! # Inventory Cache
//!
//! Units available per origin location, read from the unit placement
//! screen and cached for a short TTL.

use crate::error::AttackError;
use crate::extract::ResponseExtractor;
use crate::model::{InventoryEntry, LocationId, TroopMap, UnitCounts};
use crate::transport::{RequestOptions, Target, TransportClient};
use crate::units;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_INVENTORY_TTL: Duration = Duration::from_secs(2 * 60);

/// Screen the inventory is read from.
const INVENTORY_SCREEN: &str = "place";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    pub fn into_result(self) -> Result<(), AttackError> {
        if self.valid {
            Ok(())
        } else {
            Err(AttackError::Validation(self.errors))
        }
    }
}

fn composition_errors(requested: &TroopMap) -> Vec<String> {
    let mut errors = Vec::new();
    for (unit, &count) in requested {
        if !units::is_known_unit(unit) {
            errors.push(format!("unknown unit '{}'", unit));
        }
        if count < 0 {
            errors.push(format!("negative count for '{}': {}", unit, count));
        }
    }
    if !requested.values().any(|&count| count > 0) {
        errors.push("no troops selected".to_string());
    }
    errors
}

/// Unknown units, negative counts and an empty selection.
pub fn validate_composition(requested: &TroopMap) -> ValidationReport {
    ValidationReport::from_errors(composition_errors(requested))
}

/// Everything [`validate_composition`] checks, plus availability.
pub fn validate(requested: &TroopMap, available: &UnitCounts) -> ValidationReport {
    let mut errors = composition_errors(requested);
    for (unit, &count) in requested {
        if !units::is_known_unit(unit) || count <= 0 {
            continue;
        }
        let have = available.get(unit).copied().unwrap_or(0);
        if count > i64::from(have) {
            errors.push(format!(
                "not enough '{}': requested {}, available {}",
                unit, count, have
            ));
        }
    }
    ValidationReport::from_errors(errors)
}

pub struct InventoryCache {
    transport: Arc<TransportClient>,
    extractor: Arc<ResponseExtractor>,
    ttl: Duration,
    entries: RwLock<HashMap<LocationId, Arc<InventoryEntry>>>,
}

impl InventoryCache {
    pub fn new(transport: Arc<TransportClient>, extractor: Arc<ResponseExtractor>, ttl: Duration) -> Self {
        Self {
            transport,
            extractor,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The cached entry, if present and unexpired.
    pub fn cached(&self, location_id: LocationId) -> Option<Arc<InventoryEntry>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(&location_id)
            .filter(|entry| !entry.is_expired())
            .cloned()
    }

    pub async fn get_available(&self, location_id: LocationId) -> Result<UnitCounts, AttackError> {
        if let Some(entry) = self.cached(location_id) {
            return Ok(entry.units.clone());
        }
        self.fetch(location_id).await
    }

    pub async fn refresh(&self, location_id: LocationId) -> Result<UnitCounts, AttackError> {
        self.invalidate(location_id);
        self.fetch(location_id).await
    }

    pub fn invalidate(&self, location_id: LocationId) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(&location_id).is_some()
    }

    async fn fetch(&self, location_id: LocationId) -> Result<UnitCounts, AttackError> {
        let body = self
            .transport
            .get(&Target::new(location_id, INVENTORY_SCREEN), &RequestOptions::fresh())
            .await?;

        let units = self.extractor.unit_counts(&body);
        debug!(
            "Inventory for location {}: {} unit types present",
            location_id,
            units.values().filter(|&&n| n > 0).count()
        );

        let entry = Arc::new(InventoryEntry::new(location_id, units, self.ttl));
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(location_id, entry.clone());
        Ok(entry.units.clone())
    }
}
