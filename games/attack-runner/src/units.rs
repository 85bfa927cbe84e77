//! Unit catalog and the canonical speed table.
//!
//! Speeds are base minutes per field: a higher value means a slower unit.
//! This is the only speed table in the crate; travel estimates and the
//! slowest-unit rule both read from it.

use crate::model::{Coordinates, TroopMap};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitSpec {
    pub name: &'static str,
    pub minutes_per_field: f64,
}

pub const UNIT_CATALOG: &[UnitSpec] = &[
    UnitSpec { name: "spear", minutes_per_field: 18.0 },
    UnitSpec { name: "sword", minutes_per_field: 22.0 },
    UnitSpec { name: "axe", minutes_per_field: 18.0 },
    UnitSpec { name: "archer", minutes_per_field: 18.0 },
    UnitSpec { name: "spy", minutes_per_field: 9.0 },
    UnitSpec { name: "light", minutes_per_field: 10.0 },
    UnitSpec { name: "marcher", minutes_per_field: 10.0 },
    UnitSpec { name: "heavy", minutes_per_field: 11.0 },
    UnitSpec { name: "ram", minutes_per_field: 30.0 },
    UnitSpec { name: "catapult", minutes_per_field: 30.0 },
    UnitSpec { name: "knight", minutes_per_field: 10.0 },
    UnitSpec { name: "snob", minutes_per_field: 35.0 },
];

pub fn unit_names() -> impl Iterator<Item = &'static str> {
    UNIT_CATALOG.iter().map(|u| u.name)
}

pub fn lookup(name: &str) -> Option<&'static UnitSpec> {
    UNIT_CATALOG.iter().find(|u| u.name == name)
}

pub fn is_known_unit(name: &str) -> bool {
    lookup(name).is_some()
}

/// The slowest unit with a positive count. Equal speeds resolve to the
/// unit listed first in [`UNIT_CATALOG`].
pub fn slowest_unit(troops: &TroopMap) -> Option<&'static UnitSpec> {
    UNIT_CATALOG
        .iter()
        .filter(|u| troops.get(u.name).is_some_and(|&n| n > 0))
        .fold(None, |slowest: Option<&'static UnitSpec>, unit| match slowest {
            Some(current) if current.minutes_per_field >= unit.minutes_per_field => Some(current),
            _ => Some(unit),
        })
}

/// World and unit speed multipliers applied on top of the base table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TravelCalculator {
    pub world_speed: f64,
    pub unit_speed: f64,
}

impl Default for TravelCalculator {
    fn default() -> Self {
        Self {
            world_speed: 1.0,
            unit_speed: 1.0,
        }
    }
}

impl TravelCalculator {
    pub fn new(world_speed: f64, unit_speed: f64) -> Self {
        Self {
            world_speed,
            unit_speed,
        }
    }

    /// Travel time over `distance` fields at the pace of the slowest unit.
    pub fn travel_time(&self, distance: f64, troops: &TroopMap) -> Option<Duration> {
        let unit = slowest_unit(troops)?;
        let factor = self.world_speed * self.unit_speed;
        if factor <= 0.0 {
            return None;
        }
        let seconds = (distance * unit.minutes_per_field * 60.0 / factor).round();
        Some(Duration::from_secs(seconds as u64))
    }

    pub fn travel_between(
        &self,
        from: &Coordinates,
        to: &Coordinates,
        troops: &TroopMap,
    ) -> Option<Duration> {
        self.travel_time(from.distance_to(to), troops)
    }
}

/// `H:MM:SS`, hours unbounded.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
