//! Data types that flow through the pipeline.

use crate::error::{AttackError, FailureKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

pub type LocationId = u64;

/// Requested troops. Signed so that negative input reaches validation
/// instead of failing at parse time.
pub type TroopMap = BTreeMap<String, i64>;

/// Units actually present at a location.
pub type UnitCounts = BTreeMap<String, u32>;

/// Body field carrying the authentication token.
pub const TOKEN_FIELD: &str = "h";

/// Minimum token length in hex characters.
pub const MIN_TOKEN_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Coordinates {
    pub x: i32,
    pub y: i32,
}

impl Coordinates {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Coordinates) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        (dx * dx + dy * dy).sqrt()
    }
}

impl FromStr for Coordinates {
    type Err = AttackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AttackError::validation(format!("invalid coordinates '{}': expected x|y", s));
        let (x, y) = s.trim().split_once('|').ok_or_else(invalid)?;
        let x = x.trim().parse::<i32>().map_err(|_| invalid())?;
        let y = y.trim().parse::<i32>().map_err(|_| invalid())?;
        Ok(Self { x, y })
    }
}

impl TryFrom<String> for Coordinates {
    type Error = AttackError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Coordinates> for String {
    fn from(c: Coordinates) -> Self {
        c.to_string()
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.x, self.y)
    }
}

/// Inclusive map limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldBounds {
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self {
            min_x: 0,
            max_x: 999,
            min_y: 0,
            max_y: 999,
        }
    }
}

impl WorldBounds {
    pub fn contains(&self, c: &Coordinates) -> bool {
        (self.min_x..=self.max_x).contains(&c.x) && (self.min_y..=self.max_y).contains(&c.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    Attack,
    Support,
    Scout,
}

impl CommandType {
    /// Form field that tells the server which button was pressed.
    /// Scouting is an attack the server tells apart by its composition.
    pub fn form_marker(&self) -> &'static str {
        match self {
            CommandType::Attack | CommandType::Scout => "attack",
            CommandType::Support => "support",
        }
    }
}

impl FromStr for CommandType {
    type Err = AttackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "attack" => Ok(CommandType::Attack),
            "support" => Ok(CommandType::Support),
            "scout" => Ok(CommandType::Scout),
            other => Err(AttackError::validation(format!(
                "unknown command type '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandType::Attack => write!(f, "attack"),
            CommandType::Support => write!(f, "support"),
            CommandType::Scout => write!(f, "scout"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackRequest {
    pub origin: LocationId,
    /// Only needed for local travel-time estimates
    #[serde(default)]
    pub origin_coords: Option<Coordinates>,
    pub target: Coordinates,
    pub troops: TroopMap,
    pub command: CommandType,
}

impl AttackRequest {
    pub fn new(origin: LocationId, target: Coordinates, troops: TroopMap, command: CommandType) -> Self {
        Self {
            origin,
            origin_coords: None,
            target,
            troops,
            command,
        }
    }

    pub fn with_origin_coords(mut self, coords: Coordinates) -> Self {
        self.origin_coords = Some(coords);
        self
    }

    pub fn distance(&self) -> Option<f64> {
        self.origin_coords.map(|from| from.distance_to(&self.target))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthToken {
    pub value: String,
    pub location_id: LocationId,
    pub created_at: Instant,
    pub expires_at: Instant,
}

impl AuthToken {
    /// Returns `None` when `value` is not a well-formed token.
    pub fn new(value: &str, location_id: LocationId, ttl: Duration) -> Option<Self> {
        if !Self::is_valid_format(value) {
            return None;
        }
        let now = Instant::now();
        Some(Self {
            value: value.to_string(),
            location_id,
            created_at: now,
            expires_at: now + ttl,
        })
    }

    pub fn is_valid_format(value: &str) -> bool {
        value.len() >= MIN_TOKEN_LEN && value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InventoryEntry {
    pub location_id: LocationId,
    pub units: UnitCounts,
    pub fetched_at: Instant,
    pub expires_at: Instant,
}

impl InventoryEntry {
    pub fn new(location_id: LocationId, units: UnitCounts, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            location_id,
            units,
            fetched_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Hidden form fields issued by the server between prepare and confirm.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfirmationPayload {
    fields: Vec<(String, String)>,
}

impl ConfirmationPayload {
    pub fn new(fields: Vec<(String, String)>) -> Self {
        Self { fields }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// The payload in its original order with the token field replaced,
    /// or appended when the server did not include one.
    pub fn with_token(&self, token: &str) -> Vec<(String, String)> {
        let mut replaced = false;
        let mut body: Vec<(String, String)> = self
            .fields
            .iter()
            .map(|(k, v)| {
                if k == TOKEN_FIELD {
                    replaced = true;
                    (k.clone(), token.to_string())
                } else {
                    (k.clone(), v.clone())
                }
            })
            .collect();
        if !replaced {
            body.push((TOKEN_FIELD.to_string(), token.to_string()));
        }
        body
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackResult {
    pub success: bool,
    pub origin: LocationId,
    pub target: Coordinates,
    pub command: CommandType,
    pub duration_secs: Option<u64>,
    pub arrival: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub error_kind: Option<FailureKind>,
    pub attempt: u32,
    pub timestamp: DateTime<Utc>,
}

impl AttackResult {
    pub fn success(request: &AttackRequest, duration: Option<Duration>) -> Self {
        let timestamp = Utc::now();
        let arrival = duration
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .map(|d| timestamp + d);
        Self {
            success: true,
            origin: request.origin,
            target: request.target,
            command: request.command,
            duration_secs: duration.map(|d| d.as_secs()),
            arrival,
            error: None,
            error_kind: None,
            attempt: 1,
            timestamp,
        }
    }

    pub fn failure(request: &AttackRequest, error: &AttackError) -> Self {
        Self {
            success: false,
            origin: request.origin,
            target: request.target,
            command: request.command,
            duration_secs: None,
            arrival: None,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
            attempt: 1,
            timestamp: Utc::now(),
        }
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }
}

#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub id: u64,
    pub request: AttackRequest,
    pub attempts: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl QueueEntry {
    pub fn new(id: u64, request: AttackRequest) -> Self {
        Self {
            id,
            request,
            attempts: 0,
            enqueued_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates_parse_and_display() {
        let c: Coordinates = " 480|512 ".parse().unwrap();
        assert_eq!(c, Coordinates::new(480, 512));
        assert_eq!(c.to_string(), "480|512");

        assert!("480-512".parse::<Coordinates>().is_err());
        assert!("480|".parse::<Coordinates>().is_err());
        assert!("a|b".parse::<Coordinates>().is_err());
    }

    #[test]
    fn test_distance() {
        let from = Coordinates::new(480, 480);
        let to = Coordinates::new(500, 500);
        assert!((from.distance_to(&to) - 28.2843).abs() < 1e-3);
    }

    #[test]
    fn test_distance_across_full_i32_range() {
        let from = Coordinates::new(i32::MIN, 0);
        let to = Coordinates::new(i32::MAX, 0);
        assert!((from.distance_to(&to) - 4294967295.0).abs() < 1.0);
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let bounds = WorldBounds::default();
        assert!(bounds.contains(&Coordinates::new(0, 999)));
        assert!(!bounds.contains(&Coordinates::new(1000, 5)));
        assert!(!bounds.contains(&Coordinates::new(5, -1)));
    }

    #[test]
    fn test_token_format() {
        assert!(AuthToken::is_valid_format("a1b2c3d4"));
        assert!(!AuthToken::is_valid_format("a1b2c3"));
        assert!(!AuthToken::is_valid_format("A1B2C3D4"));
        assert!(!AuthToken::is_valid_format("zzzzzzzz"));
        assert!(AuthToken::new("nothex!!", 1, Duration::from_secs(60)).is_none());
    }

    #[test]
    fn test_payload_replaces_token_in_place() {
        let payload = ConfirmationPayload::new(vec![
            ("ch".to_string(), "abc".to_string()),
            ("h".to_string(), "oldtoken".to_string()),
            ("x".to_string(), "500".to_string()),
        ]);
        let body = payload.with_token("newtoken");
        assert_eq!(body[1], ("h".to_string(), "newtoken".to_string()));
        assert_eq!(body.len(), 3);
        assert_eq!(payload.get("h"), Some("oldtoken"));
    }

    #[test]
    fn test_payload_appends_missing_token() {
        let payload = ConfirmationPayload::new(vec![("ch".to_string(), "abc".to_string())]);
        let body = payload.with_token("cafe1234");
        assert_eq!(body.last(), Some(&("h".to_string(), "cafe1234".to_string())));
    }

    #[test]
    fn test_command_type_parse() {
        assert_eq!("Support".parse::<CommandType>().unwrap(), CommandType::Support);
        assert_eq!(CommandType::Scout.form_marker(), "attack");
        assert!("raid".parse::<CommandType>().is_err());
    }
}
