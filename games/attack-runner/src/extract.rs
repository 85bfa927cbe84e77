//! Markup extraction.
//!
//! Server responses have no schema; every logical field is read through an
//! ordered list of [`ExtractionStrategy`] values and the first hit wins.
//! Nothing in here fails on missing markup: absence is `None`, an empty
//! payload, or a zero count.

use crate::error::AttackError;
use crate::model::{AuthToken, ConfirmationPayload, UnitCounts};
use crate::units;
use core_logic::ConfigError;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

pub trait ExtractionStrategy: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;
    fn extract(&self, text: &str) -> Option<String>;
}

/// Returns capture group 1, or the whole match when the pattern has no group.
#[derive(Debug, Clone)]
pub struct RegexStrategy {
    name: String,
    pattern: Regex,
}

impl RegexStrategy {
    pub fn new(name: &str, pattern: &str) -> Result<Self, AttackError> {
        let pattern = Regex::new(pattern).map_err(|e| ConfigError::InvalidValue {
            field: format!("extraction pattern '{}'", name),
            reason: e.to_string(),
        })?;
        Ok(Self {
            name: name.to_string(),
            pattern,
        })
    }
}

impl ExtractionStrategy for RegexStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn extract(&self, text: &str) -> Option<String> {
        let caps = self.pattern.captures(text)?;
        caps.get(1)
            .or_else(|| caps.get(0))
            .map(|m| m.as_str().to_string())
    }
}

/// An ordered, swappable list of strategies for one logical field.
#[derive(Debug, Default)]
pub struct FieldExtractor {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl FieldExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, strategy: impl ExtractionStrategy + 'static) -> Self {
        self.push(strategy);
        self
    }

    pub fn push(&mut self, strategy: impl ExtractionStrategy + 'static) {
        self.strategies.push(Box::new(strategy));
    }

    /// Tried before every existing strategy.
    pub fn prepend(&mut self, strategy: impl ExtractionStrategy + 'static) {
        self.strategies.insert(0, Box::new(strategy));
    }

    pub fn clear(&mut self) {
        self.strategies.clear();
    }

    pub fn names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn extract(&self, text: &str) -> Option<String> {
        self.extract_where(text, |_| true)
    }

    /// First strategy whose result passes `accept`.
    pub fn extract_where(&self, text: &str, accept: impl Fn(&str) -> bool) -> Option<String> {
        self.strategies
            .iter()
            .filter_map(|s| s.extract(text))
            .find(|value| accept(value))
    }
}

const DEFAULT_SUCCESS_PHRASES: &[&str] = &[
    "command has been sent",
    "attack sent",
    "support sent",
    "befehl wurde erteilt",
    "angriff wurde",
    "unterstützung wurde",
    "bevel is gegeven",
    "aanval is verstuurd",
    "rozkaz został wydany",
    "comando enviado",
    "ordine inviato",
];

const DEFAULT_CHALLENGE_MARKERS: &[&str] = &[
    "bot_check",
    "botprotection",
    "bot-protection",
    "hcaptcha",
    "h-captcha",
    "captcha",
];

const DEFAULT_STALE_TOKEN_MARKERS: &[&str] = &[
    "token",
    "csrf",
    "sicherheitsschlüssel",
    "session expired",
    "sitzung abgelaufen",
];

/// Unit count templates; `{unit}` is replaced by the escaped unit name.
const UNIT_COUNT_TEMPLATES: &[(&str, &str)] = &[
    (
        "declared-max",
        r#"(?is)<input\b[^>]*\bname="{unit}"[^>]*\b(?:data-all-count|max)="(\d+)""#,
    ),
    (
        "id-scoped-max",
        r#"(?is)id="units_entry_all_{unit}"[^>]*>\s*\(?\s*(\d+)\s*\)?"#,
    ),
    (
        "trailing-paren",
        r#"(?is)<input\b[^>]*\bname="{unit}"[^>]*>(?:\s|</?(?:a|span|b|strong|td|th)\b[^>]*>)*?\((\d+)\)"#,
    ),
];

pub struct ResponseExtractor {
    token: FieldExtractor,
    error_container: FieldExtractor,
    duration: FieldExtractor,
    unit_counts: HashMap<&'static str, FieldExtractor>,
    success_phrases: Vec<String>,
    challenge_markers: Vec<String>,
    stale_token_markers: Vec<String>,
    confirm_form: Regex,
    input_tag: Regex,
    attribute: Regex,
    markup_tag: Regex,
}

impl fmt::Debug for ResponseExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseExtractor")
            .field("token", &self.token.names())
            .field("error_container", &self.error_container.names())
            .field("duration", &self.duration.names())
            .field("success_phrases", &self.success_phrases.len())
            .field("challenge_markers", &self.challenge_markers)
            .finish()
    }
}

fn compile(pattern: &str) -> Result<Regex, AttackError> {
    Regex::new(pattern).map_err(|e| {
        AttackError::Config(ConfigError::InvalidValue {
            field: "built-in pattern".to_string(),
            reason: e.to_string(),
        })
    })
}

fn lowercase_all(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_lowercase()).collect()
}

impl ResponseExtractor {
    /// Built-in strategies covering the known locales and page versions.
    pub fn standard() -> Result<Self, AttackError> {
        let token = FieldExtractor::new()
            .with(RegexStrategy::new(
                "hidden-field",
                r#"(?is)<input\b[^>]*\bname="h"[^>]*\bvalue="([0-9a-f]+)""#,
            )?)
            .with(RegexStrategy::new(
                "query-param",
                r#"[?&](?:amp;)?h=([0-9a-f]+)\b"#,
            )?)
            .with(RegexStrategy::new(
                "script-csrf-json",
                r#""csrf"\s*:\s*"([0-9a-f]+)""#,
            )?)
            .with(RegexStrategy::new(
                "script-csrf-literal",
                r#"csrf_token\s*=\s*['"]([0-9a-f]+)['"]"#,
            )?);

        let error_container = FieldExtractor::new()
            .with(RegexStrategy::new(
                "error-box",
                r#"(?is)<div[^>]*class="[^"]*\berror_box\b[^"]*"[^>]*>(.*?)</div>"#,
            )?)
            .with(RegexStrategy::new(
                "error-div",
                r#"(?is)<div[^>]*class="[^"]*\berror\b[^"]*"[^>]*>(.*?)</div>"#,
            )?)
            .with(RegexStrategy::new(
                "script-error-message",
                r#"(?is)UI\.ErrorMessage\(\s*['"](.*?)['"]"#,
            )?)
            .with(RegexStrategy::new(
                "json-error",
                r#"(?s)"error"\s*:\s*"((?:[^"\\]|\\.)+)""#,
            )?);

        let duration = FieldExtractor::new()
            .with(RegexStrategy::new(
                "data-duration",
                r#"data-duration="(\d+)""#,
            )?)
            .with(RegexStrategy::new(
                "labelled-cell",
                r#"(?is)(?:duration|dauer|duur|czas trwania|duración|durata)\s*:?\s*</t[dh]>\s*<td[^>]*>\s*(?:<[^>]+>\s*)*(\d+:\d{2}:\d{2})"#,
            )?)
            .with(RegexStrategy::new(
                "inline-label",
                r#"(?i)\b(?:duration|dauer|duur)\b[^0-9<]{0,40}(\d+:\d{2}:\d{2})"#,
            )?);

        let mut unit_counts = HashMap::new();
        for unit in units::unit_names() {
            let mut field = FieldExtractor::new();
            for (name, template) in UNIT_COUNT_TEMPLATES {
                let pattern = template.replace("{unit}", &regex::escape(unit));
                field.push(RegexStrategy::new(name, &pattern)?);
            }
            unit_counts.insert(unit, field);
        }

        Ok(Self {
            token,
            error_container,
            duration,
            unit_counts,
            success_phrases: lowercase_all(DEFAULT_SUCCESS_PHRASES),
            challenge_markers: lowercase_all(DEFAULT_CHALLENGE_MARKERS),
            stale_token_markers: lowercase_all(DEFAULT_STALE_TOKEN_MARKERS),
            confirm_form: compile(r#"(?is)<form\b[^>]*\bid="command-data-form"[^>]*>(.*?)</form>"#)?,
            input_tag: compile(r"(?is)<input\b[^>]*>")?,
            attribute: compile(r#"(?is)\b([a-z][a-z0-9_:-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)?,
            markup_tag: compile(r"(?s)<[^>]*>")?,
        })
    }

    /// Replaces the success phrases; matching is case-insensitive.
    pub fn with_success_phrases(mut self, phrases: &[String]) -> Self {
        if !phrases.is_empty() {
            self.success_phrases = phrases.iter().map(|p| p.to_lowercase()).collect();
        }
        self
    }

    pub fn with_challenge_markers(mut self, markers: &[String]) -> Self {
        if !markers.is_empty() {
            self.challenge_markers = markers.iter().map(|m| m.to_lowercase()).collect();
        }
        self
    }

    pub fn with_stale_token_markers(mut self, markers: &[String]) -> Self {
        if !markers.is_empty() {
            self.stale_token_markers = markers.iter().map(|m| m.to_lowercase()).collect();
        }
        self
    }

    pub fn token_strategies_mut(&mut self) -> &mut FieldExtractor {
        &mut self.token
    }

    pub fn error_strategies_mut(&mut self) -> &mut FieldExtractor {
        &mut self.error_container
    }

    pub fn duration_strategies_mut(&mut self) -> &mut FieldExtractor {
        &mut self.duration
    }

    pub fn challenge_markers(&self) -> &[String] {
        &self.challenge_markers
    }

    /// A well-formed token, skipping matches that fail the format check.
    pub fn token(&self, text: &str) -> Option<String> {
        self.token.extract_where(text, AuthToken::is_valid_format)
    }

    /// The error container's text with markup stripped, if non-empty.
    pub fn error_message(&self, text: &str) -> Option<String> {
        self.error_container
            .extract_where(text, |raw| !self.strip_markup(raw).is_empty())
            .map(|raw| self.strip_markup(&raw))
    }

    /// All hidden inputs of the confirmation form, in document order.
    /// Falls back to the whole document when the form id is absent.
    pub fn hidden_fields(&self, text: &str) -> ConfirmationPayload {
        let scope = self
            .confirm_form
            .captures(text)
            .and_then(|c| c.get(1))
            .map_or(text, |m| m.as_str());

        let fields = self
            .input_tag
            .find_iter(scope)
            .filter_map(|tag| {
                let attrs = self.attributes(tag.as_str());
                let is_hidden = attrs
                    .get("type")
                    .is_some_and(|t| t.eq_ignore_ascii_case("hidden"));
                if !is_hidden {
                    return None;
                }
                let name = attrs.get("name")?.clone();
                let value = attrs.get("value").cloned().unwrap_or_default();
                Some((name, value))
            })
            .collect();

        ConfirmationPayload::new(fields)
    }

    pub fn duration(&self, text: &str) -> Option<Duration> {
        self.duration
            .extract_where(text, |raw| parse_duration(raw).is_some())
            .and_then(|raw| parse_duration(&raw))
    }

    pub fn is_success(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.success_phrases.iter().any(|p| lowered.contains(p))
    }

    pub fn challenge_marker(&self, text: &str) -> Option<&str> {
        let lowered = text.to_lowercase();
        self.challenge_markers
            .iter()
            .find(|m| lowered.contains(m.as_str()))
            .map(String::as_str)
    }

    pub fn is_stale_token_rejection(&self, reason: &str) -> bool {
        let lowered = reason.to_lowercase();
        self.stale_token_markers
            .iter()
            .any(|m| lowered.contains(m.as_str()))
    }

    /// Counts for every catalog unit; units without a match are 0.
    pub fn unit_counts(&self, text: &str) -> UnitCounts {
        units::unit_names()
            .map(|unit| {
                let count = self
                    .unit_counts
                    .get(unit)
                    .and_then(|field| field.extract_where(text, |raw| raw.parse::<u32>().is_ok()))
                    .and_then(|raw| raw.parse::<u32>().ok())
                    .unwrap_or(0);
                (unit.to_string(), count)
            })
            .collect()
    }

    pub fn strip_markup(&self, html: &str) -> String {
        let without_tags = self.markup_tag.replace_all(html, " ");
        decode_entities(&without_tags)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn attributes(&self, tag: &str) -> HashMap<String, String> {
        self.attribute
            .captures_iter(tag)
            .filter_map(|c| {
                let key = c.get(1)?.as_str().to_ascii_lowercase();
                let value = c.get(2).or_else(|| c.get(3))?.as_str();
                Some((key, decode_entities(value)))
            })
            .collect()
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#039;", "'")
        .replace("&amp;", "&")
}

/// Accepts `H:MM:SS` or a plain number of seconds.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let mut parts = raw.split(':');
    let hours = parts.next()?.parse::<u64>().ok()?;
    let minutes = parts.next()?.parse::<u64>().ok()?;
    let seconds = parts.next()?.parse::<u64>().ok()?;
    if parts.next().is_some() || minutes >= 60 || seconds >= 60 {
        return None;
    }
    Some(Duration::from_secs(hours * 3600 + minutes * 60 + seconds))
}
