//! # Token Manager
//!
//! Per-location authentication tokens. Lookup order: cache, the caller's
//! page context, then fresh reads of the fallback screens.

use crate::error::AttackError;
use crate::extract::ResponseExtractor;
use crate::model::{AuthToken, LocationId};
use crate::transport::{RequestOptions, Target, TransportClient};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// Screens read, in order, when no token is cached or in the page context.
pub const FALLBACK_SCREENS: &[&str] = &["place", "overview", "main"];

/// The page the operator is looking at, supplied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct PageContext {
    pub location_id: LocationId,
    pub world: Option<String>,
    pub locale: Option<String>,
    pub raw_text: String,
}

impl PageContext {
    pub fn new(location_id: LocationId, raw_text: impl Into<String>) -> Self {
        Self {
            location_id,
            world: None,
            locale: None,
            raw_text: raw_text.into(),
        }
    }

    pub fn with_world(mut self, world: &str) -> Self {
        self.world = Some(world.to_string());
        self
    }

    pub fn with_locale(mut self, locale: &str) -> Self {
        self.locale = Some(locale.to_string());
        self
    }
}

/// Unexpired tokens by location. Shared with the token injector.
#[derive(Debug)]
pub struct TokenCache {
    ttl: Duration,
    entries: RwLock<HashMap<LocationId, Arc<AuthToken>>>,
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_TTL)
    }
}

impl TokenCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, location_id: LocationId) -> Option<Arc<AuthToken>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(&location_id)
            .filter(|token| !token.is_expired())
            .cloned()
    }

    /// Stores `value` for `location_id`; malformed tokens are refused.
    pub fn store(&self, location_id: LocationId, value: &str) -> Option<Arc<AuthToken>> {
        let token = Arc::new(AuthToken::new(value, location_id, self.ttl)?);
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(location_id, token.clone());
        Some(token)
    }

    pub fn invalidate(&self, location_id: LocationId) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(&location_id).is_some()
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct TokenManager {
    transport: Arc<TransportClient>,
    extractor: Arc<ResponseExtractor>,
    cache: Arc<TokenCache>,
    page: RwLock<Option<Arc<PageContext>>>,
}

impl TokenManager {
    pub fn new(
        transport: Arc<TransportClient>,
        extractor: Arc<ResponseExtractor>,
        cache: Arc<TokenCache>,
    ) -> Self {
        Self {
            transport,
            extractor,
            cache,
            page: RwLock::new(None),
        }
    }

    pub fn cache(&self) -> &Arc<TokenCache> {
        &self.cache
    }

    pub fn set_page_context(&self, context: PageContext) {
        *self.page.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(context));
    }

    pub fn clear_page_context(&self) {
        *self.page.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn page_context(&self) -> Option<Arc<PageContext>> {
        self.page.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn invalidate(&self, location_id: LocationId) {
        if self.cache.invalidate(location_id) {
            debug!("Token for location {} invalidated", location_id);
        }
    }

    pub async fn get_token(&self, location_id: LocationId) -> Result<String, AttackError> {
        if let Some(token) = self.cache.get(location_id) {
            return Ok(token.value.clone());
        }

        if let Some(context) = self.page_context().filter(|c| c.location_id == location_id) {
            if let Some(token) = self
                .extractor
                .token(&context.raw_text)
                .and_then(|value| self.cache.store(location_id, &value))
            {
                debug!("Token for location {} taken from page context", location_id);
                return Ok(token.value.clone());
            }
        }

        for screen in FALLBACK_SCREENS {
            let target = Target::new(location_id, screen);
            match self.transport.get(&target, &RequestOptions::fresh()).await {
                Ok(body) => {
                    if let Some(token) = self
                        .extractor
                        .token(&body)
                        .and_then(|value| self.cache.store(location_id, &value))
                    {
                        info!("Fetched token for location {} from '{}'", location_id, screen);
                        return Ok(token.value.clone());
                    }
                    debug!("No token on '{}' for location {}", screen, location_id);
                }
                Err(e) if e.is_challenge() => return Err(e.into()),
                Err(e) => warn!("Token fallback '{}' failed: {}", screen, e),
            }
        }

        Err(AttackError::TokenUnavailable { location_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_refuses_malformed_tokens() {
        let cache = TokenCache::default();
        assert!(cache.store(1, "XYZ").is_none());
        assert!(cache.get(1).is_none());
        assert!(cache.store(1, "0123abcd").is_some());
        assert_eq!(cache.get(1).map(|t| t.value.clone()).as_deref(), Some("0123abcd"));
    }

    #[test]
    fn test_tokens_are_per_location() {
        let cache = TokenCache::default();
        cache.store(1, "0123abcd");
        assert!(cache.get(2).is_none());
        assert!(cache.invalidate(1));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_expired_tokens_are_not_returned() {
        let cache = TokenCache::new(Duration::ZERO);
        cache.store(1, "0123abcd");
        assert!(cache.get(1).is_none());
    }
}
