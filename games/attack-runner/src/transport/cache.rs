use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::trace;

#[derive(Debug, Clone)]
struct CachedResponse {
    body: String,
    expires_at: Instant,
}

/// Read-response cache keyed by the full request URL.
///
/// A zero TTL disables caching entirely.
#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CachedResponse>>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, url: &str) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(url)
            .filter(|cached| Instant::now() < cached.expires_at)
            .map(|cached| cached.body.clone())
    }

    pub fn insert(&self, url: &str, body: &str) {
        if self.ttl.is_zero() {
            return;
        }
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        drop_expired(&mut entries, now);
        entries.insert(
            url.to_string(),
            CachedResponse {
                body: body.to_string(),
                expires_at: now + self.ttl,
            },
        );
    }

    pub fn invalidate(&self, url: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(url).is_some()
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }

    /// Drops expired entries and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        drop_expired(&mut entries, Instant::now())
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn drop_expired(entries: &mut HashMap<String, CachedResponse>, now: Instant) -> usize {
    let before = entries.len();
    entries.retain(|_, cached| now < cached.expires_at);
    let removed = before - entries.len();
    if removed > 0 {
        trace!("Purged {} expired responses", removed);
    }
    removed
}
