use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: String,
    pub uptime_secs: u64,
    pub attacks: AttackMetrics,
    pub http: HttpMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttackMetrics {
    pub total: u64,
    pub sent: u64,
    pub failed: u64,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HttpMetrics {
    pub requests: u64,
    pub retries: u64,
    pub cache_hits: u64,
    pub avg_latency_ms: f64,
    pub min_latency_ms: u64,
    pub max_latency_ms: u64,
}

/// Lock-free counters, shared through an `Arc`.
#[derive(Debug)]
pub struct MetricsCollector {
    attacks_total: AtomicU64,
    attacks_sent: AtomicU64,
    attacks_failed: AtomicU64,
    requests: AtomicU64,
    retries: AtomicU64,
    cache_hits: AtomicU64,
    latency_sum_ms: AtomicU64,
    min_latency_ms: AtomicU64,
    max_latency_ms: AtomicU64,
    start_time: Instant,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self {
            attacks_total: AtomicU64::new(0),
            attacks_sent: AtomicU64::new(0),
            attacks_failed: AtomicU64::new(0),
            requests: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            latency_sum_ms: AtomicU64::new(0),
            min_latency_ms: AtomicU64::new(u64::MAX),
            max_latency_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attack(&self, success: bool) {
        self.attacks_total.fetch_add(1, Ordering::SeqCst);
        if success {
            self.attacks_sent.fetch_add(1, Ordering::SeqCst);
        } else {
            self.attacks_failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn record_request(&self, latency: Duration) {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let latency_ms = latency.as_millis() as u64;
        self.latency_sum_ms.fetch_add(latency_ms, Ordering::SeqCst);
        self.min_latency_ms.fetch_min(latency_ms, Ordering::SeqCst);
        self.max_latency_ms.fetch_max(latency_ms, Ordering::SeqCst);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total = self.attacks_total.load(Ordering::SeqCst);
        let sent = self.attacks_sent.load(Ordering::SeqCst);
        let requests = self.requests.load(Ordering::SeqCst);
        let latency_sum = self.latency_sum_ms.load(Ordering::SeqCst);
        let min_latency = self.min_latency_ms.load(Ordering::SeqCst);

        MetricsSnapshot {
            timestamp: Utc::now().to_rfc3339(),
            uptime_secs: self.uptime().as_secs(),
            attacks: AttackMetrics {
                total,
                sent,
                failed: self.attacks_failed.load(Ordering::SeqCst),
                success_rate: if total > 0 {
                    sent as f64 / total as f64 * 100.0
                } else {
                    0.0
                },
            },
            http: HttpMetrics {
                requests,
                retries: self.retries.load(Ordering::SeqCst),
                cache_hits: self.cache_hits.load(Ordering::SeqCst),
                avg_latency_ms: if requests > 0 {
                    latency_sum as f64 / requests as f64
                } else {
                    0.0
                },
                min_latency_ms: if min_latency == u64::MAX { 0 } else { min_latency },
                max_latency_ms: self.max_latency_ms.load(Ordering::SeqCst),
            },
        }
    }

    pub fn to_json(&self) -> String {
        let snapshot = self.snapshot();
        serde_json::to_string_pretty(&snapshot).unwrap_or_else(|_| "{}".to_string())
    }

    pub async fn export_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = self.to_json();
        tokio::fs::write(path, json).await
    }

    pub fn attacks_total(&self) -> u64 {
        self.attacks_total.load(Ordering::SeqCst)
    }

    pub fn attacks_sent(&self) -> u64 {
        self.attacks_sent.load(Ordering::SeqCst)
    }

    pub fn attacks_failed(&self) -> u64 {
        self.attacks_failed.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::SeqCst)
    }

    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::SeqCst)
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_attack_counters() {
        let metrics = MetricsCollector::default();

        metrics.record_attack(true);
        metrics.record_attack(true);
        metrics.record_attack(false);

        assert_eq!(metrics.attacks_total(), 3);
        assert_eq!(metrics.attacks_sent(), 2);
        assert_eq!(metrics.attacks_failed(), 1);

        let snapshot = metrics.snapshot();
        assert!((snapshot.attacks.success_rate - 66.67).abs() < 0.1);
    }

    #[tokio::test]
    async fn test_latency_bounds() {
        let metrics = MetricsCollector::default();
        assert_eq!(metrics.snapshot().http.min_latency_ms, 0);

        metrics.record_request(Duration::from_millis(120));
        metrics.record_request(Duration::from_millis(80));

        let http = metrics.snapshot().http;
        assert_eq!(http.requests, 2);
        assert_eq!(http.min_latency_ms, 80);
        assert_eq!(http.max_latency_ms, 120);
        assert!((http.avg_latency_ms - 100.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_json_export() {
        let metrics = MetricsCollector::default();
        metrics.record_cache_hit();

        let json = metrics.to_json();
        assert!(json.contains("attacks"));
        assert!(json.contains("\"cache_hits\": 1"));
    }
}
