//! # Core Logic - Request Spacing
//!
//! A single FIFO gate that keeps a minimum gap between outgoing requests.
//! Unlike a token bucket there is no burst: every request waits for the
//! previous one to finish plus the configured interval.

use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::trace;

#[derive(Debug)]
pub struct RequestSpacer {
    min_interval: Duration,
    // tokio's Mutex queues waiters fairly, which gives us FIFO ordering
    last_request: Mutex<Option<Instant>>,
}

impl RequestSpacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits for its turn, runs `operation`, then stamps the completion time.
    pub async fn run<T, F, Fut>(&self, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let mut last = self.last_request.lock().await;

        if let Some(previous) = *last {
            let ready_at = previous + self.min_interval;
            if ready_at > Instant::now() {
                trace!(
                    "Spacing request by {:?}",
                    ready_at.saturating_duration_since(Instant::now())
                );
                sleep_until(ready_at).await;
            }
        }

        let output = operation().await;
        *last = Some(Instant::now());
        output
    }

    /// Completion time of the most recent request, if any.
    pub async fn last_request(&self) -> Option<Instant> {
        *self.last_request.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_first_request_is_not_delayed() {
        let spacer = RequestSpacer::new(Duration::from_millis(200));
        let start = Instant::now();
        spacer.run(|| async {}).await;
        assert!(start.elapsed() < Duration::from_millis(100));
        assert!(spacer.last_request().await.is_some());
    }

    #[tokio::test]
    async fn test_consecutive_requests_are_spaced() {
        let spacer = RequestSpacer::new(Duration::from_millis(50));
        let start = Instant::now();
        for _ in 0..3 {
            spacer.run(|| async {}).await;
        }
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_concurrent_callers_are_serialized() {
        let spacer = Arc::new(RequestSpacer::new(Duration::from_millis(30)));
        let start = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..3 {
            let spacer = spacer.clone();
            handles.push(tokio::spawn(async move {
                spacer.run(|| async { Instant::now() }).await
            }));
        }
        let mut stamps = Vec::new();
        for handle in handles {
            stamps.push(handle.await.unwrap());
        }
        stamps.sort();
        assert!(stamps[2].duration_since(start) >= Duration::from_millis(60));
    }
}
