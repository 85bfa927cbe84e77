//! # Transport Client
//!
//! Every request to the game server goes through [`TransportClient`]:
//!
//! - a single FIFO gate keeps `min_interval` between attempts, retries included
//! - GET responses are cached by full URL; POSTs never are
//! - transient failures are retried with exponential backoff
//! - request interceptors run once before sending, response interceptors on
//!   every response before its status is looked at

pub mod backend;
pub mod cache;
pub mod interceptor;

pub use backend::ReqwestBackend;
pub use cache::ResponseCache;
pub use interceptor::{ChallengeGuard, RequestInterceptor, ResponseInterceptor, TokenInjector};

use crate::model::LocationId;
use core_logic::{
    with_retry, ConfigError, HttpBackend, HttpConfig, HttpMethod, MetricsCollector, NetworkError,
    OutgoingRequest, RequestSpacer, RetryConfig,
};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};
use url::Url;

/// A game screen for one location, plus extra query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub location_id: LocationId,
    pub screen: String,
    pub params: Vec<(String, String)>,
}

impl Target {
    pub fn new(location_id: LocationId, screen: &str) -> Self {
        Self {
            location_id,
            screen: screen.to_string(),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: &str) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.screen, self.location_id)?;
        for (k, v) in &self.params {
            write!(f, "&{}={}", k, v)?;
        }
        Ok(())
    }
}

/// Per-call overrides.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestOptions {
    pub bypass_cache: bool,
    pub timeout: Option<Duration>,
    pub max_retries: Option<u32>,
}

impl RequestOptions {
    /// A read that must hit the server.
    pub fn fresh() -> Self {
        Self {
            bypass_cache: true,
            ..Self::default()
        }
    }
}

pub struct TransportClient {
    base: Url,
    backend: Arc<dyn HttpBackend>,
    spacer: RequestSpacer,
    retry: RetryConfig,
    timeout: Duration,
    cache: ResponseCache,
    request_interceptors: Vec<Box<dyn RequestInterceptor>>,
    response_interceptors: Vec<Box<dyn ResponseInterceptor>>,
    metrics: Arc<MetricsCollector>,
}

impl TransportClient {
    pub fn new(config: &HttpConfig, backend: Arc<dyn HttpBackend>) -> Result<Self, ConfigError> {
        let base = Url::parse(config.base_url.trim()).map_err(|_| ConfigError::InvalidBaseUrl {
            url: config.base_url.clone(),
        })?;

        Ok(Self {
            base,
            backend,
            spacer: RequestSpacer::new(config.min_interval()),
            retry: config.retry_config(),
            timeout: config.timeout(),
            cache: ResponseCache::new(config.cache_ttl()),
            request_interceptors: Vec::new(),
            response_interceptors: Vec::new(),
            metrics: Arc::new(MetricsCollector::new()),
        })
    }

    pub fn with_request_interceptor(mut self, interceptor: impl RequestInterceptor + 'static) -> Self {
        self.request_interceptors.push(Box::new(interceptor));
        self
    }

    pub fn with_response_interceptor(mut self, interceptor: impl ResponseInterceptor + 'static) -> Self {
        self.response_interceptors.push(Box::new(interceptor));
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub async fn last_request(&self) -> Option<tokio::time::Instant> {
        self.spacer.last_request().await
    }

    /// `<base>/game.php?village=<id>&screen=<screen>&<params>`
    pub fn url_for(&self, target: &Target) -> String {
        let mut url = self.base.clone();
        let path = format!("{}/game.php", self.base.path().trim_end_matches('/'));
        url.set_path(&path);
        {
            let mut query = url.query_pairs_mut();
            query.clear();
            query.append_pair("village", &target.location_id.to_string());
            query.append_pair("screen", &target.screen);
            for (k, v) in &target.params {
                query.append_pair(k, v);
            }
        }
        url.to_string()
    }

    pub async fn get(&self, target: &Target, options: &RequestOptions) -> Result<String, NetworkError> {
        self.request(HttpMethod::Get, target, Vec::new(), options).await
    }

    pub async fn post(
        &self,
        target: &Target,
        form: Vec<(String, String)>,
        options: &RequestOptions,
    ) -> Result<String, NetworkError> {
        self.request(HttpMethod::Post, target, form, options).await
    }

    pub async fn request(
        &self,
        method: HttpMethod,
        target: &Target,
        form: Vec<(String, String)>,
        options: &RequestOptions,
    ) -> Result<String, NetworkError> {
        let url = self.url_for(target);
        let cacheable = method.is_idempotent();

        if cacheable && !options.bypass_cache {
            if let Some(body) = self.cache.get(&url) {
                trace!("Cache hit for {}", target);
                self.metrics.record_cache_hit();
                return Ok(body);
            }
        }

        let mut request = OutgoingRequest {
            method,
            url,
            form,
            timeout: options.timeout.unwrap_or(self.timeout),
        };
        for interceptor in &self.request_interceptors {
            interceptor.before_send(target, &mut request);
        }

        let mut retry = self.retry;
        if let Some(max_retries) = options.max_retries {
            retry.max_retries = max_retries;
        }

        let label = format!("{} {}", method.as_str(), target);
        let request = &request;
        let body = with_retry(&retry, &label, move |attempt| async move {
            if attempt > 0 {
                self.metrics.record_retry();
            }
            self.attempt(request).await
        })
        .await?;

        if cacheable {
            self.cache.insert(&request.url, &body);
        }
        Ok(body)
    }

    async fn attempt(&self, request: &OutgoingRequest) -> Result<String, NetworkError> {
        self.spacer
            .run(|| async {
                let started = Instant::now();
                let outcome = self.backend.execute(request).await;
                self.metrics.record_request(started.elapsed());
                let response = outcome?;

                for interceptor in &self.response_interceptors {
                    interceptor.on_response(request, &response)?;
                }

                if !(200..300).contains(&response.status) {
                    debug!("{} {} -> HTTP {}", request.method.as_str(), request.url, response.status);
                    return Err(NetworkError::HttpStatus {
                        status_code: response.status,
                        endpoint: request.url.clone(),
                    });
                }
                Ok(response.body)
            })
            .await
    }
}
