use async_trait::async_trait;
use core_logic::{ConfigError, HttpBackend, HttpConfig, HttpMethod, NetworkError, OutgoingRequest, RawResponse};
use reqwest::cookie::Jar;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Production backend: a single reqwest client carrying the session cookies.
#[derive(Debug, Clone)]
pub struct ReqwestBackend {
    client: Client,
}

impl ReqwestBackend {
    /// `cookie` is a raw `Cookie` header value (`name=value; name2=value2`).
    pub fn new(config: &HttpConfig, cookie: Option<&str>) -> Result<Self, ConfigError> {
        let base = Url::parse(&config.base_url).map_err(|_| ConfigError::InvalidBaseUrl {
            url: config.base_url.clone(),
        })?;

        let jar = Jar::default();
        if let Some(cookie) = cookie {
            for pair in cookie.split(';').map(str::trim).filter(|p| !p.is_empty()) {
                jar.add_cookie_str(pair, &base);
            }
        }

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(30))
            .cookie_provider(Arc::new(jar))
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "http".to_string(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }
}

fn classify(error: reqwest::Error, request: &OutgoingRequest) -> NetworkError {
    if error.is_timeout() {
        NetworkError::Timeout {
            timeout_ms: request.timeout.as_millis() as u64,
            endpoint: request.url.clone(),
        }
    } else {
        NetworkError::ConnectionFailed {
            endpoint: request.url.clone(),
            reason: error.to_string(),
        }
    }
}

#[async_trait]
impl HttpBackend for ReqwestBackend {
    async fn execute(&self, request: &OutgoingRequest) -> Result<RawResponse, NetworkError> {
        let builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url).form(&request.form),
        };

        let response = builder
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| classify(e, request))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| classify(e, request))?;

        Ok(RawResponse { status, body })
    }
}
