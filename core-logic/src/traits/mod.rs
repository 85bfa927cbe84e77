use crate::error::NetworkError;
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    /// Reads may be cached, writes never are.
    pub fn is_idempotent(&self) -> bool {
        matches!(self, HttpMethod::Get)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// A fully resolved request, as handed to the backend.
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub method: HttpMethod,
    pub url: String,
    /// Form-encoded body fields, in submission order
    pub form: Vec<(String, String)>,
    pub timeout: Duration,
}

impl OutgoingRequest {
    pub fn form_value(&self, key: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// The network boundary. Production uses reqwest; tests script responses.
#[async_trait]
pub trait HttpBackend: Send + Sync {
    /// Performs exactly one attempt. Status codes are reported, not classified.
    async fn execute(&self, request: &OutgoingRequest) -> Result<RawResponse, NetworkError>;
}
