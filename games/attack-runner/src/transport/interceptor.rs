//! Hooks that run around every backend call.

use super::Target;
use crate::extract::ResponseExtractor;
use crate::model::TOKEN_FIELD;
use crate::token::TokenCache;
use core_logic::{HttpMethod, NetworkError, OutgoingRequest, RawResponse};
use std::sync::Arc;
use tracing::{debug, warn};

/// Runs once per logical request, before the first attempt.
pub trait RequestInterceptor: Send + Sync {
    fn before_send(&self, target: &Target, request: &mut OutgoingRequest);
}

/// Runs on every response, before its status is classified. An error here
/// replaces the response.
pub trait ResponseInterceptor: Send + Sync {
    fn on_response(&self, request: &OutgoingRequest, response: &RawResponse) -> Result<(), NetworkError>;
}

/// Adds the cached token of the target location to write bodies lacking one.
pub struct TokenInjector {
    tokens: Arc<TokenCache>,
}

impl TokenInjector {
    pub fn new(tokens: Arc<TokenCache>) -> Self {
        Self { tokens }
    }
}

impl RequestInterceptor for TokenInjector {
    fn before_send(&self, target: &Target, request: &mut OutgoingRequest) {
        if request.method != HttpMethod::Post || request.form_value(TOKEN_FIELD).is_some() {
            return;
        }
        if let Some(token) = self.tokens.get(target.location_id) {
            debug!("Injecting cached token for location {}", target.location_id);
            request
                .form
                .push((TOKEN_FIELD.to_string(), token.value.clone()));
        }
    }
}

/// Turns anti-automation pages into [`NetworkError::ChallengeDetected`].
pub struct ChallengeGuard {
    extractor: Arc<ResponseExtractor>,
}

impl ChallengeGuard {
    pub fn new(extractor: Arc<ResponseExtractor>) -> Self {
        Self { extractor }
    }
}

impl ResponseInterceptor for ChallengeGuard {
    fn on_response(&self, request: &OutgoingRequest, response: &RawResponse) -> Result<(), NetworkError> {
        match self.extractor.challenge_marker(&response.body) {
            Some(marker) => {
                warn!("Challenge marker '{}' in response from {}", marker, request.url);
                Err(NetworkError::ChallengeDetected {
                    endpoint: request.url.clone(),
                    marker: marker.to_string(),
                })
            }
            None => Ok(()),
        }
    }
}
