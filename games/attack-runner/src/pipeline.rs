//! Wires the components together from a [`RunnerConfig`].

use crate::config::RunnerConfig;
use crate::error::AttackError;
use crate::extract::ResponseExtractor;
use crate::inventory::InventoryCache;
use crate::queue::QueueProcessor;
use crate::submission::SubmissionEngine;
use crate::token::{PageContext, TokenCache, TokenManager};
use crate::transport::{ChallengeGuard, ReqwestBackend, TokenInjector, TransportClient};
use core_logic::{HttpBackend, MetricsCollector};
use std::sync::Arc;
use tracing::info;

pub struct AttackPipeline {
    pub extractor: Arc<ResponseExtractor>,
    pub transport: Arc<TransportClient>,
    pub tokens: Arc<TokenManager>,
    pub inventory: Arc<InventoryCache>,
    pub engine: Arc<SubmissionEngine>,
    pub queue: Arc<QueueProcessor>,
    pub metrics: Arc<MetricsCollector>,
}

impl AttackPipeline {
    /// Builds the production pipeline on a reqwest backend.
    pub fn connect(config: &RunnerConfig) -> Result<Self, AttackError> {
        let backend = ReqwestBackend::new(&config.http, config.session.cookie.as_deref())?;
        let pipeline = Self::from_config(config, Arc::new(backend))?;
        if let Some(context) = config.page_context()? {
            info!("Using saved page for location {}", context.location_id);
            pipeline.tokens.set_page_context(context);
        }
        Ok(pipeline)
    }

    pub fn from_config(config: &RunnerConfig, backend: Arc<dyn HttpBackend>) -> Result<Self, AttackError> {
        let extractor = Arc::new(
            ResponseExtractor::standard()?
                .with_success_phrases(&config.locale.success_phrases)
                .with_challenge_markers(&config.locale.challenge_markers)
                .with_stale_token_markers(&config.locale.stale_token_markers),
        );
        let metrics = Arc::new(MetricsCollector::new());
        let token_cache = Arc::new(TokenCache::new(config.cache.token_ttl()));

        let transport = Arc::new(
            TransportClient::new(&config.http, backend)?
                .with_request_interceptor(TokenInjector::new(token_cache.clone()))
                .with_response_interceptor(ChallengeGuard::new(extractor.clone()))
                .with_metrics(metrics.clone()),
        );

        let tokens = Arc::new(TokenManager::new(
            transport.clone(),
            extractor.clone(),
            token_cache,
        ));
        let inventory = Arc::new(InventoryCache::new(
            transport.clone(),
            extractor.clone(),
            config.cache.inventory_ttl(),
        ));
        let engine = Arc::new(
            SubmissionEngine::new(
                transport.clone(),
                tokens.clone(),
                inventory.clone(),
                extractor.clone(),
            )
            .with_bounds(config.world.bounds)
            .with_travel(config.world.travel())
            .with_inventory_check(config.verify_inventory),
        );
        let queue = Arc::new(QueueProcessor::new(engine.clone(), metrics.clone()));

        Ok(Self {
            extractor,
            transport,
            tokens,
            inventory,
            engine,
            queue,
            metrics,
        })
    }

    pub fn with_page_context(self, context: PageContext) -> Self {
        self.tokens.set_page_context(context);
        self
    }
}
