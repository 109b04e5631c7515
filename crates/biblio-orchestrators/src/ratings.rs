//! Ratings orchestrator: fallback by default (first hit wins) or
//! aggregate (return the highest-confidence value).

use std::sync::Arc;
use std::time::Duration;

use biblio_common::{Attempt, Capability, Isbn13, OrchestrationOutcome, ProviderAttemptRecord};
use biblio_registry::{ProviderContext, ProviderRegistry, RatingResult};
use futures::stream::{FuturesUnordered, StreamExt};

use crate::ordering::order_providers;
use crate::try_provider::try_provider;

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum RatingsMode {
    Fallback,
    Aggregate,
}

pub struct RatingsConfig {
    pub per_provider_timeout: Duration,
    pub mode: RatingsMode,
}

impl Default for RatingsConfig {
    fn default() -> Self {
        Self {
            per_provider_timeout: Duration::from_secs(15),
            mode: RatingsMode::Fallback,
        }
    }
}

pub struct RatingsResult {
    pub rating: Option<RatingResult>,
    pub source: Option<String>,
    pub attempts: Vec<ProviderAttemptRecord>,
    pub outcome: OrchestrationOutcome,
}

pub struct RatingsOrchestrator {
    registry: Arc<ProviderRegistry>,
    config: RatingsConfig,
}

impl RatingsOrchestrator {
    pub fn new(registry: Arc<ProviderRegistry>, config: RatingsConfig) -> Self {
        Self { registry, config }
    }

    pub async fn fetch(&self, isbn: &Isbn13) -> RatingsResult {
        let ctx = ProviderContext::new();
        let candidates = order_providers(
            self.registry.available_by_capability(Capability::Ratings, &ctx).await,
            None,
        );
        let provider_chain: Vec<String> = candidates.iter().map(|p| p.name().to_string()).collect();

        match self.config.mode {
            RatingsMode::Fallback => self.fetch_fallback(isbn, &ctx, candidates, provider_chain).await,
            RatingsMode::Aggregate => self.fetch_aggregate(isbn, &ctx, candidates, provider_chain).await,
        }
    }

    async fn fetch_fallback(
        &self,
        isbn: &Isbn13,
        ctx: &ProviderContext,
        candidates: Vec<Arc<dyn biblio_registry::Provider>>,
        provider_chain: Vec<String>,
    ) -> RatingsResult {
        let mut attempts = Vec::new();
        for provider in &candidates {
            let Some(fetcher) = self.registry.ratings_fetcher(provider.name()) else {
                continue;
            };
            let call_ctx = ctx.child();
            let attempt = try_provider(provider.name(), self.config.per_provider_timeout, &call_ctx, {
                let isbn = isbn.clone();
                let fetcher = fetcher.clone();
                let inner_ctx = call_ctx.clone();
                async move { fetcher.fetch_ratings(&isbn, &inner_ctx).await }
            })
            .await;
            attempts.push(ProviderAttemptRecord::from_attempt(provider.name(), &attempt));
            if let Attempt::Success { data: Some(rating), .. } = attempt {
                let outcome = build_outcome(&provider_chain, Some(provider.name()), &attempts, true);
                return RatingsResult {
                    rating: Some(rating),
                    source: Some(provider.name().to_string()),
                    attempts,
                    outcome,
                };
            }
        }
        let outcome = build_outcome(&provider_chain, None, &attempts, false);
        RatingsResult { rating: None, source: None, attempts, outcome }
    }

    async fn fetch_aggregate(
        &self,
        isbn: &Isbn13,
        ctx: &ProviderContext,
        candidates: Vec<Arc<dyn biblio_registry::Provider>>,
        provider_chain: Vec<String>,
    ) -> RatingsResult {
        let mut inflight = FuturesUnordered::new();
        for provider in &candidates {
            let Some(fetcher) = self.registry.ratings_fetcher(provider.name()) else {
                continue;
            };
            let name = provider.name().to_string();
            let call_ctx = ctx.child();
            let timeout = self.config.per_provider_timeout;
            let isbn = isbn.clone();
            inflight.push(async move {
                let attempt = try_provider(&name, timeout, &call_ctx, {
                    let isbn = isbn.clone();
                    let fetcher = fetcher.clone();
                    let inner_ctx = call_ctx.clone();
                    async move { fetcher.fetch_ratings(&isbn, &inner_ctx).await }
                })
                .await;
                (name, attempt)
            });
        }

        let mut attempts = Vec::new();
        let mut best: Option<(String, RatingResult)> = None;
        while let Some((name, attempt)) = inflight.next().await {
            attempts.push(ProviderAttemptRecord::from_attempt(&name, &attempt));
            if let Attempt::Success { data: Some(rating), .. } = attempt {
                let replace = best.as_ref().map(|(_, b)| rating.confidence > b.confidence).unwrap_or(true);
                if replace {
                    best = Some((name, rating));
                }
            }
        }

        let success = best.is_some();
        let (source, rating) = match best {
            Some((name, rating)) => (Some(name), Some(rating)),
            None => (None, None),
        };
        let outcome = build_outcome(&provider_chain, source.as_deref(), &attempts, success);
        RatingsResult { rating, source, attempts, outcome }
    }
}

fn build_outcome(
    provider_chain: &[String],
    successful_provider: Option<&str>,
    attempts: &[ProviderAttemptRecord],
    success: bool,
) -> OrchestrationOutcome {
    OrchestrationOutcome {
        orchestrator: "ratings".to_string(),
        operation: "fetch_ratings".to_string(),
        provider_chain: provider_chain.to_vec(),
        successful_provider: successful_provider.map(|s| s.to_string()),
        attempts_count: attempts.len() as u32,
        total_latency_ms: attempts.iter().map(|a| a.latency_ms).sum(),
        success,
    }
}
