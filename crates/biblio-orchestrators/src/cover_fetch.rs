//! Cover Fetch orchestrator: fallback mode, free providers
//! ordered before paid to spare paid quota; first non-null URL wins.

use std::sync::Arc;
use std::time::Duration;

use biblio_common::{Attempt, Capability, Isbn13, OrchestrationOutcome, ProviderAttemptRecord, Tier};
use biblio_registry::{CoverResult, ProviderContext, ProviderRegistry};

use crate::try_provider::try_provider;

pub struct CoverFetchConfig {
    pub per_provider_timeout: Duration,
}

impl Default for CoverFetchConfig {
    fn default() -> Self {
        Self {
            per_provider_timeout: Duration::from_secs(15),
        }
    }
}

pub struct CoverFetchResult {
    pub cover: Option<CoverResult>,
    pub source: String,
    pub attempts: Vec<ProviderAttemptRecord>,
    pub outcome: OrchestrationOutcome,
}

pub struct CoverFetchOrchestrator {
    registry: Arc<ProviderRegistry>,
    config: CoverFetchConfig,
}

impl CoverFetchOrchestrator {
    pub fn new(registry: Arc<ProviderRegistry>, config: CoverFetchConfig) -> Self {
        Self { registry, config }
    }

    pub async fn fetch(&self, isbn: &Isbn13) -> CoverFetchResult {
        let ctx = ProviderContext::new();
        let mut candidates = self
            .registry
            .available_by_capability(Capability::CoverImages, &ctx)
            .await;
        // Free-first ordering to spare paid quota, independent of
        // the shared paid-first default used elsewhere.
        candidates.sort_by_key(|p| matches!(p.tier(), Tier::Paid));

        let mut attempts = Vec::new();
        let mut provider_chain = Vec::new();

        for provider in &candidates {
            let Some(fetcher) = self.registry.cover_fetcher(provider.name()) else {
                continue;
            };
            provider_chain.push(provider.name().to_string());
            let call_ctx = ctx.child();

            let attempt = try_provider(provider.name(), self.config.per_provider_timeout, &call_ctx, {
                let isbn = isbn.clone();
                let fetcher = fetcher.clone();
                let inner_ctx = call_ctx.clone();
                async move { fetcher.fetch_cover(&isbn, &inner_ctx).await }
            })
            .await;

            attempts.push(ProviderAttemptRecord::from_attempt(provider.name(), &attempt));

            if let Attempt::Success { data: Some(cover), .. } = attempt {
                let outcome = outcome_for(&provider_chain, Some(provider.name()), &attempts, true);
                return CoverFetchResult {
                    cover: Some(cover),
                    source: provider.name().to_string(),
                    attempts,
                    outcome,
                };
            }
        }

        let outcome = outcome_for(&provider_chain, None, &attempts, false);
        CoverFetchResult {
            cover: None,
            source: "none".to_string(),
            attempts,
            outcome,
        }
    }
}

fn outcome_for(
    provider_chain: &[String],
    successful_provider: Option<&str>,
    attempts: &[ProviderAttemptRecord],
    success: bool,
) -> OrchestrationOutcome {
    OrchestrationOutcome {
        orchestrator: "cover_fetch".to_string(),
        operation: "fetch_cover".to_string(),
        provider_chain: provider_chain.to_vec(),
        successful_provider: successful_provider.map(|s| s.to_string()),
        attempts_count: attempts.len() as u32,
        total_latency_ms: attempts.iter().map(|a| a.latency_ms).sum(),
        success,
    }
}
