//! Enhanced External IDs orchestrator: aggregate by default
//! (merge by ID type, confidence-prefers-higher on disagreement) or
//! fallback (first hit wins).
//!
//! None of the registered adapters expose a batched external-ID lookup
//! (only the paid metadata adapter batches, and only for metadata), so the
//! "use the provider's batch method when available" branch has
//! no concrete implementation yet; every call is per-ISBN.

use std::sync::Arc;
use std::time::Duration;

use biblio_common::{Attempt, Capability, Isbn13, OrchestrationOutcome, ProviderAttemptRecord};
use biblio_registry::{ExternalIdResult, ProviderContext, ProviderRegistry};
use futures::stream::{FuturesUnordered, StreamExt};

use crate::merge::{merge_external_ids, MergedExternalId};
use crate::ordering::order_providers;
use crate::try_provider::try_provider;

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ExternalIdsMode {
    Aggregate,
    Fallback,
}

pub struct ExternalIdsConfig {
    pub per_provider_timeout: Duration,
    pub mode: ExternalIdsMode,
}

impl Default for ExternalIdsConfig {
    fn default() -> Self {
        Self {
            per_provider_timeout: Duration::from_secs(15),
            mode: ExternalIdsMode::Aggregate,
        }
    }
}

pub struct ExternalIdsResult {
    pub ids: Vec<MergedExternalId>,
    pub conflicts: Vec<String>,
    pub attempts: Vec<ProviderAttemptRecord>,
    pub outcome: OrchestrationOutcome,
}

pub struct ExternalIdsOrchestrator {
    registry: Arc<ProviderRegistry>,
    config: ExternalIdsConfig,
}

impl ExternalIdsOrchestrator {
    pub fn new(registry: Arc<ProviderRegistry>, config: ExternalIdsConfig) -> Self {
        Self { registry, config }
    }

    pub async fn fetch(&self, isbn: &Isbn13) -> ExternalIdsResult {
        let ctx = ProviderContext::new();
        let candidates = order_providers(
            self.registry
                .available_by_capability(Capability::EnhancedExternalIds, &ctx)
                .await,
            None,
        );
        let provider_chain: Vec<String> = candidates.iter().map(|p| p.name().to_string()).collect();

        match self.config.mode {
            ExternalIdsMode::Fallback => self.fetch_fallback(isbn, &ctx, candidates, provider_chain).await,
            ExternalIdsMode::Aggregate => self.fetch_aggregate(isbn, &ctx, candidates, provider_chain).await,
        }
    }

    async fn fetch_fallback(
        &self,
        isbn: &Isbn13,
        ctx: &ProviderContext,
        candidates: Vec<Arc<dyn biblio_registry::Provider>>,
        provider_chain: Vec<String>,
    ) -> ExternalIdsResult {
        let mut attempts = Vec::new();
        for provider in &candidates {
            let Some(fetcher) = self.registry.external_id_fetcher(provider.name()) else {
                continue;
            };
            let call_ctx = ctx.child();
            let attempt = try_provider(provider.name(), self.config.per_provider_timeout, &call_ctx, {
                let isbn = isbn.clone();
                let fetcher = fetcher.clone();
                let inner_ctx = call_ctx.clone();
                async move { fetcher.fetch_external_ids(&isbn, &inner_ctx).await }
            })
            .await;
            attempts.push(ProviderAttemptRecord::from_attempt(provider.name(), &attempt));
            if let Attempt::Success { data, .. } = attempt {
                if !data.is_empty() {
                    let (merged, conflicts) = merge_external_ids(vec![(provider.name().to_string(), data)]);
                    let success = !merged.is_empty();
                    let outcome = build_outcome(&provider_chain, Some(provider.name()), &attempts, success);
                    return ExternalIdsResult { ids: merged, conflicts, attempts, outcome };
                }
            }
        }
        let outcome = build_outcome(&provider_chain, None, &attempts, false);
        ExternalIdsResult { ids: Vec::new(), conflicts: Vec::new(), attempts, outcome }
    }

    async fn fetch_aggregate(
        &self,
        isbn: &Isbn13,
        ctx: &ProviderContext,
        candidates: Vec<Arc<dyn biblio_registry::Provider>>,
        provider_chain: Vec<String>,
    ) -> ExternalIdsResult {
        let mut inflight = FuturesUnordered::new();
        for provider in &candidates {
            let Some(fetcher) = self.registry.external_id_fetcher(provider.name()) else {
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
                    async move { fetcher.fetch_external_ids(&isbn, &inner_ctx).await }
                })
                .await;
                (name, attempt)
            });
        }

        let mut attempts = Vec::new();
        let mut by_provider: Vec<(String, Vec<ExternalIdResult>)> = Vec::new();
        while let Some((name, attempt)) = inflight.next().await {
            attempts.push(ProviderAttemptRecord::from_attempt(&name, &attempt));
            if let Attempt::Success { data, .. } = attempt {
                by_provider.push((name, data));
            }
        }

        let (merged, conflicts) = merge_external_ids(by_provider);
        let success = !merged.is_empty();
        let outcome = build_outcome(&provider_chain, None, &attempts, success);
        ExternalIdsResult { ids: merged, conflicts, attempts, outcome }
    }
}

fn build_outcome(
    provider_chain: &[String],
    successful_provider: Option<&str>,
    attempts: &[ProviderAttemptRecord],
    success: bool,
) -> OrchestrationOutcome {
    OrchestrationOutcome {
        orchestrator: "external_ids".to_string(),
        operation: "fetch_external_ids".to_string(),
        provider_chain: provider_chain.to_vec(),
        successful_provider: successful_provider.map(|s| s.to_string()),
        attempts_count: attempts.len() as u32,
        total_latency_ms: attempts.iter().map(|a| a.latency_ms).sum(),
        success,
    }
}
