//! Edition Variants orchestrator: aggregate across all available
//! providers. Dedup key is ISBN; the variant from the highest-priority
//! provider wins, others are recorded as additional sources.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use biblio_common::{Attempt, Capability, Isbn13, OrchestrationOutcome, ProviderAttemptRecord};
use biblio_registry::{EditionVariant, ProviderContext, ProviderRegistry};
use futures::stream::{FuturesUnordered, StreamExt};

use crate::ordering::order_providers;
use crate::try_provider::try_provider;

pub struct EditionVariantsConfig {
    pub per_provider_timeout: Duration,
}

impl Default for EditionVariantsConfig {
    fn default() -> Self {
        Self {
            per_provider_timeout: Duration::from_secs(15),
        }
    }
}

pub struct MergedEditionVariant {
    pub variant: EditionVariant,
    pub sources: Vec<String>,
}

pub struct EditionVariantsResult {
    pub variants: Vec<MergedEditionVariant>,
    pub attempts: Vec<ProviderAttemptRecord>,
    pub outcome: OrchestrationOutcome,
}

pub struct EditionVariantsOrchestrator {
    registry: Arc<ProviderRegistry>,
    config: EditionVariantsConfig,
}

impl EditionVariantsOrchestrator {
    pub fn new(registry: Arc<ProviderRegistry>, config: EditionVariantsConfig) -> Self {
        Self { registry, config }
    }

    pub async fn fetch(&self, isbn: &Isbn13) -> EditionVariantsResult {
        let ctx = ProviderContext::new();
        // Priority order determines which provider's variant wins a dedup
        // tie; the default tier ordering doubles as that priority.
        let candidates = order_providers(
            self.registry
                .available_by_capability(Capability::EditionVariants, &ctx)
                .await,
            None,
        );
        let priority: Vec<String> = candidates.iter().map(|p| p.name().to_string()).collect();

        let mut inflight = FuturesUnordered::new();
        for provider in &candidates {
            let Some(fetcher) = self.registry.edition_variant_fetcher(provider.name()) else {
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
                    async move { fetcher.fetch_edition_variants(&isbn, &inner_ctx).await }
                })
                .await;
                (name, attempt)
            });
        }

        let mut attempts = Vec::new();
        let mut by_isbn: HashMap<Isbn13, (String, EditionVariant, Vec<String>)> = HashMap::new();

        while let Some((name, attempt)) = inflight.next().await {
            attempts.push(ProviderAttemptRecord::from_attempt(&name, &attempt));
            if let Attempt::Success { data, .. } = attempt {
                for variant in data {
                    by_isbn
                        .entry(variant.isbn.clone())
                        .and_modify(|(owner, existing, sources)| {
                            sources.push(name.clone());
                            let owner_rank = priority.iter().position(|p| p == owner).unwrap_or(usize::MAX);
                            let candidate_rank = priority.iter().position(|p| p == &name).unwrap_or(usize::MAX);
                            if candidate_rank < owner_rank {
                                *owner = name.clone();
                                *existing = variant.clone();
                            }
                        })
                        .or_insert_with(|| (name.clone(), variant, vec![name.clone()]));
                }
            }
        }

        let success = !by_isbn.is_empty();
        let variants = by_isbn
            .into_values()
            .map(|(_, variant, sources)| MergedEditionVariant { variant, sources })
            .collect();

        let outcome = OrchestrationOutcome {
            orchestrator: "edition_variants".to_string(),
            operation: "fetch_edition_variants".to_string(),
            provider_chain: priority,
            successful_provider: None,
            attempts_count: attempts.len() as u32,
            total_latency_ms: attempts.iter().map(|a| a.latency_ms).sum(),
            success,
        };

        EditionVariantsResult {
            variants,
            attempts,
            outcome,
        }
    }
}
