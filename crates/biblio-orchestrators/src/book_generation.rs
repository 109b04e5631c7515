//! Book Generation orchestrator: concurrent mode by default, all
//! AI providers run in parallel, results deduplicated by normalized title
//! similarity; optional sequential `stop_on_first_success` mode.

use std::sync::Arc;
use std::time::Duration;

use biblio_common::{Attempt, Capability, OrchestrationOutcome, ProviderAttemptRecord};
use biblio_registry::{BookCandidate, ProviderContext, ProviderRegistry};
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::warn;

use crate::merge::dedup_generated_titles;
use crate::ordering::order_providers;
use crate::try_provider::try_provider;

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum BookGenerationMode {
    Concurrent,
    SequentialStopOnFirstSuccess,
}

pub struct BookGenerationConfig {
    pub per_provider_timeout: Duration,
    pub similarity_threshold: f64,
    pub mode: BookGenerationMode,
    pub explicit_priority: Option<Vec<String>>,
}

impl Default for BookGenerationConfig {
    fn default() -> Self {
        Self {
            per_provider_timeout: Duration::from_secs(60),
            similarity_threshold: 0.6,
            mode: BookGenerationMode::Concurrent,
            explicit_priority: None,
        }
    }
}

pub struct BookGenerationResult {
    pub candidates: Vec<BookCandidate>,
    pub providers_attempted: Vec<String>,
    pub attempts: Vec<ProviderAttemptRecord>,
    pub outcome: OrchestrationOutcome,
}

pub struct BookGenerationOrchestrator {
    registry: Arc<ProviderRegistry>,
    config: BookGenerationConfig,
}

impl BookGenerationOrchestrator {
    pub fn new(registry: Arc<ProviderRegistry>, config: BookGenerationConfig) -> Self {
        Self { registry, config }
    }

    pub async fn generate(&self, prompt: &str, count: u32) -> BookGenerationResult {
        let ctx = ProviderContext::new();
        let candidates = order_providers(
            self.registry
                .available_by_capability(Capability::BookGeneration, &ctx)
                .await,
            self.config.explicit_priority.as_deref(),
        );

        let providers_attempted: Vec<String> = candidates.iter().map(|p| p.name().to_string()).collect();
        tracing::info!(providers = ?providers_attempted, "book generation attempting providers");

        let mut attempts = Vec::new();
        let mut raw_candidates = Vec::new();

        match self.config.mode {
            BookGenerationMode::Concurrent => {
                let mut inflight = FuturesUnordered::new();
                for provider in &candidates {
                    let Some(generator) = self.registry.book_generator(provider.name()) else {
                        continue;
                    };
                    let name = provider.name().to_string();
                    let call_ctx = ctx.child();
                    let timeout = self.config.per_provider_timeout;
                    let prompt = prompt.to_string();
                    inflight.push(async move {
                        let attempt = try_provider(&name, timeout, &call_ctx, {
                            let prompt = prompt.clone();
                            let generator = generator.clone();
                            let inner_ctx = call_ctx.clone();
                            async move { generator.generate_books(&prompt, count, &inner_ctx).await }
                        })
                        .await;
                        (name, attempt)
                    });
                }
                while let Some((name, attempt)) = inflight.next().await {
                    attempts.push(ProviderAttemptRecord::from_attempt(&name, &attempt));
                    match attempt {
                        Attempt::Success { data, .. } => raw_candidates.extend(data),
                        other => {
                            if let Some(reason) = other.error_reason() {
                                warn!(provider = %name, reason, "book generation provider failed, isolated");
                            }
                        }
                    }
                }
            }
            BookGenerationMode::SequentialStopOnFirstSuccess => {
                for provider in &candidates {
                    let Some(generator) = self.registry.book_generator(provider.name()) else {
                        continue;
                    };
                    let call_ctx = ctx.child();
                    let attempt = try_provider(provider.name(), self.config.per_provider_timeout, &call_ctx, {
                        let prompt = prompt.to_string();
                        let generator = generator.clone();
                        let inner_ctx = call_ctx.clone();
                        async move { generator.generate_books(&prompt, count, &inner_ctx).await }
                    })
                    .await;
                    attempts.push(ProviderAttemptRecord::from_attempt(provider.name(), &attempt));
                    if let Attempt::Success { data, .. } = attempt {
                        if !data.is_empty() {
                            raw_candidates = data;
                            break;
                        }
                    }
                }
            }
        }

        let candidates_out = dedup_generated_titles(raw_candidates, self.config.similarity_threshold);
        let success = !candidates_out.is_empty();

        let outcome = OrchestrationOutcome {
            orchestrator: "book_generation".to_string(),
            operation: "generate_books".to_string(),
            provider_chain: providers_attempted.clone(),
            successful_provider: None,
            attempts_count: attempts.len() as u32,
            total_latency_ms: attempts.iter().map(|a| a.latency_ms).sum(),
            success,
        };

        BookGenerationResult {
            candidates: candidates_out,
            providers_attempted,
            attempts,
            outcome,
        }
    }
}
