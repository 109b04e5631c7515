//! ISBN Resolution orchestrator: fallback mode, first provider
//! whose `resolve_isbn` returns a non-null ISBN wins.

use std::sync::Arc;
use std::time::Duration;

use biblio_common::{Attempt, Capability, Isbn13, OrchestrationOutcome, ProviderAttemptRecord};
use biblio_registry::{ProviderContext, ProviderRegistry};

use crate::ordering::order_providers;
use crate::try_provider::try_provider;

pub struct IsbnResolutionConfig {
    pub per_provider_timeout: Duration,
    pub explicit_priority: Option<Vec<String>>,
}

impl Default for IsbnResolutionConfig {
    fn default() -> Self {
        Self {
            per_provider_timeout: Duration::from_secs(15),
            explicit_priority: None,
        }
    }
}

pub struct IsbnResolutionResult {
    pub isbn: Option<Isbn13>,
    pub confidence: u8,
    pub source: String,
    pub attempts: Vec<ProviderAttemptRecord>,
    pub outcome: OrchestrationOutcome,
}

pub struct IsbnResolutionOrchestrator {
    registry: Arc<ProviderRegistry>,
    config: IsbnResolutionConfig,
}

impl IsbnResolutionOrchestrator {
    pub fn new(registry: Arc<ProviderRegistry>, config: IsbnResolutionConfig) -> Self {
        Self { registry, config }
    }

    pub async fn resolve(&self, title: &str, author: &str) -> IsbnResolutionResult {
        let ctx = ProviderContext::new();
        let candidates = self
            .registry
            .available_by_capability(Capability::IsbnResolution, &ctx)
            .await;
        let ordered = order_providers(candidates, self.config.explicit_priority.as_deref());

        let mut attempts: Vec<ProviderAttemptRecord> = Vec::new();
        let mut provider_chain = Vec::new();
        let mut any_success = false;

        for provider in &ordered {
            let Some(resolver) = self.registry.isbn_resolver(provider.name()) else {
                continue;
            };
            provider_chain.push(provider.name().to_string());
            let call_ctx = ctx.child();

            let attempt = try_provider(provider.name(), self.config.per_provider_timeout, &call_ctx, {
                let title = title.to_string();
                let author = author.to_string();
                let resolver = resolver.clone();
                let inner_ctx = call_ctx.clone();
                async move { resolver.resolve_isbn(&title, &author, &inner_ctx).await }
            })
            .await;

            attempts.push(ProviderAttemptRecord::from_attempt(provider.name(), &attempt));

            if attempt.is_success() {
                any_success = true;
            }
            if let Attempt::Success { data: Some(resolution), .. } = attempt {
                let outcome = build_outcome(&provider_chain, Some(provider.name()), &attempts, true);
                return IsbnResolutionResult {
                    isbn: Some(resolution.isbn),
                    confidence: resolution.confidence,
                    source: provider.name().to_string(),
                    attempts,
                    outcome,
                };
            }
        }

        let source = if ordered.is_empty() {
            "error"
        } else if any_success {
            "none"
        } else {
            "all-failed"
        };

        let outcome = build_outcome(&provider_chain, None, &attempts, false);

        IsbnResolutionResult {
            isbn: None,
            confidence: 0,
            source: source.to_string(),
            attempts,
            outcome,
        }
    }
}

fn build_outcome(
    provider_chain: &[String],
    successful_provider: Option<&str>,
    attempts: &[ProviderAttemptRecord],
    success: bool,
) -> OrchestrationOutcome {
    OrchestrationOutcome {
        orchestrator: "isbn_resolution".to_string(),
        operation: "resolve_isbn".to_string(),
        provider_chain: provider_chain.to_vec(),
        successful_provider: successful_provider.map(|s| s.to_string()),
        attempts_count: attempts.len() as u32,
        total_latency_ms: attempts.iter().map(|a| a.latency_ms).sum(),
        success,
    }
}
