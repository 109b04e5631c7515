//! Metadata Enrichment orchestrator: aggregate mode, parallel
//! fetch across all metadata providers plus up to N subject-only
//! providers, merged by field-specific rules.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use biblio_common::{Attempt, Capability, Isbn13, OrchestrationOutcome, ProviderAttemptRecord};
use biblio_registry::{Metadata, ProviderContext, ProviderRegistry};
use futures::stream::{FuturesUnordered, StreamExt};

use crate::merge::{first_non_null, longest_non_empty, merge_subjects};
use crate::ordering::order_providers;
use crate::try_provider::try_provider;

pub struct MetadataEnrichmentConfig {
    pub per_provider_timeout: Duration,
    pub subject_concurrency_limit: usize,
}

impl Default for MetadataEnrichmentConfig {
    fn default() -> Self {
        Self {
            per_provider_timeout: Duration::from_secs(15),
            subject_concurrency_limit: 3,
        }
    }
}

pub struct MetadataEnrichmentResult {
    pub metadata: Option<Metadata>,
    pub metadata_providers: Vec<String>,
    pub subject_providers: Vec<String>,
    pub duration_ms: u64,
    pub errors: Vec<String>,
    pub outcome: OrchestrationOutcome,
}

pub struct MetadataEnrichmentOrchestrator {
    registry: Arc<ProviderRegistry>,
    config: MetadataEnrichmentConfig,
}

impl MetadataEnrichmentOrchestrator {
    pub fn new(registry: Arc<ProviderRegistry>, config: MetadataEnrichmentConfig) -> Self {
        Self { registry, config }
    }

    pub async fn enrich(&self, isbn: &Isbn13) -> MetadataEnrichmentResult {
        let started = Instant::now();
        let ctx = ProviderContext::new();

        let metadata_candidates = order_providers(
            self.registry
                .available_by_capability(Capability::MetadataEnrichment, &ctx)
                .await,
            None,
        );
        // Priority order for the scalar "first non-null wins" merge below;
        // `FuturesUnordered` completion order is unrelated to this and must
        // not be allowed to leak into the merge.
        let metadata_priority: Vec<String> = metadata_candidates.iter().map(|p| p.name().to_string()).collect();
        let subject_candidates = order_providers(
            self.registry
                .available_by_capability(Capability::SubjectEnrichment, &ctx)
                .await,
            None,
        );

        let mut attempts = Vec::new();
        let mut errors = Vec::new();
        let mut metadata_providers = Vec::new();
        let mut successful_metadata: Vec<(String, Metadata)> = Vec::new();

        let mut inflight = FuturesUnordered::new();
        for provider in &metadata_candidates {
            let Some(fetcher) = self.registry.metadata_fetcher(provider.name()) else {
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
                    async move { fetcher.fetch_metadata(&isbn, &inner_ctx).await }
                })
                .await;
                (name, attempt)
            });
        }
        while let Some((name, attempt)) = inflight.next().await {
            metadata_providers.push(name.clone());
            attempts.push(ProviderAttemptRecord::from_attempt(&name, &attempt));
            match attempt {
                Attempt::Success { data: Some(metadata), .. } => {
                    successful_metadata.push((name, metadata));
                }
                Attempt::Success { data: None, .. } => {}
                other => {
                    if let Some(reason) = other.error_reason() {
                        errors.push(format!("{name}: {reason}"));
                    }
                }
            }
        }

        // Up to N subject-only providers concurrently (default 3).
        let mut subject_providers = Vec::new();
        let mut subject_lists: Vec<Vec<String>> = Vec::new();
        let subject_results: Vec<(String, Attempt<Vec<String>>)> = futures::stream::iter(subject_candidates.iter())
            .filter_map(|provider| {
                let fetcher = self.registry.subject_fetcher(provider.name());
                let name = provider.name().to_string();
                async move { fetcher.map(|f| (name, f)) }
            })
            .map(|(name, fetcher)| {
                let call_ctx = ctx.child();
                let timeout = self.config.per_provider_timeout;
                let isbn = isbn.clone();
                async move {
                    let attempt = try_provider(&name, timeout, &call_ctx, {
                        let isbn = isbn.clone();
                        let inner_ctx = call_ctx.clone();
                        async move { fetcher.fetch_subjects(&isbn, &inner_ctx).await }
                    })
                    .await;
                    (name, attempt)
                }
            })
            .buffer_unordered(self.config.subject_concurrency_limit.max(1))
            .collect()
            .await;

        for (name, attempt) in subject_results {
            subject_providers.push(name.clone());
            attempts.push(ProviderAttemptRecord::from_attempt(&name, &attempt));
            match attempt {
                Attempt::Success { data, .. } => subject_lists.push(data),
                other => {
                    if let Some(reason) = other.error_reason() {
                        errors.push(format!("{name}: {reason}"));
                    }
                }
            }
        }

        // Restore priority order before merging: the scalar merge rule is
        // "first non-null wins in priority order", not completion order.
        successful_metadata.sort_by_key(|(name, _)| metadata_priority.iter().position(|p| p == name).unwrap_or(usize::MAX));

        let metadata = merge_metadata(successful_metadata, subject_lists);
        let success = metadata.is_some();

        let outcome = OrchestrationOutcome {
            orchestrator: "metadata_enrichment".to_string(),
            operation: "enrich_metadata".to_string(),
            provider_chain: metadata_providers
                .iter()
                .chain(subject_providers.iter())
                .cloned()
                .collect(),
            successful_provider: None,
            attempts_count: attempts.len() as u32,
            total_latency_ms: attempts.iter().map(|a| a.latency_ms).sum(),
            success,
        };

        MetadataEnrichmentResult {
            metadata,
            metadata_providers,
            subject_providers,
            duration_ms: started.elapsed().as_millis() as u64,
            errors,
            outcome,
        }
    }
}

fn merge_metadata(successes: Vec<(String, Metadata)>, extra_subjects: Vec<Vec<String>>) -> Option<Metadata> {
    if successes.is_empty() {
        return None;
    }

    let values: Vec<&Metadata> = successes.iter().map(|(_, m)| m).collect();

    let title = first_non_null(values.iter().map(|m| m.title.clone()));
    let subtitle = first_non_null(values.iter().map(|m| m.subtitle.clone()));
    let publisher = first_non_null(values.iter().map(|m| m.publisher.clone()));
    let page_count = first_non_null(values.iter().map(|m| m.page_count));
    let language = first_non_null(values.iter().map(|m| m.language.clone()));
    let publication_year = first_non_null(values.iter().map(|m| m.publication_year));
    let cover_url = first_non_null(values.iter().map(|m| m.cover_url.clone()));

    let description = longest_non_empty(values.iter().filter_map(|m| m.description.as_deref()));

    let isbns = merge_subjects(values.iter().map(|m| m.isbns.clone()));
    let authors = merge_subjects(values.iter().map(|m| m.authors.clone()));

    let mut subject_sources: Vec<Vec<String>> = values.iter().map(|m| m.subjects.clone()).collect();
    subject_sources.extend(extra_subjects);
    let subjects = merge_subjects(subject_sources);

    // Shallow object merge: later providers may overwrite earlier keys, but
    // no provider should disagree with itself.
    let mut external_ids: HashMap<String, String> = HashMap::new();
    for (_, metadata) in &successes {
        for (key, value) in &metadata.external_ids {
            external_ids.insert(key.clone(), value.clone());
        }
    }

    Some(Metadata {
        title,
        subtitle,
        publisher,
        page_count,
        language,
        publication_year,
        isbns,
        cover_url,
        description,
        authors,
        subjects,
        external_ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_metadata_prefers_first_non_null_scalar_and_longest_description() {
        let a = Metadata {
            title: Some("A Title".to_string()),
            description: Some("short".to_string()),
            ..Metadata::default()
        };
        let b = Metadata {
            title: Some("Other Title".to_string()),
            description: Some("a considerably longer description".to_string()),
            ..Metadata::default()
        };
        let merged = merge_metadata(vec![("a".to_string(), a), ("b".to_string(), b)], vec![]).unwrap();
        assert_eq!(merged.title, Some("A Title".to_string()));
        assert_eq!(merged.description, Some("a considerably longer description".to_string()));
    }

    #[test]
    fn merge_metadata_returns_none_when_no_provider_succeeded() {
        assert!(merge_metadata(vec![], vec![]).is_none());
    }
}
