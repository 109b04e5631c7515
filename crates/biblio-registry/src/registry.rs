//! The Provider Registry: indexes providers by capability, filters
//! by live availability. Immutable after `build()`; reads are lock-free.
//!
//! Grounded on the tiered, comment-banner registration style and the
//! `available()`/`byCapability()`/`stats()` surface of a media-provider
//! registry in the reference pack, adapted from "media type" to
//! "capability".

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use biblio_common::{Capability, Tier};
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::warn;

use crate::provider::{
    BatchMetadataFetcher, BookGenerator, CoverFetcher, EditionVariantFetcher, ExternalIdFetcher,
    IsbnResolver, MetadataFetcher, Provider, ProviderContext, Registration, SubjectFetcher,
};

#[derive(Debug, Clone, Default)]
pub struct RegistryStats {
    pub total: usize,
    pub by_tier: HashMap<Tier, usize>,
    pub by_capability: HashMap<Capability, usize>,
}

/// Immutable, built once at startup from a list of [`Registration`]s.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
    isbn_resolvers: HashMap<String, Arc<dyn IsbnResolver>>,
    cover_fetchers: HashMap<String, Arc<dyn CoverFetcher>>,
    metadata_fetchers: HashMap<String, Arc<dyn MetadataFetcher>>,
    subject_fetchers: HashMap<String, Arc<dyn SubjectFetcher>>,
    book_generators: HashMap<String, Arc<dyn BookGenerator>>,
    edition_variant_fetchers: HashMap<String, Arc<dyn EditionVariantFetcher>>,
    external_id_fetchers: HashMap<String, Arc<dyn ExternalIdFetcher>>,
    ratings_fetchers: HashMap<String, Arc<dyn crate::provider::RatingsFetcher>>,
    batch_metadata_fetchers: HashMap<String, Arc<dyn BatchMetadataFetcher>>,
    by_capability: HashMap<Capability, Vec<Arc<dyn Provider>>>,
}

pub struct ProviderRegistryBuilder {
    registrations: Vec<Registration>,
}

impl ProviderRegistryBuilder {
    pub fn new() -> Self {
        Self {
            registrations: Vec::new(),
        }
    }

    pub fn register(mut self, registration: Registration) -> Self {
        self.registrations.push(registration);
        self
    }

    pub fn build(self) -> ProviderRegistry {
        let mut providers = HashMap::new();
        let mut isbn_resolvers = HashMap::new();
        let mut cover_fetchers = HashMap::new();
        let mut metadata_fetchers = HashMap::new();
        let mut subject_fetchers = HashMap::new();
        let mut book_generators = HashMap::new();
        let mut edition_variant_fetchers = HashMap::new();
        let mut external_id_fetchers = HashMap::new();
        let mut ratings_fetchers = HashMap::new();
        let mut batch_metadata_fetchers = HashMap::new();
        let mut by_capability: HashMap<Capability, Vec<Arc<dyn Provider>>> = HashMap::new();

        for reg in self.registrations {
            let name = reg.provider.name().to_string();

            for cap in reg.provider.capabilities().iter().copied() {
                by_capability.entry(cap).or_default().push(reg.provider.clone());
            }

            if let Some(v) = reg.isbn_resolver {
                isbn_resolvers.insert(name.clone(), v);
            }
            if let Some(v) = reg.cover_fetcher {
                cover_fetchers.insert(name.clone(), v);
            }
            if let Some(v) = reg.metadata_fetcher {
                metadata_fetchers.insert(name.clone(), v);
            }
            if let Some(v) = reg.subject_fetcher {
                subject_fetchers.insert(name.clone(), v);
            }
            if let Some(v) = reg.book_generator {
                book_generators.insert(name.clone(), v);
            }
            if let Some(v) = reg.edition_variant_fetcher {
                edition_variant_fetchers.insert(name.clone(), v);
            }
            if let Some(v) = reg.external_id_fetcher {
                external_id_fetchers.insert(name.clone(), v);
            }
            if let Some(v) = reg.ratings_fetcher {
                ratings_fetchers.insert(name.clone(), v);
            }
            if let Some(v) = reg.batch_metadata_fetcher {
                batch_metadata_fetchers.insert(name.clone(), v);
            }

            providers.insert(name, reg.provider);
        }

        ProviderRegistry {
            providers,
            isbn_resolvers,
            cover_fetchers,
            metadata_fetchers,
            subject_fetchers,
            book_generators,
            edition_variant_fetchers,
            external_id_fetchers,
            ratings_fetchers,
            batch_metadata_fetchers,
            by_capability,
        }
    }
}

impl Default for ProviderRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRegistry {
    pub fn builder() -> ProviderRegistryBuilder {
        ProviderRegistryBuilder::new()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// All registered providers for a capability, in registration order,
    /// regardless of current availability.
    pub fn by_capability(&self, cap: Capability) -> Vec<Arc<dyn Provider>> {
        self.by_capability.get(&cap).cloned().unwrap_or_default()
    }

    /// Concurrently probes `is_available` for every provider registered
    /// under `cap`; only the providers answering `true` are returned.
    /// Availability results are never cached (they depend on live quota).
    pub async fn available_by_capability(
        &self,
        cap: Capability,
        ctx: &ProviderContext,
    ) -> Vec<Arc<dyn Provider>> {
        let candidates = self.by_capability(cap);
        let mut futures = FuturesUnordered::new();
        for provider in candidates {
            let ctx = ctx.child();
            futures.push(async move {
                let available = provider.is_available(&ctx).await;
                (provider, available)
            });
        }

        let mut result = Vec::new();
        while let Some((provider, available)) = futures.next().await {
            if available {
                result.push(provider);
            } else {
                warn!(provider = provider.name(), capability = %cap, "provider unavailable, dropped from discovery");
            }
        }
        result
    }

    pub fn isbn_resolver(&self, name: &str) -> Option<Arc<dyn IsbnResolver>> {
        self.isbn_resolvers.get(name).cloned()
    }
    pub fn cover_fetcher(&self, name: &str) -> Option<Arc<dyn CoverFetcher>> {
        self.cover_fetchers.get(name).cloned()
    }
    pub fn metadata_fetcher(&self, name: &str) -> Option<Arc<dyn MetadataFetcher>> {
        self.metadata_fetchers.get(name).cloned()
    }
    pub fn subject_fetcher(&self, name: &str) -> Option<Arc<dyn SubjectFetcher>> {
        self.subject_fetchers.get(name).cloned()
    }
    pub fn book_generator(&self, name: &str) -> Option<Arc<dyn BookGenerator>> {
        self.book_generators.get(name).cloned()
    }
    pub fn edition_variant_fetcher(&self, name: &str) -> Option<Arc<dyn EditionVariantFetcher>> {
        self.edition_variant_fetchers.get(name).cloned()
    }
    pub fn external_id_fetcher(&self, name: &str) -> Option<Arc<dyn ExternalIdFetcher>> {
        self.external_id_fetchers.get(name).cloned()
    }
    pub fn ratings_fetcher(&self, name: &str) -> Option<Arc<dyn crate::provider::RatingsFetcher>> {
        self.ratings_fetchers.get(name).cloned()
    }
    pub fn batch_metadata_fetcher(&self, name: &str) -> Option<Arc<dyn BatchMetadataFetcher>> {
        self.batch_metadata_fetchers.get(name).cloned()
    }

    pub fn stats(&self) -> RegistryStats {
        let mut by_tier = HashMap::new();
        for provider in self.providers.values() {
            *by_tier.entry(provider.tier()).or_insert(0) += 1;
        }
        let by_capability = self
            .by_capability
            .iter()
            .map(|(cap, providers)| (*cap, providers.len()))
            .collect();
        RegistryStats {
            total: self.providers.len(),
            by_tier,
            by_capability,
        }
    }

    /// Used by default ordering: every capability registered, useful for
    /// tests asserting the discovery set attempted.
    pub fn registered_capabilities(&self) -> HashSet<Capability> {
        self.by_capability.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderContext;
    use async_trait::async_trait;
    use biblio_common::Tier;
    use std::collections::HashSet;

    struct AlwaysAvailable {
        name: &'static str,
        caps: HashSet<Capability>,
    }

    #[async_trait]
    impl Provider for AlwaysAvailable {
        fn name(&self) -> &str {
            self.name
        }
        fn tier(&self) -> Tier {
            Tier::Free
        }
        fn capabilities(&self) -> &HashSet<Capability> {
            &self.caps
        }
        async fn is_available(&self, _ctx: &ProviderContext) -> bool {
            true
        }
    }

    struct NeverAvailable {
        name: &'static str,
        caps: HashSet<Capability>,
    }

    #[async_trait]
    impl Provider for NeverAvailable {
        fn name(&self) -> &str {
            self.name
        }
        fn tier(&self) -> Tier {
            Tier::Paid
        }
        fn capabilities(&self) -> &HashSet<Capability> {
            &self.caps
        }
        async fn is_available(&self, _ctx: &ProviderContext) -> bool {
            false
        }
    }

    fn caps(c: Capability) -> HashSet<Capability> {
        let mut s = HashSet::new();
        s.insert(c);
        s
    }

    #[tokio::test]
    async fn available_by_capability_drops_unavailable_providers() {
        let registry = ProviderRegistry::builder()
            .register(Registration::new(Arc::new(AlwaysAvailable {
                name: "free-a",
                caps: caps(Capability::IsbnResolution),
            })))
            .register(Registration::new(Arc::new(NeverAvailable {
                name: "paid",
                caps: caps(Capability::IsbnResolution),
            })))
            .build();

        let ctx = ProviderContext::new();
        let available = registry
            .available_by_capability(Capability::IsbnResolution, &ctx)
            .await;

        assert_eq!(available.len(), 1);
        assert_eq!(available[0].name(), "free-a");
    }

    #[tokio::test]
    async fn available_by_capability_returns_empty_when_all_unavailable() {
        let registry = ProviderRegistry::builder()
            .register(Registration::new(Arc::new(NeverAvailable {
                name: "paid",
                caps: caps(Capability::CoverImages),
            })))
            .build();

        let ctx = ProviderContext::new();
        let available = registry
            .available_by_capability(Capability::CoverImages, &ctx)
            .await;

        assert!(available.is_empty());
    }

    #[test]
    fn stats_counts_by_tier_and_capability() {
        let registry = ProviderRegistry::builder()
            .register(Registration::new(Arc::new(AlwaysAvailable {
                name: "free-a",
                caps: caps(Capability::CoverImages),
            })))
            .register(Registration::new(Arc::new(NeverAvailable {
                name: "paid",
                caps: caps(Capability::CoverImages),
            })))
            .build();

        let stats = registry.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_tier[&Tier::Free], 1);
        assert_eq!(stats.by_tier[&Tier::Paid], 1);
        assert_eq!(stats.by_capability[&Capability::CoverImages], 2);
    }
}
