//! The `Provider` trait and one typed capability sub-trait per entry in the
//! closed capability set. A provider is a value implementing
//! `Provider` plus whichever capability traits it supports — capability
//! interfaces are preferred over inheritance.

use std::sync::Arc;

use async_trait::async_trait;
use biblio_common::Isbn13;
use tokio_util::sync::CancellationToken;

use crate::types::{
    BookCandidate, CoverResult, EditionVariant, ExternalIdResult, IsbnResolution, Metadata,
    RatingResult,
};

/// Carried into every capability method: a cancellation signal the
/// transport must observe, plus whatever environment references the
/// adapter needs. Built fresh per call by the orchestrator's `try_provider`
/// skeleton's cancellation-and-timeout pattern.
#[derive(Clone)]
pub struct ProviderContext {
    pub cancellation: CancellationToken,
}

impl ProviderContext {
    pub fn new() -> Self {
        Self {
            cancellation: CancellationToken::new(),
        }
    }

    pub fn child(&self) -> Self {
        Self {
            cancellation: self.cancellation.child_token(),
        }
    }
}

impl Default for ProviderContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Every provider implements this for registration, tiering, and
/// availability gating, independent of which capabilities it supports.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;
    fn tier(&self) -> biblio_common::Tier;
    fn capabilities(&self) -> &std::collections::HashSet<biblio_common::Capability>;

    /// Never returns an error: an internal failure during the availability
    /// probe is caught by the implementation and reported as `false` —
    /// availability errors are demotions, not orchestration failures.
    async fn is_available(&self, ctx: &ProviderContext) -> bool;
}

#[async_trait]
pub trait IsbnResolver: Send + Sync {
    async fn resolve_isbn(
        &self,
        title: &str,
        author: &str,
        ctx: &ProviderContext,
    ) -> Result<Option<IsbnResolution>, biblio_common::EnrichmentError>;
}

#[async_trait]
pub trait CoverFetcher: Send + Sync {
    async fn fetch_cover(
        &self,
        isbn: &Isbn13,
        ctx: &ProviderContext,
    ) -> Result<Option<CoverResult>, biblio_common::EnrichmentError>;
}

#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    async fn fetch_metadata(
        &self,
        isbn: &Isbn13,
        ctx: &ProviderContext,
    ) -> Result<Option<Metadata>, biblio_common::EnrichmentError>;
}

#[async_trait]
pub trait SubjectFetcher: Send + Sync {
    async fn fetch_subjects(
        &self,
        isbn: &Isbn13,
        ctx: &ProviderContext,
    ) -> Result<Vec<String>, biblio_common::EnrichmentError>;
}

#[async_trait]
pub trait BookGenerator: Send + Sync {
    async fn generate_books(
        &self,
        prompt: &str,
        count: u32,
        ctx: &ProviderContext,
    ) -> Result<Vec<BookCandidate>, biblio_common::EnrichmentError>;
}

#[async_trait]
pub trait EditionVariantFetcher: Send + Sync {
    async fn fetch_edition_variants(
        &self,
        isbn: &Isbn13,
        ctx: &ProviderContext,
    ) -> Result<Vec<EditionVariant>, biblio_common::EnrichmentError>;
}

#[async_trait]
pub trait ExternalIdFetcher: Send + Sync {
    async fn fetch_external_ids(
        &self,
        isbn: &Isbn13,
        ctx: &ProviderContext,
    ) -> Result<Vec<ExternalIdResult>, biblio_common::EnrichmentError>;
}

#[async_trait]
pub trait RatingsFetcher: Send + Sync {
    async fn fetch_ratings(
        &self,
        isbn: &Isbn13,
        ctx: &ProviderContext,
    ) -> Result<Option<RatingResult>, biblio_common::EnrichmentError>;
}

/// Exposed only by adapters that can batch (currently the paid metadata
/// service); the Enrichment Queue Consumer depends on this directly rather
/// than through the general registry/orchestrator path, since batching is
/// specific to one adapter rather than a capability every metadata
/// provider might share.
#[async_trait]
pub trait BatchMetadataFetcher: Send + Sync {
    async fn fetch_metadata_batch(
        &self,
        isbns: &[Isbn13],
        ctx: &ProviderContext,
    ) -> Result<std::collections::HashMap<Isbn13, Metadata>, biblio_common::EnrichmentError>;
}

/// One fully-registered provider: the type-erased `Provider` plus whichever
/// typed capability implementations it supports. Built once by
/// `ProviderRegistry::builder()` and never mutated.
pub struct Registration {
    pub provider: Arc<dyn Provider>,
    pub isbn_resolver: Option<Arc<dyn IsbnResolver>>,
    pub cover_fetcher: Option<Arc<dyn CoverFetcher>>,
    pub metadata_fetcher: Option<Arc<dyn MetadataFetcher>>,
    pub subject_fetcher: Option<Arc<dyn SubjectFetcher>>,
    pub book_generator: Option<Arc<dyn BookGenerator>>,
    pub edition_variant_fetcher: Option<Arc<dyn EditionVariantFetcher>>,
    pub external_id_fetcher: Option<Arc<dyn ExternalIdFetcher>>,
    pub ratings_fetcher: Option<Arc<dyn RatingsFetcher>>,
    pub batch_metadata_fetcher: Option<Arc<dyn BatchMetadataFetcher>>,
}

impl Registration {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            isbn_resolver: None,
            cover_fetcher: None,
            metadata_fetcher: None,
            subject_fetcher: None,
            book_generator: None,
            edition_variant_fetcher: None,
            external_id_fetcher: None,
            ratings_fetcher: None,
            batch_metadata_fetcher: None,
        }
    }

    pub fn with_isbn_resolver(mut self, v: Arc<dyn IsbnResolver>) -> Self {
        self.isbn_resolver = Some(v);
        self
    }
    pub fn with_cover_fetcher(mut self, v: Arc<dyn CoverFetcher>) -> Self {
        self.cover_fetcher = Some(v);
        self
    }
    pub fn with_metadata_fetcher(mut self, v: Arc<dyn MetadataFetcher>) -> Self {
        self.metadata_fetcher = Some(v);
        self
    }
    pub fn with_subject_fetcher(mut self, v: Arc<dyn SubjectFetcher>) -> Self {
        self.subject_fetcher = Some(v);
        self
    }
    pub fn with_book_generator(mut self, v: Arc<dyn BookGenerator>) -> Self {
        self.book_generator = Some(v);
        self
    }
    pub fn with_edition_variant_fetcher(mut self, v: Arc<dyn EditionVariantFetcher>) -> Self {
        self.edition_variant_fetcher = Some(v);
        self
    }
    pub fn with_external_id_fetcher(mut self, v: Arc<dyn ExternalIdFetcher>) -> Self {
        self.external_id_fetcher = Some(v);
        self
    }
    pub fn with_ratings_fetcher(mut self, v: Arc<dyn RatingsFetcher>) -> Self {
        self.ratings_fetcher = Some(v);
        self
    }
    pub fn with_batch_metadata_fetcher(mut self, v: Arc<dyn BatchMetadataFetcher>) -> Self {
        self.batch_metadata_fetcher = Some(v);
        self
    }
}
