//! Shared fixtures for cross-crate scenario tests: a configurable fake
//! provider and an in-memory persistence repository, standing in for a live
//! HTTP provider or Postgres instance so the scenarios in `tests/` run
//! deterministically and without network access.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use biblio_common::{
    AuthorRow, Capability, EditionRow, EnrichmentError, ExternalIdMappingRow, Isbn13, Tier, WorkAuthorRow, WorkKey, WorkRow,
};
use biblio_persistence::LocalEnrichmentRepository;
use biblio_registry::{
    BatchMetadataFetcher, BookCandidate, BookGenerator, CoverFetcher, CoverResult, EditionVariant,
    EditionVariantFetcher, ExternalIdFetcher, ExternalIdResult, IsbnResolution, IsbnResolver, Metadata,
    MetadataFetcher, Provider, ProviderContext, RatingResult, RatingsFetcher, SubjectFetcher,
};

/// What a [`FakeProvider`] does when a capability method is invoked:
/// succeed after an artificial delay, or fail outright. Mirrors the
/// `Attempt::Success`/`Attempt::Failed` split one level up, before
/// `try_provider` gets to apply its own timeout race.
#[derive(Clone)]
pub enum Script<T> {
    Succeed { value: T, delay: Duration },
    Fail { reason: String, delay: Duration },
}

impl<T: Clone> Script<T> {
    pub fn now(value: T) -> Self {
        Script::Succeed { value, delay: Duration::ZERO }
    }

    pub fn after(value: T, delay: Duration) -> Self {
        Script::Succeed { value, delay }
    }

    pub fn fails(reason: impl Into<String>) -> Self {
        Script::Fail { reason: reason.into(), delay: Duration::ZERO }
    }

    async fn run(&self) -> Result<T, EnrichmentError> {
        match self {
            Script::Succeed { value, delay } => {
                if !delay.is_zero() {
                    tokio::time::sleep(*delay).await;
                }
                Ok(value.clone())
            }
            Script::Fail { reason, delay } => {
                if !delay.is_zero() {
                    tokio::time::sleep(*delay).await;
                }
                Err(EnrichmentError::ProviderError {
                    provider: "fake".to_string(),
                    message: reason.clone(),
                })
            }
        }
    }
}

/// A provider whose capability responses are scripted per test, in place of
/// a real adapter's HTTP call. Always available unless `unavailable` is
/// set, so tests exercising availability gating do so explicitly.
pub struct FakeProvider {
    name: String,
    tier: Tier,
    caps: HashSet<Capability>,
    unavailable: bool,
    isbn_resolution: Option<Script<Option<IsbnResolution>>>,
    cover: Option<Script<Option<CoverResult>>>,
    metadata: Option<Script<Option<Metadata>>>,
    subjects: Option<Script<Vec<String>>>,
    books: Option<Script<Vec<BookCandidate>>>,
    edition_variants: Option<Script<Vec<EditionVariant>>>,
    external_ids: Option<Script<Vec<ExternalIdResult>>>,
    ratings: Option<Script<Option<RatingResult>>>,
    batch_metadata: Option<Script<HashMap<Isbn13, Metadata>>>,
}

impl FakeProvider {
    pub fn new(name: impl Into<String>, tier: Tier) -> Self {
        Self {
            name: name.into(),
            tier,
            caps: HashSet::new(),
            unavailable: false,
            isbn_resolution: None,
            cover: None,
            metadata: None,
            subjects: None,
            books: None,
            edition_variants: None,
            external_ids: None,
            ratings: None,
            batch_metadata: None,
        }
    }

    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub fn with_isbn_resolution(mut self, script: Script<Option<IsbnResolution>>) -> Self {
        self.caps.insert(Capability::IsbnResolution);
        self.isbn_resolution = Some(script);
        self
    }

    pub fn with_cover(mut self, script: Script<Option<CoverResult>>) -> Self {
        self.caps.insert(Capability::CoverImages);
        self.cover = Some(script);
        self
    }

    pub fn with_metadata(mut self, script: Script<Option<Metadata>>) -> Self {
        self.caps.insert(Capability::MetadataEnrichment);
        self.metadata = Some(script);
        self
    }

    pub fn with_subjects(mut self, script: Script<Vec<String>>) -> Self {
        self.caps.insert(Capability::SubjectEnrichment);
        self.subjects = Some(script);
        self
    }

    pub fn with_books(mut self, script: Script<Vec<BookCandidate>>) -> Self {
        self.caps.insert(Capability::BookGeneration);
        self.books = Some(script);
        self
    }

    pub fn with_edition_variants(mut self, script: Script<Vec<EditionVariant>>) -> Self {
        self.caps.insert(Capability::EditionVariants);
        self.edition_variants = Some(script);
        self
    }

    pub fn with_external_ids(mut self, script: Script<Vec<ExternalIdResult>>) -> Self {
        self.caps.insert(Capability::EnhancedExternalIds);
        self.external_ids = Some(script);
        self
    }

    pub fn with_ratings(mut self, script: Script<Option<RatingResult>>) -> Self {
        self.caps.insert(Capability::Ratings);
        self.ratings = Some(script);
        self
    }

    pub fn with_batch_metadata(mut self, script: Script<HashMap<Isbn13, Metadata>>) -> Self {
        self.batch_metadata = Some(script);
        self
    }
}

#[async_trait]
impl Provider for FakeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn tier(&self) -> Tier {
        self.tier
    }

    fn capabilities(&self) -> &HashSet<Capability> {
        &self.caps
    }

    async fn is_available(&self, _ctx: &ProviderContext) -> bool {
        !self.unavailable
    }
}

#[async_trait]
impl IsbnResolver for FakeProvider {
    async fn resolve_isbn(
        &self,
        _title: &str,
        _author: &str,
        _ctx: &ProviderContext,
    ) -> Result<Option<IsbnResolution>, EnrichmentError> {
        self.isbn_resolution
            .as_ref()
            .expect("resolve_isbn called on a provider with no isbn_resolution script")
            .run()
            .await
    }
}

#[async_trait]
impl CoverFetcher for FakeProvider {
    async fn fetch_cover(&self, _isbn: &Isbn13, _ctx: &ProviderContext) -> Result<Option<CoverResult>, EnrichmentError> {
        self.cover.as_ref().expect("fetch_cover called on a provider with no cover script").run().await
    }
}

#[async_trait]
impl MetadataFetcher for FakeProvider {
    async fn fetch_metadata(&self, _isbn: &Isbn13, _ctx: &ProviderContext) -> Result<Option<Metadata>, EnrichmentError> {
        self.metadata
            .as_ref()
            .expect("fetch_metadata called on a provider with no metadata script")
            .run()
            .await
    }
}

#[async_trait]
impl SubjectFetcher for FakeProvider {
    async fn fetch_subjects(&self, _isbn: &Isbn13, _ctx: &ProviderContext) -> Result<Vec<String>, EnrichmentError> {
        self.subjects
            .as_ref()
            .expect("fetch_subjects called on a provider with no subjects script")
            .run()
            .await
    }
}

#[async_trait]
impl BookGenerator for FakeProvider {
    async fn generate_books(
        &self,
        _prompt: &str,
        _count: u32,
        _ctx: &ProviderContext,
    ) -> Result<Vec<BookCandidate>, EnrichmentError> {
        self.books.as_ref().expect("generate_books called on a provider with no books script").run().await
    }
}

#[async_trait]
impl EditionVariantFetcher for FakeProvider {
    async fn fetch_edition_variants(
        &self,
        _isbn: &Isbn13,
        _ctx: &ProviderContext,
    ) -> Result<Vec<EditionVariant>, EnrichmentError> {
        self.edition_variants
            .as_ref()
            .expect("fetch_edition_variants called on a provider with no edition_variants script")
            .run()
            .await
    }
}

#[async_trait]
impl ExternalIdFetcher for FakeProvider {
    async fn fetch_external_ids(
        &self,
        _isbn: &Isbn13,
        _ctx: &ProviderContext,
    ) -> Result<Vec<ExternalIdResult>, EnrichmentError> {
        self.external_ids
            .as_ref()
            .expect("fetch_external_ids called on a provider with no external_ids script")
            .run()
            .await
    }
}

#[async_trait]
impl RatingsFetcher for FakeProvider {
    async fn fetch_ratings(&self, _isbn: &Isbn13, _ctx: &ProviderContext) -> Result<Option<RatingResult>, EnrichmentError> {
        self.ratings.as_ref().expect("fetch_ratings called on a provider with no ratings script").run().await
    }
}

#[async_trait]
impl BatchMetadataFetcher for FakeProvider {
    async fn fetch_metadata_batch(
        &self,
        isbns: &[Isbn13],
        _ctx: &ProviderContext,
    ) -> Result<HashMap<Isbn13, Metadata>, EnrichmentError> {
        let _ = isbns;
        self.batch_metadata
            .as_ref()
            .expect("fetch_metadata_batch called on a provider with no batch_metadata script")
            .run()
            .await
    }
}

/// Case-sensitive union preserving `existing`'s order, then any new
/// entries from `incoming` — mirrors the real repository's
/// `ARRAY(SELECT DISTINCT unnest(...))` upsert clause closely enough for
/// test assertions without needing SQL.
fn union_dedup(existing: &[String], incoming: &[String]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut out = Vec::with_capacity(existing.len() + incoming.len());
    for item in existing.iter().chain(incoming.iter()) {
        if seen.insert(item.as_str()) {
            out.push(item.clone());
        }
    }
    out
}

/// In-process stand-in for [`biblio_persistence::PgEnrichmentRepository`],
/// keyed the same way the real tables are (`work_key`, `isbn`), so tests can
/// assert on what a consumer or orchestrator persisted without a live
/// Postgres instance.
#[derive(Default)]
pub struct InMemoryEnrichmentRepository {
    works: Mutex<HashMap<WorkKey, WorkRow>>,
    editions: Mutex<HashMap<String, EditionRow>>,
    authors: Mutex<HashMap<String, AuthorRow>>,
    external_ids: Mutex<Vec<ExternalIdMappingRow>>,
}

impl InMemoryEnrichmentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn work(&self, work_key: &WorkKey) -> Option<WorkRow> {
        self.works.lock().expect("repository lock poisoned").get(work_key).cloned()
    }

    pub fn edition(&self, isbn: &Isbn13) -> Option<EditionRow> {
        self.editions.lock().expect("repository lock poisoned").get(isbn.as_str()).cloned()
    }

    pub fn work_count(&self) -> usize {
        self.works.lock().expect("repository lock poisoned").len()
    }

    pub fn edition_count(&self) -> usize {
        self.editions.lock().expect("repository lock poisoned").len()
    }
}

impl LocalEnrichmentRepository for InMemoryEnrichmentRepository {
    async fn enrich_work(&self, work: &WorkRow) -> Result<(), EnrichmentError> {
        let mut works = self.works.lock().expect("repository lock poisoned");
        let mut merged = work.clone();
        if let Some(existing) = works.get(&work.work_key) {
            merged.subtitle = existing.subtitle.clone().or(merged.subtitle);
            merged.description = existing.description.clone().or(merged.description);
            merged.original_language = existing.original_language.clone().or(merged.original_language);
            merged.first_publication_year = existing.first_publication_year.or(merged.first_publication_year);
            merged.cover_url_large = merged.cover_url_large.clone().or(existing.cover_url_large.clone());
            merged.cover_url_medium = merged.cover_url_medium.clone().or(existing.cover_url_medium.clone());
            merged.cover_url_small = merged.cover_url_small.clone().or(existing.cover_url_small.clone());
            merged.primary_provider = existing.primary_provider.clone().or(merged.primary_provider);
            merged.subjects = union_dedup(&existing.subjects, &merged.subjects);
            merged.cross_provider_ids = union_dedup(&existing.cross_provider_ids, &merged.cross_provider_ids);
            merged.contributors = union_dedup(&existing.contributors, &merged.contributors);
        }
        works.insert(work.work_key, merged);
        Ok(())
    }

    async fn enrich_edition(&self, edition: &EditionRow) -> Result<(), EnrichmentError> {
        self.editions
            .lock()
            .expect("repository lock poisoned")
            .insert(edition.isbn.as_str().to_string(), edition.clone());
        Ok(())
    }

    async fn work_key_for_isbn(&self, isbn: &Isbn13) -> Result<Option<WorkKey>, EnrichmentError> {
        Ok(self
            .editions
            .lock()
            .expect("repository lock poisoned")
            .get(isbn.as_str())
            .map(|e| e.work_key))
    }

    async fn enrich_author(&self, author: &AuthorRow) -> Result<(), EnrichmentError> {
        self.authors
            .lock()
            .expect("repository lock poisoned")
            .insert(author.author_key.to_string(), author.clone());
        Ok(())
    }

    async fn link_work_authors(&self, _work_key: WorkKey, _links: &[WorkAuthorRow]) -> Result<(), EnrichmentError> {
        Ok(())
    }

    async fn upsert_external_ids(&self, mappings: &[ExternalIdMappingRow]) -> Result<(), EnrichmentError> {
        self.external_ids.lock().expect("repository lock poisoned").extend_from_slice(mappings);
        Ok(())
    }

    async fn update_edition_cover_urls(
        &self,
        isbn: &Isbn13,
        large: &str,
        medium: &str,
        small: &str,
    ) -> Result<(), EnrichmentError> {
        let mut editions = self.editions.lock().expect("repository lock poisoned");
        if let Some(edition) = editions.get_mut(isbn.as_str()) {
            edition.cover_url_large = Some(large.to_string());
            edition.cover_url_medium = Some(medium.to_string());
            edition.cover_url_small = Some(small.to_string());
        }
        Ok(())
    }
}
