//! Orchestrators: policy objects parameterized by the provider
//! registry and a configuration record, never by concrete adapters.
//! Shares one `try_provider` skeleton (timeout + cancellation) and a set
//! of free merge functions reused by the aggregate-mode orchestrators.

mod book_generation;
mod cover_fetch;
mod edition_variants;
mod external_ids;
mod isbn_resolution;
mod merge;
mod metadata_enrichment;
mod ordering;
mod ratings;
mod try_provider;

pub use book_generation::{BookGenerationConfig, BookGenerationMode, BookGenerationOrchestrator, BookGenerationResult};
pub use cover_fetch::{CoverFetchConfig, CoverFetchOrchestrator, CoverFetchResult};
pub use edition_variants::{EditionVariantsConfig, EditionVariantsOrchestrator, EditionVariantsResult, MergedEditionVariant};
pub use external_ids::{ExternalIdsConfig, ExternalIdsMode, ExternalIdsOrchestrator, ExternalIdsResult};
pub use isbn_resolution::{IsbnResolutionConfig, IsbnResolutionOrchestrator, IsbnResolutionResult};
pub use merge::{dedup_generated_titles, first_non_null, longest_non_empty, merge_external_ids, merge_subjects, normalize_title, MergedExternalId};
pub use metadata_enrichment::{MetadataEnrichmentConfig, MetadataEnrichmentOrchestrator, MetadataEnrichmentResult};
pub use ordering::order_providers;
pub use ratings::{RatingsConfig, RatingsMode, RatingsOrchestrator, RatingsResult};
pub use try_provider::try_provider;
