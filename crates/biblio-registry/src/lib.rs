//! Provider registry and capability dispatch.
//!
//! Defines the closed set of capability traits a metadata/cover/generation
//! adapter can implement, and the immutable registry that indexes
//! registered providers by capability and filters them by live
//! availability. Concrete adapters live in `biblio-providers`; orchestrators
//! (in `biblio-orchestrators`) depend only on this crate, never on adapters
//! directly.

mod provider;
mod registry;
mod types;

pub use provider::{
    BatchMetadataFetcher, BookGenerator, CoverFetcher, EditionVariantFetcher, ExternalIdFetcher,
    IsbnResolver, MetadataFetcher, Provider, ProviderContext, RatingsFetcher, Registration,
    SubjectFetcher,
};
pub use registry::{ProviderRegistry, ProviderRegistryBuilder, RegistryStats};
pub use types::{
    BookCandidate, CoverResult, CoverSize, EditionVariant, ExternalIdResult, IsbnResolution,
    Metadata, RatingResult,
};
