//! PostgreSQL persistence for Works, Editions, Authors, and the external-ID
//! crosswalk.

mod queries;
mod repository;

pub use queries::{EngineStats, ExternalIdCrosswalkRow, PgQueryRepository, WorkSearchRow};
pub use repository::{EnrichmentRepository, LocalEnrichmentRepository, PgEnrichmentRepository};
