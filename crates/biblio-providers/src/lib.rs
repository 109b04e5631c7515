//! Concrete provider adapters: a quota-protected paid metadata
//! service, two free services, an archive-style provider, and two AI
//! generation backends. Each implements `biblio_registry::Provider` plus
//! whichever capability sub-traits its upstream API supports.

mod ai_generator;
mod archive;
mod http_util;
mod open_catalog;
mod paid_metadata;
mod work_graph;

pub use ai_generator::{GeminiGeneratorAdapter, GeneratorEndpoint, XaiGeneratorAdapter};
pub use archive::{ArchiveAdapter, ArchiveConfig};
pub use http_util::{classify_http_error, classify_status, outcome_to_error, AttemptOutcome};
pub use open_catalog::{OpenCatalogAdapter, OpenCatalogConfig};
pub use paid_metadata::{PaidMetadataAdapter, PaidMetadataConfig};
pub use work_graph::{WorkGraphAdapter, WorkGraphConfig};
