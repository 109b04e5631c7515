//! Composition root for the enrichment engine process: builds the shared
//! singletons (quota coordinator, provider registry, repository, blob
//! store), wires the two queue consumers and the scheduler, and exposes a
//! minimal `/healthz` + `/metrics` router. The full HTTP API is an
//! external collaborator; this crate only carries the operational surface
//! needed to run the process.

mod composition;
mod router;

pub use composition::{build_engine, Engine};
pub use router::{build_router, AppState};
