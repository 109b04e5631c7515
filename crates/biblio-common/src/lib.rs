//! # biblio-common
//!
//! Shared types and utilities for the book-enrichment engine.
//!
//! This crate provides foundational types used across every component of
//! the enrichment orchestration and queueing engine:
//! - `biblio-quota`: daily paid-provider call budget
//! - `biblio-registry` / `biblio-providers`: capability dispatch and adapters
//! - `biblio-orchestrators`: per-capability fallback/aggregate workflows
//! - `biblio-covers`: cover image pipeline
//! - `biblio-persistence`: transactional writes of works/editions/authors
//! - `biblio-queue`: batch queue consumers
//! - `biblio-scheduler`: cron-style backfill triggers
//! - `biblio-analytics`: fire-and-forget outcome recording

pub mod attempt;
pub mod error;
pub mod health;
pub mod identity;
pub mod kv;
pub mod model;

#[cfg(feature = "config")]
pub mod config;

pub use attempt::{Attempt, OrchestrationOutcome, ProviderAttemptRecord, QueueOutcome};
pub use error::{EnrichmentError, EnrichmentResult};
pub use health::{health_check, HealthResponse};
pub use identity::{AuthorKey, Capability, EntityType, Isbn13, Tier, WorkKey};
pub use kv::{get_json, set_json, InMemoryKvStore, KvStore, LocalKvStore};
#[cfg(feature = "redis")]
pub use kv::RedisKvStore;
pub use model::{
    AuthorRow, EditionRow, EnrichmentJob, ExternalIdMappingRow, JobEnvelope, Priority,
    ProviderRecord, WorkAuthorRow, WorkRow,
};

#[cfg(feature = "config")]
pub use config::{
    load_config, load_engine_config, BlobConfig, CacheConfig, DatabaseConfig, EngineConfig,
    ObservabilityConfig, QuotaConfig, QueueConfig, RedisConfig,
};
