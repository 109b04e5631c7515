//! # biblio-quota
//!
//! The Quota Coordinator: a shared, durable counter bounding
//! paid-provider usage across all concurrent consumers, with a daily UTC
//! reset and fail-closed semantics on any store failure.

pub mod coordinator;
pub mod store;

pub use coordinator::{CallerClass, QuotaCheckResult, QuotaCoordinator, QuotaStatus};
pub use store::{InMemoryQuotaStore, QuotaStore, QuotaStoreError, RawQuotaState, RedisQuotaStore};
