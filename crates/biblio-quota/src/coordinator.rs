//! The Quota Coordinator: a shared counter bounding paid-provider usage
//! across all concurrent consumers, with a daily reset and fail-closed
//! semantics.

use std::sync::Arc;

use biblio_common::config::QuotaConfig;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::store::{QuotaStore, QuotaStoreError};

/// The caller class governs which specialised admission rule applies on top
/// of the general `used + n <= safety_limit` bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerClass {
    /// Requires double headroom: `safety_remaining >= 2n`.
    Cron,
    /// Rejected outright if `n > 100`, regardless of remaining budget.
    BulkAuthor,
    /// No extra rule beyond the general bound.
    BatchDirect,
    /// No extra rule beyond the general bound.
    NewReleases,
}

/// Snapshot returned by `status()`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QuotaStatus {
    pub used: i64,
    pub remaining: i64,
    pub safety_remaining: i64,
    pub can_call: bool,
    pub reset_at: NaiveDate,
}

/// Result of `check()`/`reserve()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaCheckResult {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl QuotaCheckResult {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Process-wide coordinator for one provider's daily quota. Constructed
/// once at startup with an injected store; there is no ambient global
/// instance for callers to reach for.
pub struct QuotaCoordinator {
    provider_id: String,
    config: QuotaConfig,
    store: Arc<dyn QuotaStore>,
}

impl QuotaCoordinator {
    pub fn new(provider_id: impl Into<String>, config: QuotaConfig, store: Arc<dyn QuotaStore>) -> Self {
        Self {
            provider_id: provider_id.into(),
            config,
            store,
        }
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    /// `status() → {used, remaining, safety_remaining, can_call, reset_at}`.
    /// On store failure, falls back to conservative zero-usage (display
    /// only) rather than erroring.
    pub async fn status(&self) -> QuotaStatus {
        let today = Self::today();
        match self.store.read_state(&self.provider_id, today).await {
            Ok(state) => {
                let safety_remaining = self.config.safety_limit() - state.used;
                QuotaStatus {
                    used: state.used,
                    remaining: self.config.hard_limit - state.used,
                    safety_remaining,
                    can_call: safety_remaining > 0,
                    reset_at: today,
                }
            }
            Err(e) => {
                warn!(error = %e, "quota store unavailable, falling back to conservative zero-usage status");
                QuotaStatus {
                    used: 0,
                    remaining: self.config.hard_limit,
                    safety_remaining: self.config.safety_limit(),
                    can_call: false,
                    reset_at: today,
                }
            }
        }
    }

    /// `check(n, reserve) → {allowed, reason?}`.
    pub async fn check(&self, n: i64, class: CallerClass, reserve: bool) -> QuotaCheckResult {
        if n == 0 {
            return QuotaCheckResult::allow();
        }

        if let CallerClass::BulkAuthor = class {
            if n > 100 {
                return QuotaCheckResult::deny("bulk_author requests capped at 100 units");
            }
        }

        let today = Self::today();
        let safety_limit = self.config.safety_limit();

        // `cron` needs double headroom: read first, then reserve only if
        // the stricter bound also passes, to avoid a race where the plain
        // bound passes but the doubled one wouldn't have.
        if let CallerClass::Cron = class {
            let state = match self.store.read_state(&self.provider_id, today).await {
                Ok(s) => s,
                Err(e) => {
                    warn!(error = %e, "quota store unavailable, fail-closed");
                    return QuotaCheckResult::deny("quota store unavailable");
                }
            };
            let safety_remaining = safety_limit - state.used;
            if safety_remaining < 2 * n {
                return QuotaCheckResult::deny(format!(
                    "cron requires safety_remaining >= {} (have {})",
                    2 * n,
                    safety_remaining
                ));
            }
        }

        match self
            .store
            .check_and_reserve(&self.provider_id, today, n, safety_limit, reserve)
            .await
        {
            Ok(outcome) if outcome.allowed => {
                debug!(n, used_after = outcome.used_after, "quota reserved");
                QuotaCheckResult::allow()
            }
            Ok(outcome) => QuotaCheckResult::deny(format!(
                "would exceed safety_limit ({} + {} > {})",
                outcome.used_after, n, safety_limit
            )),
            Err(e) => {
                warn!(error = %e, "quota store unavailable, fail-closed");
                QuotaCheckResult::deny("quota store unavailable")
            }
        }
    }

    /// `reserve(n) → bool`: shorthand for `check(n, true)`.
    pub async fn reserve(&self, n: i64, class: CallerClass) -> bool {
        self.check(n, class, true).await.allowed
    }

    /// `record(n)`: unconditional post-hoc increment, best-effort.
    pub async fn record(&self, n: i64) {
        let today = Self::today();
        if let Err(e) = self.store.record(&self.provider_id, today, n).await {
            warn!(error = %e, n, "failed to record quota usage (best-effort)");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryQuotaStore;

    fn coordinator() -> QuotaCoordinator {
        QuotaCoordinator::new(
            "paid-metadata",
            QuotaConfig::default(),
            Arc::new(InMemoryQuotaStore::new()),
        )
    }

    #[tokio::test]
    async fn reserve_safety_limit_then_one_more_fails() {
        let coord = coordinator();
        let safety_limit = coord.config.safety_limit();

        assert!(coord.reserve(safety_limit, CallerClass::BatchDirect).await);
        assert!(!coord.reserve(1, CallerClass::BatchDirect).await);
    }

    #[tokio::test]
    async fn reserve_zero_always_succeeds_without_mutation() {
        let coord = coordinator();
        assert!(coord.reserve(0, CallerClass::BatchDirect).await);
        let status = coord.status().await;
        assert_eq!(status.used, 0);
    }

    #[tokio::test]
    async fn bulk_author_rejects_over_100() {
        let coord = coordinator();
        let result = coord.check(101, CallerClass::BulkAuthor, true).await;
        assert!(!result.allowed);
    }

    #[tokio::test]
    async fn cron_requires_double_headroom() {
        let coord = coordinator();
        // used_today = 12800 => safety_remaining = 200.
        coord.record(12_800).await;

        let cron_result = coord.check(150, CallerClass::Cron, true).await;
        assert!(!cron_result.allowed, "cron needs 300, only 200 remain");

        let batch_result = coord.check(150, CallerClass::BatchDirect, true).await;
        assert!(batch_result.allowed);
    }

    #[tokio::test]
    async fn status_reports_can_call_false_when_exhausted() {
        let coord = coordinator();
        let safety_limit = coord.config.safety_limit();
        coord.record(safety_limit).await;

        let status = coord.status().await;
        assert!(!status.can_call);
        assert_eq!(status.safety_remaining, 0);
    }
}
