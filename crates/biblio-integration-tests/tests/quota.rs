//! A cron-class caller needs double headroom and is
//! denied once safety_remaining drops below `2n`, while a batch_direct
//! caller asking for the same `n` is still allowed.

use std::sync::Arc;

use biblio_common::config::QuotaConfig;
use biblio_quota::{CallerClass, QuotaCoordinator};
use biblio_quota::InMemoryQuotaStore;

#[tokio::test]
async fn cron_denied_batch_direct_allowed_at_same_headroom() {
    let coordinator = QuotaCoordinator::new(
        "paid-metadata",
        QuotaConfig::default(),
        Arc::new(InMemoryQuotaStore::new()),
    );

    // used_today = 12800 => safety_remaining = 200 (default hard_limit
    // 15000, buffer 2000).
    coordinator.record(12_800).await;

    let cron_result = coordinator.check(150, CallerClass::Cron, true).await;
    assert!(!cron_result.allowed, "cron needs safety_remaining >= 300, only 200 remain");

    let batch_result = coordinator.check(150, CallerClass::BatchDirect, true).await;
    assert!(batch_result.allowed);
}
