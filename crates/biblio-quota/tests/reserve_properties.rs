//! Property-based invariants for the quota reservation path.

use std::sync::Arc;

use biblio_common::config::QuotaConfig;
use biblio_quota::{CallerClass, InMemoryQuotaStore, QuotaCoordinator};
use proptest::prelude::*;

proptest! {
    /// For any sequence of `reserve(n_i)` operations, the sum of successful
    /// `n_i` on a given UTC day never exceeds `safety_limit`.
    #[test]
    fn sum_of_successful_reservations_never_exceeds_safety_limit(
        amounts in proptest::collection::vec(0i64..5_000, 1..20)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let config = QuotaConfig::default();
            let safety_limit = config.safety_limit();
            let coord = QuotaCoordinator::new(
                "paid-metadata",
                config,
                Arc::new(InMemoryQuotaStore::new()),
            );

            let mut accepted_total = 0i64;
            for n in amounts {
                if coord.reserve(n, CallerClass::BatchDirect).await {
                    accepted_total += n;
                }
            }

            prop_assert!(accepted_total <= safety_limit);
        });
    }
}
