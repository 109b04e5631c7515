//! A slow cover provider is cancelled at the configured
//! per-provider timeout and reported as a timeout, while a fast free
//! provider's URL still wins the fallback chain well under 5 seconds.

use std::sync::Arc;
use std::time::{Duration, Instant};

use biblio_common::{Isbn13, Tier};
use biblio_integration_tests::{FakeProvider, Script};
use biblio_orchestrators::{CoverFetchConfig, CoverFetchOrchestrator};
use biblio_registry::{CoverResult, CoverSize, ProviderRegistry, Registration};

#[tokio::test]
async fn slow_paid_cover_times_out_and_free_cover_wins() {
    // `CoverFetchOrchestrator` ranks free-tier ahead of paid-tier (stable
    // sort) regardless of which provider's availability probe resolves
    // first, so `slow_cover` is given the Free tier here to pin it ahead
    // of `free_cover` deterministically — the names track the scenario's
    // narrative (a slow provider vs. a fast one), not the tier label.
    let slow_cover = Arc::new(
        FakeProvider::new("slow-cover", Tier::Free).with_cover(Script::after(
            Some(CoverResult {
                url: "https://paid.example.com/cover.jpg".to_string(),
                size: CoverSize::Unspecified,
            }),
            Duration::from_secs(15),
        )),
    );
    let free_cover = Arc::new(FakeProvider::new("free-cover", Tier::Paid).with_cover(Script::now(Some(
        CoverResult {
            url: "https://openlibrary.org/cover.jpg".to_string(),
            size: CoverSize::Large,
        },
    ))));

    let registry = Arc::new(
        ProviderRegistry::builder()
            .register(Registration::new(slow_cover.clone()).with_cover_fetcher(slow_cover))
            .register(Registration::new(free_cover.clone()).with_cover_fetcher(free_cover))
            .build(),
    );

    let config = CoverFetchConfig {
        per_provider_timeout: Duration::from_millis(1000),
    };
    let orchestrator = CoverFetchOrchestrator::new(registry, config);

    let isbn = Isbn13::normalize("9780385544153").unwrap();
    let started = Instant::now();
    let result = orchestrator.fetch(&isbn).await;
    let elapsed = started.elapsed();

    assert_eq!(result.cover.as_ref().map(|c| c.url.as_str()), Some("https://openlibrary.org/cover.jpg"));
    assert!(elapsed < Duration::from_secs(5), "expected fallback well under 5s, took {elapsed:?}");

    let slow_attempt = result.attempts.iter().find(|a| a.provider == "slow-cover").expect("slow-cover attempt recorded");
    assert_eq!(slow_attempt.error.as_deref(), Some("Provider timeout (request cancelled)"));
}
