//! Fallback ISBN resolution skips a failing paid provider
//! and returns the first free provider's result.

use std::sync::Arc;

use biblio_common::Isbn13;
use biblio_common::Tier;
use biblio_integration_tests::{FakeProvider, Script};
use biblio_orchestrators::{IsbnResolutionConfig, IsbnResolutionOrchestrator};
use biblio_registry::{IsbnResolution, ProviderRegistry, Registration};

#[tokio::test]
async fn fallback_resolution_skips_failing_paid_and_returns_free_result() {
    let paid = Arc::new(
        FakeProvider::new("paid", Tier::Paid).with_isbn_resolution(Script::fails("paid service unavailable")),
    );
    let free_a = Arc::new(FakeProvider::new("free-A", Tier::Free).with_isbn_resolution(Script::now(Some(
        IsbnResolution {
            isbn: Isbn13::normalize("9780385544153").unwrap(),
            confidence: 85,
        },
    ))));

    let registry = Arc::new(
        ProviderRegistry::builder()
            .register(Registration::new(paid.clone()).with_isbn_resolver(paid))
            .register(Registration::new(free_a.clone()).with_isbn_resolver(free_a))
            .build(),
    );

    let orchestrator = IsbnResolutionOrchestrator::new(registry, IsbnResolutionConfig::default());
    let result = orchestrator.resolve("The Splendid and the Vile", "Erik Larson").await;

    assert_eq!(result.isbn.as_ref().map(|i| i.as_str()), Some("9780385544153"));
    assert_eq!(result.confidence, 85);
    assert_eq!(result.source, "free-A");

    let paid_attempt = result.attempts.iter().find(|a| a.provider == "paid").expect("paid attempt recorded");
    assert!(!paid_attempt.success);
    assert!(result.outcome.success);
}
