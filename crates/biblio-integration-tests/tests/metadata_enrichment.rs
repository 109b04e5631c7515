//! Parallel metadata + subject-only fetch, merged with the
//! longest-description and case-insensitive-union-of-subjects rules.

use std::sync::Arc;
use std::time::Duration;

use biblio_common::{Isbn13, Tier};
use biblio_integration_tests::{FakeProvider, Script};
use biblio_orchestrators::{MetadataEnrichmentConfig, MetadataEnrichmentOrchestrator};
use biblio_registry::{Metadata, ProviderRegistry, Registration};

#[tokio::test]
async fn merges_descriptions_and_subjects_across_providers() {
    let p1 = Arc::new(FakeProvider::new("p1", Tier::Free).with_metadata(Script::now(Some(Metadata {
        description: Some("a".repeat(40)),
        subjects: vec!["World War II".to_string(), "History".to_string()],
        ..Metadata::default()
    }))));
    let p2 = Arc::new(FakeProvider::new("p2", Tier::Free).with_metadata(Script::now(Some(Metadata {
        description: Some("b".repeat(200)),
        subjects: vec!["Biography".to_string(), "Churchill".to_string()],
        ..Metadata::default()
    }))));
    let s1 = Arc::new(FakeProvider::new("s1", Tier::Free).with_subjects(Script::now(vec![
        "World War II".to_string(),
        "London".to_string(),
        "Blitz".to_string(),
    ])));

    let registry = Arc::new(
        ProviderRegistry::builder()
            .register(Registration::new(p1.clone()).with_metadata_fetcher(p1))
            .register(Registration::new(p2.clone()).with_metadata_fetcher(p2))
            .register(Registration::new(s1.clone()).with_subject_fetcher(s1))
            .build(),
    );

    let orchestrator = MetadataEnrichmentOrchestrator::new(registry, MetadataEnrichmentConfig::default());
    let isbn = Isbn13::normalize("9780385544153").unwrap();
    let result = orchestrator.enrich(&isbn).await;

    let metadata = result.metadata.expect("at least one provider succeeded");
    assert_eq!(metadata.description.as_ref().map(|d| d.len()), Some(200));
    assert_eq!(
        metadata.subjects,
        vec!["World War II", "History", "Biography", "Churchill", "London", "Blitz"]
    );

    assert_eq!(result.metadata_providers.len(), 2);
    assert!(result.metadata_providers.contains(&"p1".to_string()));
    assert!(result.metadata_providers.contains(&"p2".to_string()));
    assert_eq!(result.subject_providers, vec!["s1".to_string()]);
}

/// Scalar "first non-null wins" must follow registration/priority order,
/// not `FuturesUnordered` completion order. The lower-priority provider
/// (`free-slow`) is made to resolve first; the higher-priority provider
/// (`paid-fast`) must still win the title.
#[tokio::test]
async fn scalar_merge_follows_priority_order_not_completion_order() {
    let paid_fast = Arc::new(FakeProvider::new("paid-fast", Tier::Paid).with_metadata(Script::after(
        Some(Metadata {
            title: Some("Priority Title".to_string()),
            ..Metadata::default()
        }),
        Duration::from_millis(40),
    )));
    let free_slow = Arc::new(FakeProvider::new("free-slow", Tier::Free).with_metadata(Script::now(Some(Metadata {
        title: Some("Completed First Title".to_string()),
        ..Metadata::default()
    }))));

    let registry = Arc::new(
        ProviderRegistry::builder()
            .register(Registration::new(paid_fast.clone()).with_metadata_fetcher(paid_fast))
            .register(Registration::new(free_slow.clone()).with_metadata_fetcher(free_slow))
            .build(),
    );

    let orchestrator = MetadataEnrichmentOrchestrator::new(registry, MetadataEnrichmentConfig::default());
    let isbn = Isbn13::normalize("9780385544153").unwrap();
    let result = orchestrator.enrich(&isbn).await;

    let metadata = result.metadata.expect("at least one provider succeeded");
    assert_eq!(
        metadata.title,
        Some("Priority Title".to_string()),
        "the paid provider is higher priority and must win even though the free provider resolved first"
    );
}
