//! Repeated `enrich_work` calls must union array fields rather
//! than overwrite them, and must not clobber a field already set by a
//! higher-tier source with a null from a later call.

use biblio_common::WorkKey;
use biblio_integration_tests::InMemoryEnrichmentRepository;
use biblio_persistence::EnrichmentRepository;

fn work(key: WorkKey, subjects: &[&str], contributors: &[&str]) -> biblio_common::WorkRow {
    let mut row = biblio_common::WorkRow::new(key, "The Splendid and the Vile");
    row.subjects = subjects.iter().map(|s| s.to_string()).collect();
    row.contributors = contributors.iter().map(|s| s.to_string()).collect();
    row
}

#[tokio::test]
async fn second_enrichment_unions_subjects_instead_of_overwriting() {
    let repo = InMemoryEnrichmentRepository::new();
    let key = WorkKey::new();

    repo.enrich_work(&work(key, &["World War II", "History"], &["Erik Larson"]))
        .await
        .unwrap();
    repo.enrich_work(&work(key, &["Biography", "World War II"], &["Erik Larson (US ed.)"]))
        .await
        .unwrap();

    let stored = repo.work(&key).expect("work persisted");
    assert_eq!(stored.subjects, vec!["World War II", "History", "Biography"]);
    assert_eq!(stored.contributors, vec!["Erik Larson", "Erik Larson (US ed.)"]);
}

#[tokio::test]
async fn second_enrichment_does_not_clobber_an_existing_scalar_with_null() {
    let repo = InMemoryEnrichmentRepository::new();
    let key = WorkKey::new();

    let mut first = work(key, &[], &[]);
    first.description = Some("a high-confidence description".to_string());
    repo.enrich_work(&first).await.unwrap();

    let second = work(key, &[], &[]);
    assert!(second.description.is_none());
    repo.enrich_work(&second).await.unwrap();

    let stored = repo.work(&key).expect("work persisted");
    assert_eq!(stored.description, Some("a high-confidence description".to_string()));
}
