//! A batch of 50 enrichment jobs is resolved with exactly
//! one paid-adapter batch call; the 2 ISBNs the adapter doesn't recognize
//! are cached as not-found and every message is still acked.

use std::collections::HashMap;
use std::sync::Arc;

use biblio_common::{EnrichmentJob, Isbn13, JobEnvelope, Tier};
use biblio_integration_tests::{FakeProvider, InMemoryEnrichmentRepository};
use biblio_persistence::EnrichmentRepository;
use biblio_queue::{EnrichmentQueueConsumer, InMemoryNotFoundCache, InMemoryQueueClient, InMemoryQueueProducer};
use biblio_registry::Metadata;

fn isbn_for(n: u32) -> Isbn13 {
    // A 12-digit "978" + zero-padded index prefix, plus whichever trailing
    // digit makes the EAN-13 checksum valid — exactly one digit 0-9 works.
    let prefix = format!("978{n:09}");
    for check in 0..10 {
        let candidate = format!("{prefix}{check}");
        if let Ok(isbn) = Isbn13::normalize(&candidate) {
            return isbn;
        }
    }
    panic!("no valid checksum found for index {n}");
}

#[tokio::test]
async fn batch_of_fifty_is_one_call_with_two_not_found() {
    let isbns: Vec<Isbn13> = (0..50).map(isbn_for).collect();
    let found: HashMap<Isbn13, Metadata> = isbns
        .iter()
        .take(48)
        .cloned()
        .map(|isbn| {
            (
                isbn.clone(),
                Metadata {
                    title: Some(format!("Book {}", isbn.as_str())),
                    ..Metadata::default()
                },
            )
        })
        .collect();
    assert_eq!(found.len(), 48);

    let paid = Arc::new(FakeProvider::new("paid-metadata", Tier::Paid).with_batch_metadata(
        biblio_integration_tests::Script::now(found),
    ));

    let queue = Arc::new(InMemoryQueueClient::<JobEnvelope>::new("biblio:enrichment", "enrichment-consumers"));
    for isbn in &isbns {
        queue.push(JobEnvelope::new(EnrichmentJob::EnrichIsbn {
            isbn: isbn.as_str().to_string(),
            source: Some("batch_direct".to_string()),
        }));
    }
    let cover_producer = Arc::new(InMemoryQueueProducer::<JobEnvelope>::new());
    let repo_concrete = Arc::new(InMemoryEnrichmentRepository::new());
    let repository: Arc<dyn EnrichmentRepository> = repo_concrete.clone();
    let not_found_cache = Arc::new(InMemoryNotFoundCache::new());
    let analytics = Arc::new(biblio_analytics::AnalyticsEmitter::new(false));

    let consumer = EnrichmentQueueConsumer::new(
        queue.clone(),
        cover_producer,
        paid,
        repository,
        not_found_cache.clone(),
        analytics,
        50,
    );

    let received = consumer.run_once().await.unwrap();
    assert_eq!(received, 50);
    assert_eq!(queue.acked_ids().len(), 50);
    assert_eq!(repo_concrete.edition_count(), 48, "48 ISBNs found by the batch call should be persisted");

    for isbn in isbns.iter().take(48) {
        assert!(!not_found_cache.contains(isbn).await.unwrap(), "found ISBNs should not be cached as not-found");
    }
    for isbn in isbns.iter().skip(48) {
        assert!(not_found_cache.contains(isbn).await.unwrap(), "missing ISBN should be cached as not-found");
    }
}

/// Processing the same enrichment message twice must not
/// grow a second Work row for an ISBN already backing an Edition.
#[tokio::test]
async fn reprocessing_the_same_isbn_reuses_the_existing_work() {
    let isbn = isbn_for(0);
    let metadata = Metadata {
        title: Some("The Splendid and the Vile".to_string()),
        ..Metadata::default()
    };

    let mut found = HashMap::new();
    found.insert(isbn.clone(), metadata.clone());

    let repo_concrete = Arc::new(InMemoryEnrichmentRepository::new());
    let repository: Arc<dyn EnrichmentRepository> = repo_concrete.clone();
    let not_found_cache = Arc::new(InMemoryNotFoundCache::new());
    let cover_producer = Arc::new(InMemoryQueueProducer::<JobEnvelope>::new());
    let analytics = Arc::new(biblio_analytics::AnalyticsEmitter::new(false));

    let mut work_keys_per_pass = Vec::new();
    for _ in 0..2 {
        let paid = Arc::new(
            FakeProvider::new("paid-metadata", Tier::Paid)
                .with_batch_metadata(biblio_integration_tests::Script::now(found.clone())),
        );
        let queue = Arc::new(InMemoryQueueClient::<JobEnvelope>::new("biblio:enrichment", "enrichment-consumers"));
        queue.push(JobEnvelope::new(EnrichmentJob::EnrichIsbn {
            isbn: isbn.as_str().to_string(),
            source: Some("batch_direct".to_string()),
        }));

        let consumer = EnrichmentQueueConsumer::new(
            queue,
            cover_producer.clone(),
            paid,
            repository.clone(),
            not_found_cache.clone(),
            analytics.clone(),
            50,
        );
        consumer.run_once().await.unwrap();
        work_keys_per_pass.push(repo_concrete.edition(&isbn).expect("edition persisted").work_key);
    }

    assert_eq!(repo_concrete.edition_count(), 1);
    assert_eq!(repo_concrete.work_count(), 1, "second pass must reuse the first pass's work_key, not mint a new Work");
    assert_eq!(
        work_keys_per_pass[0], work_keys_per_pass[1],
        "the edition's work_key must be stable across reprocessing"
    );
}
