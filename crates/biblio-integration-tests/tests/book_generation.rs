//! Two AI providers return the same title concurrently;
//! fuzzy dedup at the default-adjacent threshold collapses them to one.

use std::sync::Arc;

use biblio_common::Tier;
use biblio_integration_tests::{FakeProvider, Script};
use biblio_orchestrators::{BookGenerationConfig, BookGenerationOrchestrator};
use biblio_registry::{BookCandidate, ProviderRegistry, Registration};

fn midnight_library(source: &str, confidence: u8) -> BookCandidate {
    BookCandidate {
        title: "The Midnight Library".to_string(),
        author: "Matt Haig".to_string(),
        publish_date: None,
        confidence,
        source: source.to_string(),
    }
}

#[tokio::test]
async fn concurrent_generation_dedups_identical_titles() {
    let gemini = Arc::new(
        FakeProvider::new("gemini", Tier::Ai).with_books(Script::now(vec![midnight_library("gemini", 80)])),
    );
    let xai = Arc::new(FakeProvider::new("xai", Tier::Ai).with_books(Script::now(vec![midnight_library("xai", 75)])));

    let registry = Arc::new(
        ProviderRegistry::builder()
            .register(Registration::new(gemini.clone()).with_book_generator(gemini))
            .register(Registration::new(xai.clone()).with_book_generator(xai))
            .build(),
    );

    let config = BookGenerationConfig {
        similarity_threshold: 0.6,
        ..BookGenerationConfig::default()
    };
    let orchestrator = BookGenerationOrchestrator::new(registry, config);

    let result = orchestrator.generate("books about a library between life and death", 1).await;

    assert_eq!(result.candidates.len(), 1);
    assert_eq!(result.candidates[0].title, "The Midnight Library");

    let duplicates_removed = result.providers_attempted.len().saturating_sub(result.candidates.len());
    assert_eq!(duplicates_removed, 1);
}
