//! Enrichment Queue Consumer: one batch metadata call per poll,
//! Work-then-Edition upsert, derived cover job enqueue, not-found caching.

use std::sync::Arc;
use std::time::Instant;

use biblio_common::{EditionRow, EnrichmentError, EnrichmentJob, Isbn13, JobEnvelope, Priority, QueueOutcome, WorkKey, WorkRow};
use biblio_persistence::EnrichmentRepository;
use biblio_registry::{BatchMetadataFetcher, Metadata, ProviderContext};

use biblio_analytics::AnalyticsEmitter;

use crate::not_found_cache::NotFoundStore;
use crate::outcome::ConsumerOutcome;
use crate::queue_client::{MessageHandle, QueueClient, QueueProducer};

pub struct EnrichmentQueueConsumer {
    queue: Arc<dyn QueueClient<JobEnvelope>>,
    cover_producer: Arc<dyn QueueProducer<JobEnvelope>>,
    paid_metadata: Arc<dyn BatchMetadataFetcher>,
    repository: Arc<dyn EnrichmentRepository>,
    not_found_cache: Arc<dyn NotFoundStore>,
    analytics: Arc<AnalyticsEmitter>,
    batch_size: usize,
}

impl EnrichmentQueueConsumer {
    pub fn new(
        queue: Arc<dyn QueueClient<JobEnvelope>>,
        cover_producer: Arc<dyn QueueProducer<JobEnvelope>>,
        paid_metadata: Arc<dyn BatchMetadataFetcher>,
        repository: Arc<dyn EnrichmentRepository>,
        not_found_cache: Arc<dyn NotFoundStore>,
        analytics: Arc<AnalyticsEmitter>,
        batch_size: usize,
    ) -> Self {
        Self {
            queue,
            cover_producer,
            paid_metadata,
            repository,
            not_found_cache,
            analytics,
            batch_size,
        }
    }

    pub async fn run_once(&self) -> Result<usize, EnrichmentError> {
        let batch = self.queue.receive_batch(self.batch_size).await?;
        let received = batch.len();
        if batch.is_empty() {
            return Ok(0);
        }

        let mut decisions: Vec<(MessageHandle, ConsumerOutcome)> = Vec::with_capacity(received);
        let mut candidates: Vec<(MessageHandle, Isbn13)> = Vec::new();

        for message in batch {
            let isbn_raw = match &message.payload.job {
                EnrichmentJob::EnrichIsbn { isbn, .. } => isbn.clone(),
                other => {
                    tracing::warn!(?other, "enrichment queue received an unexpected job variant");
                    decisions.push((message.handle, ConsumerOutcome::AckNoRetry));
                    continue;
                }
            };

            let isbn = match Isbn13::normalize(&isbn_raw) {
                Ok(isbn) => isbn,
                Err(_) => {
                    decisions.push((message.handle, ConsumerOutcome::AckNoRetry));
                    continue;
                }
            };

            match self.not_found_cache.contains(&isbn).await {
                Ok(true) => decisions.push((message.handle, ConsumerOutcome::Ack)),
                Ok(false) => candidates.push((message.handle, isbn)),
                Err(err) => decisions.push((message.handle, ConsumerOutcome::Retry { reason: err.to_string() })),
            }
        }

        if !candidates.is_empty() {
            let started = Instant::now();
            let isbns: Vec<Isbn13> = candidates.iter().map(|(_, isbn)| isbn.clone()).collect();

            match self
                .paid_metadata
                .fetch_metadata_batch(&isbns, &ProviderContext::new())
                .await
            {
                Ok(records) => {
                    for (handle, isbn) in candidates {
                        let outcome = match records.get(&isbn) {
                            Some(metadata) => self.persist_and_enqueue_cover(&isbn, metadata).await,
                            None => {
                                if let Err(err) = self.not_found_cache.mark_not_found(&isbn).await {
                                    tracing::warn!(%err, isbn = %isbn, "failed to record not-found cache entry");
                                }
                                ConsumerOutcome::Ack
                            }
                        };
                        decisions.push((handle, outcome));
                    }
                    tracing::info!(batch_size = isbns.len(), "paid batch metadata call completed");
                    self.emit("batch", started);
                }
                Err(err) => {
                    for (handle, _isbn) in candidates {
                        decisions.push((handle, ConsumerOutcome::Retry { reason: err.to_string() }));
                    }
                }
            }
        }

        for (handle, outcome) in decisions {
            match outcome {
                ConsumerOutcome::Ack | ConsumerOutcome::AckNoRetry => {
                    if let Err(err) = self.queue.ack(&handle).await {
                        tracing::warn!(%err, "failed to ack enrichment message");
                    }
                }
                ConsumerOutcome::Retry { reason } => {
                    tracing::info!(reason, "retrying enrichment message");
                    if let Err(err) = self.queue.retry(&handle).await {
                        tracing::warn!(%err, "failed to mark enrichment message for retry");
                    }
                }
            }
        }

        Ok(received)
    }

    /// Upserts the Work then the Edition (FK order), then enqueues a cover
    /// job when the batch response carried a cover URL. Reuses the Work
    /// already backing this ISBN's Edition, if any, rather than minting a
    /// fresh key every time: otherwise reprocessing the same message would
    /// leave an orphan Work behind on every retry. No
    /// existing-Work lookup by title is attempted when the ISBN is new:
    /// it introduces its own Work.
    async fn persist_and_enqueue_cover(&self, isbn: &Isbn13, metadata: &Metadata) -> ConsumerOutcome {
        let work_key = match self.repository.work_key_for_isbn(isbn).await {
            Ok(Some(existing)) => existing,
            Ok(None) => WorkKey::new(),
            Err(err) => return ConsumerOutcome::Retry { reason: err.to_string() },
        };
        let title = metadata.title.clone().unwrap_or_else(|| isbn.to_string());

        let mut work = WorkRow::new(work_key, title.clone());
        work.subtitle = metadata.subtitle.clone();
        work.description = metadata.description.clone();
        work.subjects = metadata.subjects.clone();
        work.contributors = metadata.authors.clone();
        work.first_publication_year = metadata.publication_year;
        if let Some(cover_url) = &metadata.cover_url {
            work.cover_url_large = Some(cover_url.clone());
        }

        if let Err(err) = self.repository.enrich_work(&work).await {
            return ConsumerOutcome::Retry { reason: err.to_string() };
        }

        let mut edition = EditionRow::new(isbn.clone(), work_key, title);
        edition.publisher = metadata.publisher.clone();
        edition.page_count = metadata.page_count;
        edition.language = metadata.language.clone();

        if let Err(err) = self.repository.enrich_edition(&edition).await {
            return ConsumerOutcome::Retry { reason: err.to_string() };
        }

        if let Some(cover_url) = &metadata.cover_url {
            let job = EnrichmentJob::EnrichCover {
                isbn: isbn.as_str().to_string(),
                work_key: Some(work_key),
                provider_url: Some(cover_url.clone()),
                priority: Priority::Normal,
            };
            if let Err(err) = self.cover_producer.enqueue(&JobEnvelope::new(job)).await {
                tracing::warn!(%err, isbn = %isbn, "failed to enqueue derived cover job");
            }
        }

        ConsumerOutcome::Ack
    }

    fn emit(&self, outcome: &str, started: Instant) {
        self.analytics.record_queue_outcome(QueueOutcome {
            queue: "enrichment".to_string(),
            outcome: outcome.to_string(),
            total_ms: started.elapsed().as_millis() as u64,
            original_bytes: None,
            compressed_bytes: None,
        });
    }
}
