//! Cover Queue Consumer: cache check, process, retry-once on an
//! expired signed URL, best-effort Edition update, analytics, ack/retry.

use std::sync::Arc;
use std::time::Instant;

use biblio_common::{EnrichmentError, EnrichmentJob, Isbn13, JobEnvelope, QueueOutcome};
use biblio_covers::{CoverProcessError, CoverProcessor};
use biblio_persistence::EnrichmentRepository;
use biblio_registry::{CoverFetcher, ProviderContext};
use futures::future::join_all;

use biblio_analytics::AnalyticsEmitter;

use crate::outcome::ConsumerOutcome;
use crate::queue_client::{MessageHandle, QueueClient, QueueMessage};

pub struct CoverQueueConsumer {
    queue: Arc<dyn QueueClient<JobEnvelope>>,
    processor: Arc<CoverProcessor>,
    paid_cover_adapter: Arc<dyn CoverFetcher>,
    repository: Arc<dyn EnrichmentRepository>,
    analytics: Arc<AnalyticsEmitter>,
    batch_size: usize,
}

impl CoverQueueConsumer {
    pub fn new(
        queue: Arc<dyn QueueClient<JobEnvelope>>,
        processor: Arc<CoverProcessor>,
        paid_cover_adapter: Arc<dyn CoverFetcher>,
        repository: Arc<dyn EnrichmentRepository>,
        analytics: Arc<AnalyticsEmitter>,
        batch_size: usize,
    ) -> Self {
        Self {
            queue,
            processor,
            paid_cover_adapter,
            repository,
            analytics,
            batch_size,
        }
    }

    /// Drains one batch and returns how many messages were received, so a
    /// caller driving the tick loop can back off when the queue is empty.
    pub async fn run_once(&self) -> Result<usize, EnrichmentError> {
        let batch = self.queue.receive_batch(self.batch_size).await?;
        let received = batch.len();

        let results = join_all(batch.into_iter().map(|message| self.handle(message))).await;
        for (handle, outcome) in results {
            match outcome {
                ConsumerOutcome::Ack | ConsumerOutcome::AckNoRetry => {
                    if let Err(err) = self.queue.ack(&handle).await {
                        tracing::warn!(%err, "failed to ack cover message");
                    }
                }
                ConsumerOutcome::Retry { reason } => {
                    tracing::info!(reason, "retrying cover message");
                    if let Err(err) = self.queue.retry(&handle).await {
                        tracing::warn!(%err, "failed to mark cover message for retry");
                    }
                }
            }
        }

        Ok(received)
    }

    async fn handle(&self, message: QueueMessage<JobEnvelope>) -> (MessageHandle, ConsumerOutcome) {
        let outcome = self.process(&message.payload).await;
        (message.handle, outcome)
    }

    async fn process(&self, envelope: &JobEnvelope) -> ConsumerOutcome {
        let started = Instant::now();
        let (isbn_raw, provider_url) = match &envelope.job {
            EnrichmentJob::EnrichCover { isbn, provider_url, .. } => (isbn, provider_url.clone()),
            other => {
                tracing::warn!(?other, "cover queue received a non-cover job");
                return ConsumerOutcome::AckNoRetry;
            }
        };

        let isbn = match Isbn13::normalize(isbn_raw) {
            Ok(isbn) => isbn,
            Err(_) => return ConsumerOutcome::AckNoRetry,
        };

        match self.processor.is_cached(&isbn).await {
            Ok(true) => {
                self.emit("cached", started, None, None);
                return ConsumerOutcome::Ack;
            }
            Ok(false) => {}
            Err(err) => return ConsumerOutcome::Retry { reason: err.to_string() },
        }

        let Some(provider_url) = provider_url else {
            self.emit("no_cover_available", started, None, None);
            return ConsumerOutcome::AckNoRetry;
        };

        let mut result = self.processor.process_cover(&isbn, &provider_url).await;

        if let Err(CoverProcessError::RetryableAuthExpired { .. }) = &result {
            match self
                .paid_cover_adapter
                .fetch_cover(&isbn, &ProviderContext::new())
                .await
            {
                Ok(Some(fresh)) => {
                    result = self.processor.process_cover(&isbn, &fresh.url).await;
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(%err, "paid adapter failed to mint a fresh cover url");
                }
            }
        }

        match result {
            Ok(outcome) => {
                if let [large, medium, small] = outcome.keys.as_slice() {
                    if let Err(err) = self
                        .repository
                        .update_edition_cover_urls(&isbn, large, medium, small)
                        .await
                    {
                        tracing::warn!(%err, isbn = %isbn, "best-effort edition cover update failed");
                    }
                }
                self.emit(
                    "success",
                    started,
                    Some(outcome.metrics.original_bytes),
                    Some(outcome.metrics.compressed_bytes),
                );
                ConsumerOutcome::Ack
            }
            Err(CoverProcessError::HostNotAllowed(_) | CoverProcessError::UnsupportedFormat) => {
                self.emit("no_cover_available", started, None, None);
                ConsumerOutcome::AckNoRetry
            }
            Err(err) => ConsumerOutcome::Retry { reason: err.to_string() },
        }
    }

    fn emit(&self, outcome: &str, started: Instant, original_bytes: Option<u64>, compressed_bytes: Option<u64>) {
        self.analytics.record_queue_outcome(QueueOutcome {
            queue: "cover".to_string(),
            outcome: outcome.to_string(),
            total_ms: started.elapsed().as_millis() as u64,
            original_bytes,
            compressed_bytes,
        });
    }
}
