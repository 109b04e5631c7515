//! Batch queue consumers for cover and enrichment jobs, plus the
//! Redis-streams transport they share.

mod cover_consumer;
mod enrichment_consumer;
mod not_found_cache;
mod outcome;
mod queue_client;

pub use cover_consumer::CoverQueueConsumer;
pub use enrichment_consumer::EnrichmentQueueConsumer;
pub use not_found_cache::{InMemoryNotFoundCache, LocalNotFoundStore, NotFoundStore, RedisNotFoundCache};
pub use outcome::ConsumerOutcome;
pub use queue_client::{
    InMemoryQueueClient, InMemoryQueueProducer, MessageHandle, QueueClient, QueueMessage, QueueProducer,
    RedisStreamQueueClient,
};
