//! "Known not-found" cache for the Enrichment Queue Consumer: a 24h-TTL
//! marker so an ISBN the paid provider doesn't recognize
//! isn't looked up again on every retry of the same negative result.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use biblio_common::{EnrichmentError, Isbn13};
use redis::aio::ConnectionManager;

const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Negative-result cache contract. Implementors write plain `async fn`s;
/// the `Send`-bounded `NotFoundStore` trait used by the consumer is
/// generated by `trait_variant::make`, matching the `KvStore`/`QuotaStore`
/// pattern used elsewhere in the workspace.
#[trait_variant::make(NotFoundStore: Send)]
pub trait LocalNotFoundStore {
    async fn contains(&self, isbn: &Isbn13) -> Result<bool, EnrichmentError>;
    async fn mark_not_found(&self, isbn: &Isbn13) -> Result<(), EnrichmentError>;
}

/// Redis-backed `NotFoundStore`, keyed `enrichment:not_found:{isbn}` with a
/// 24h expiry.
pub struct RedisNotFoundCache {
    conn: ConnectionManager,
    ttl: Duration,
}

impl RedisNotFoundCache {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn, ttl: DEFAULT_TTL }
    }

    fn key(isbn: &Isbn13) -> String {
        format!("enrichment:not_found:{isbn}")
    }
}

impl LocalNotFoundStore for RedisNotFoundCache {
    async fn contains(&self, isbn: &Isbn13) -> Result<bool, EnrichmentError> {
        use redis::AsyncCommands;
        let mut conn = self.conn.clone();
        conn.exists(Self::key(isbn)).await.map_err(EnrichmentError::from)
    }

    async fn mark_not_found(&self, isbn: &Isbn13) -> Result<(), EnrichmentError> {
        use redis::AsyncCommands;
        let mut conn = self.conn.clone();
        conn.set_ex(Self::key(isbn), "1", self.ttl.as_secs())
            .await
            .map_err(EnrichmentError::from)
    }
}

/// In-process `NotFoundStore` with no expiry, used by local dev and tests
/// in place of a live Redis instance (mirrors `InMemoryKvStore`).
#[derive(Default)]
pub struct InMemoryNotFoundCache {
    marked: Mutex<HashSet<String>>,
}

impl InMemoryNotFoundCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalNotFoundStore for InMemoryNotFoundCache {
    async fn contains(&self, isbn: &Isbn13) -> Result<bool, EnrichmentError> {
        Ok(self.marked.lock().expect("not-found cache lock poisoned").contains(isbn.as_str()))
    }

    async fn mark_not_found(&self, isbn: &Isbn13) -> Result<(), EnrichmentError> {
        self.marked
            .lock()
            .expect("not-found cache lock poisoned")
            .insert(isbn.as_str().to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_cache_reports_marked_isbns() {
        let cache = InMemoryNotFoundCache::new();
        let isbn = Isbn13::normalize("978-0-385-54415-3").unwrap();

        assert!(!cache.contains(&isbn).await.unwrap());
        cache.mark_not_found(&isbn).await.unwrap();
        assert!(cache.contains(&isbn).await.unwrap());
    }
}
