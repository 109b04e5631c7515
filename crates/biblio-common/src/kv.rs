//! A generic key-value abstraction shared by anything that needs a small
//! piece of durable state keyed by a string — currently the Scheduler's
//! per-trigger `BackfillCursor`. Kept separate from [`crate::model`] because
//! it's infrastructure, not domain data; the Redis-backed implementation is
//! the same connection-manager pattern `biblio-quota` uses for its own
//! store, just generalized to arbitrary JSON-serializable values instead of
//! quota counters.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::EnrichmentError;

/// Implementors write plain `async fn`s; [`KvStore`] is the `Send`-bounded
/// trait callers hold as `Arc<dyn KvStore>`.
#[trait_variant::make(KvStore: Send)]
pub trait LocalKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, EnrichmentError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), EnrichmentError>;
}

/// Helper for callers storing a serializable value rather than a raw
/// string; not part of the trait object surface since it's generic.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn KvStore,
    key: &str,
) -> Result<Option<T>, EnrichmentError> {
    match store.get(key).await? {
        Some(raw) => {
            let value = serde_json::from_str(&raw)
                .map_err(|e| EnrichmentError::Storage(format!("kv decode failed for {key}: {e}")))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

pub async fn set_json<T: Serialize + Sync>(
    store: &dyn KvStore,
    key: &str,
    value: &T,
) -> Result<(), EnrichmentError> {
    let raw = serde_json::to_string(value)
        .map_err(|e| EnrichmentError::Storage(format!("kv encode failed for {key}: {e}")))?;
    store.set(key, &raw).await
}

#[cfg(feature = "redis")]
pub struct RedisKvStore {
    conn: redis::aio::ConnectionManager,
}

#[cfg(feature = "redis")]
impl RedisKvStore {
    pub fn new(conn: redis::aio::ConnectionManager) -> Self {
        Self { conn }
    }
}

#[cfg(feature = "redis")]
impl LocalKvStore for RedisKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, EnrichmentError> {
        use redis::AsyncCommands;
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(EnrichmentError::from)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), EnrichmentError> {
        use redis::AsyncCommands;
        let mut conn = self.conn.clone();
        conn.set(key, value).await.map_err(EnrichmentError::from)
    }
}

/// In-process store for tests and for running the Scheduler without Redis
/// configured.
#[derive(Default)]
pub struct InMemoryKvStore {
    values: Mutex<HashMap<String, String>>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalKvStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, EnrichmentError> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), EnrichmentError> {
        self.values.lock().unwrap().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Cursor {
        page: u32,
    }

    #[tokio::test]
    async fn in_memory_store_round_trips_json() {
        let store = InMemoryKvStore::new();
        assert!(get_json::<Cursor>(&store, "missing").await.unwrap().is_none());

        set_json(&store, "cursor", &Cursor { page: 3 }).await.unwrap();
        let loaded: Cursor = get_json(&store, "cursor").await.unwrap().unwrap();
        assert_eq!(loaded, Cursor { page: 3 });
    }
}
