//! Pluggable backing store for the quota counter.
//!
//! Mirrors the corpus's `#[trait_variant::make(...: Send)]` convention: the
//! trait implementors write is plain `async fn` without a `Send` bound
//! (simpler to implement), while consumers depend on the generated
//! `Send`-bounded public trait.

use chrono::NaiveDate;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuotaStoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("store unavailable")]
    Unavailable,
}

/// Raw state of one `(provider_id, date)` counter, before any
/// caller-class-specific admission rule is applied.
#[derive(Debug, Clone, Copy)]
pub struct RawQuotaState {
    pub used: i64,
    pub last_reset: NaiveDate,
}

/// Result of a check-and-maybe-reserve store operation.
#[derive(Debug, Clone, Copy)]
pub struct ReservationOutcome {
    pub allowed: bool,
    pub used_after: i64,
}

#[trait_variant::make(QuotaStore: Send)]
pub trait LocalQuotaStore {
    /// Read the current state, performing the day-rollover reset first if
    /// `last_reset < today`.
    async fn read_state(
        &self,
        provider_id: &str,
        today: NaiveDate,
    ) -> Result<RawQuotaState, QuotaStoreError>;

    /// Atomically: roll over if needed, then if `used + n <= safety_limit`
    /// (and `commit` is true) increment `used` by `n` and return
    /// `allowed=true`; otherwise return `allowed=false` without mutating
    /// state. When `commit` is false this is a pure check.
    async fn check_and_reserve(
        &self,
        provider_id: &str,
        today: NaiveDate,
        n: i64,
        safety_limit: i64,
        commit: bool,
    ) -> Result<ReservationOutcome, QuotaStoreError>;

    /// Unconditional post-hoc increment, best-effort.
    async fn record(
        &self,
        provider_id: &str,
        today: NaiveDate,
        n: i64,
    ) -> Result<(), QuotaStoreError>;
}

/// Redis-backed implementation. The read-modify-write is done with a single
/// `EVAL` so two concurrent reservers racing for the tail of the budget
/// never both succeed past `safety_limit` (at most one accepts it; slight
/// over-count is tolerable, under-count is not, and this script produces
/// neither since it's atomic on the Redis side).
pub struct RedisQuotaStore {
    conn: ConnectionManager,
    check_and_reserve_script: Script,
    record_script: Script,
}

const CHECK_AND_RESERVE_LUA: &str = r#"
local used_key = KEYS[1]
local reset_key = KEYS[2]
local today = ARGV[1]
local n = tonumber(ARGV[2])
local safety_limit = tonumber(ARGV[3])
local commit = tonumber(ARGV[4])

local last_reset = redis.call('GET', reset_key)
local used = tonumber(redis.call('GET', used_key) or '0')

if last_reset ~= today then
    used = 0
    redis.call('SET', reset_key, today)
    redis.call('SET', used_key, 0)
end

if used + n <= safety_limit then
    if commit == 1 then
        used = tonumber(redis.call('INCRBY', used_key, n))
    end
    return {1, used}
else
    return {0, used}
end
"#;

const RECORD_LUA: &str = r#"
local used_key = KEYS[1]
local reset_key = KEYS[2]
local today = ARGV[1]
local n = tonumber(ARGV[2])

local last_reset = redis.call('GET', reset_key)
if last_reset ~= today then
    redis.call('SET', reset_key, today)
    redis.call('SET', used_key, 0)
end

return tonumber(redis.call('INCRBY', used_key, n))
"#;

impl RedisQuotaStore {
    pub async fn connect(redis_url: &str) -> Result<Self, QuotaStoreError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            check_and_reserve_script: Script::new(CHECK_AND_RESERVE_LUA),
            record_script: Script::new(RECORD_LUA),
        })
    }

    fn used_key(provider_id: &str) -> String {
        format!("biblio:quota:{provider_id}:used")
    }

    fn reset_key(provider_id: &str) -> String {
        format!("biblio:quota:{provider_id}:last_reset")
    }
}

impl LocalQuotaStore for RedisQuotaStore {
    async fn read_state(
        &self,
        provider_id: &str,
        today: NaiveDate,
    ) -> Result<RawQuotaState, QuotaStoreError> {
        // A zero-unit check-and-reserve performs the rollover and reports
        // the post-rollover `used` without mutating anything further.
        let outcome = self
            .check_and_reserve(provider_id, today, 0, i64::MAX, false)
            .await?;
        Ok(RawQuotaState {
            used: outcome.used_after,
            last_reset: today,
        })
    }

    async fn check_and_reserve(
        &self,
        provider_id: &str,
        today: NaiveDate,
        n: i64,
        safety_limit: i64,
        commit: bool,
    ) -> Result<ReservationOutcome, QuotaStoreError> {
        let mut conn = self.conn.clone();
        let (allowed, used_after): (i64, i64) = self
            .check_and_reserve_script
            .key(Self::used_key(provider_id))
            .key(Self::reset_key(provider_id))
            .arg(today.to_string())
            .arg(n)
            .arg(safety_limit)
            .arg(if commit { 1 } else { 0 })
            .invoke_async(&mut conn)
            .await?;
        Ok(ReservationOutcome {
            allowed: allowed == 1,
            used_after,
        })
    }

    async fn record(
        &self,
        provider_id: &str,
        today: NaiveDate,
        n: i64,
    ) -> Result<(), QuotaStoreError> {
        let mut conn = self.conn.clone();
        let _: i64 = self
            .record_script
            .key(Self::used_key(provider_id))
            .key(Self::reset_key(provider_id))
            .arg(today.to_string())
            .arg(n)
            .invoke_async(&mut conn)
            .await?;
        Ok(())
    }
}

/// In-memory implementation for tests and the integration-tests crate.
#[derive(Default)]
pub struct InMemoryQuotaStore {
    state: Mutex<HashMap<String, (i64, NaiveDate)>>,
}

impl InMemoryQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn roll_over_locked(
        state: &mut HashMap<String, (i64, NaiveDate)>,
        provider_id: &str,
        today: NaiveDate,
    ) -> i64 {
        let entry = state.entry(provider_id.to_string()).or_insert((0, today));
        if entry.1 < today {
            entry.0 = 0;
            entry.1 = today;
        }
        entry.0
    }
}

impl LocalQuotaStore for InMemoryQuotaStore {
    async fn read_state(
        &self,
        provider_id: &str,
        today: NaiveDate,
    ) -> Result<RawQuotaState, QuotaStoreError> {
        let mut state = self.state.lock().map_err(|_| QuotaStoreError::Unavailable)?;
        let used = Self::roll_over_locked(&mut state, provider_id, today);
        Ok(RawQuotaState {
            used,
            last_reset: today,
        })
    }

    async fn check_and_reserve(
        &self,
        provider_id: &str,
        today: NaiveDate,
        n: i64,
        safety_limit: i64,
        commit: bool,
    ) -> Result<ReservationOutcome, QuotaStoreError> {
        let mut state = self.state.lock().map_err(|_| QuotaStoreError::Unavailable)?;
        let used = Self::roll_over_locked(&mut state, provider_id, today);
        if used + n <= safety_limit {
            if commit {
                let entry = state.get_mut(provider_id).expect("just rolled over");
                entry.0 += n;
                return Ok(ReservationOutcome {
                    allowed: true,
                    used_after: entry.0,
                });
            }
            Ok(ReservationOutcome {
                allowed: true,
                used_after: used,
            })
        } else {
            Ok(ReservationOutcome {
                allowed: false,
                used_after: used,
            })
        }
    }

    async fn record(
        &self,
        provider_id: &str,
        today: NaiveDate,
        n: i64,
    ) -> Result<(), QuotaStoreError> {
        let mut state = self.state.lock().map_err(|_| QuotaStoreError::Unavailable)?;
        Self::roll_over_locked(&mut state, provider_id, today);
        let entry = state.get_mut(provider_id).expect("just rolled over");
        entry.0 += n;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_reserve_respects_safety_limit() {
        let store = InMemoryQuotaStore::new();
        let today = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();

        let r1 = store
            .check_and_reserve("paid", today, 100, 100, true)
            .await
            .unwrap();
        assert!(r1.allowed);

        let r2 = store
            .check_and_reserve("paid", today, 1, 100, true)
            .await
            .unwrap();
        assert!(!r2.allowed);
    }

    #[tokio::test]
    async fn in_memory_rolls_over_on_new_day() {
        let store = InMemoryQuotaStore::new();
        let day1 = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let day2 = NaiveDate::from_ymd_opt(2026, 7, 29).unwrap();

        store.record("paid", day1, 500).await.unwrap();
        let state_day1 = store.read_state("paid", day1).await.unwrap();
        assert_eq!(state_day1.used, 500);

        let state_day2 = store.read_state("paid", day2).await.unwrap();
        assert_eq!(state_day2.used, 0);
    }
}
