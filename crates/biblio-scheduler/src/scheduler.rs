//! The Scheduler: a list of cron-driven triggers that enqueue
//! backfill jobs, each gated by a Quota Coordinator pre-check and carrying
//! its own resume cursor.

use std::sync::Arc;

use biblio_common::{get_json, set_json, EnrichmentJob, EnrichmentError, KvStore};
use biblio_quota::{CallerClass, QuotaCoordinator};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use cron::Schedule;
use tokio_util::sync::CancellationToken;

use crate::cursor::BackfillCursor;

/// One periodic job source. `job_builder` reads the current cursor to
/// build this tick's job; `advance` computes the cursor to persist once the
/// job has actually been enqueued.
pub struct ScheduledTrigger {
    pub name: String,
    pub cron_schedule: Schedule,
    pub job_builder: Box<dyn Fn(&BackfillCursor) -> EnrichmentJob + Send + Sync>,
    pub advance: Box<dyn Fn(&BackfillCursor) -> BackfillCursor + Send + Sync>,
}

pub struct Scheduler {
    triggers: Vec<ScheduledTrigger>,
    quota: Arc<QuotaCoordinator>,
    kv: Arc<dyn KvStore>,
}

impl Scheduler {
    pub fn new(triggers: Vec<ScheduledTrigger>, quota: Arc<QuotaCoordinator>, kv: Arc<dyn KvStore>) -> Self {
        Self { triggers, quota, kv }
    }

    /// Checks every trigger's cron schedule against `now` and returns the
    /// jobs due to fire, in trigger order. A trigger whose quota pre-check
    /// is denied is logged and skipped for this tick; the next natural tick
    /// will re-check rather than retrying early.
    pub async fn tick(&self, now: DateTime<Utc>) -> Vec<(String, EnrichmentJob)> {
        let mut fired = Vec::new();

        for trigger in &self.triggers {
            match self.is_due(trigger, now).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => {
                    tracing::warn!(%err, trigger = %trigger.name, "failed to evaluate trigger schedule");
                    continue;
                }
            }

            let check = self.quota.check(1, CallerClass::Cron, false).await;
            if !check.allowed {
                tracing::info!(
                    trigger = %trigger.name,
                    reason = ?check.reason,
                    "skipping scheduler tick: insufficient quota headroom"
                );
                continue;
            }

            let cursor = self.load_cursor(&trigger.name).await.unwrap_or_default();
            let job = (trigger.job_builder)(&cursor);
            let next_cursor = (trigger.advance)(&cursor);
            if let Err(err) = self.save_cursor(&trigger.name, &next_cursor).await {
                tracing::warn!(%err, trigger = %trigger.name, "failed to persist backfill cursor");
            }

            fired.push((trigger.name.clone(), job));
        }

        fired
    }

    /// Drives `tick` roughly once a minute until `cancellation` fires.
    pub async fn run(&self, mut on_due: impl FnMut(String, EnrichmentJob) + Send, cancellation: CancellationToken) {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            tokio::select! {
                _ = cancellation.cancelled() => return,
                _ = interval.tick() => {
                    for (name, job) in self.tick(Utc::now()).await {
                        on_due(name, job);
                    }
                }
            }
        }
    }

    async fn is_due(&self, trigger: &ScheduledTrigger, now: DateTime<Utc>) -> Result<bool, EnrichmentError> {
        let key = format!("scheduler:last_fired:{}", trigger.name);
        let last_fired = match self.kv.get(&key).await? {
            Some(raw) => raw.parse::<DateTime<Utc>>().unwrap_or(now - ChronoDuration::days(1)),
            None => now - ChronoDuration::days(1),
        };

        match trigger.cron_schedule.after(&last_fired).next() {
            Some(next_fire) if next_fire <= now => {
                self.kv.set(&key, &now.to_rfc3339()).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn load_cursor(&self, trigger_name: &str) -> Result<BackfillCursor, EnrichmentError> {
        let key = format!("scheduler:cursor:{trigger_name}");
        Ok(get_json(self.kv.as_ref(), &key).await?.unwrap_or_default())
    }

    async fn save_cursor(&self, trigger_name: &str, cursor: &BackfillCursor) -> Result<(), EnrichmentError> {
        let key = format!("scheduler:cursor:{trigger_name}");
        set_json(self.kv.as_ref(), &key, cursor).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biblio_common::InMemoryKvStore;
    use biblio_common::config::QuotaConfig;
    use biblio_quota::InMemoryQuotaStore;
    use std::str::FromStr;

    fn quota_coordinator(buffer: i64) -> Arc<QuotaCoordinator> {
        let config = QuotaConfig { hard_limit: 100, buffer };
        Arc::new(QuotaCoordinator::new(
            "test-provider",
            config,
            Arc::new(InMemoryQuotaStore::new()),
        ))
    }

    fn every_minute_trigger(name: &str) -> ScheduledTrigger {
        ScheduledTrigger {
            name: name.to_string(),
            cron_schedule: Schedule::from_str("0 * * * * *").unwrap(),
            job_builder: Box::new(|cursor| EnrichmentJob::BackfillMonth {
                year: cursor.year,
                month: cursor.month.max(1),
                resume_page: Some(cursor.page),
            }),
            advance: Box::new(|cursor| cursor.next_page()),
        }
    }

    #[tokio::test]
    async fn first_tick_fires_and_persists_cursor_advance() {
        let kv = Arc::new(InMemoryKvStore::new());
        let scheduler = Scheduler::new(vec![every_minute_trigger("monthly")], quota_coordinator(20), kv.clone());

        let now = Utc::now();
        let fired = scheduler.tick(now).await;
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].0, "monthly");

        let cursor: BackfillCursor = get_json(kv.as_ref(), "scheduler:cursor:monthly").await.unwrap().unwrap();
        assert_eq!(cursor.page, 1);
    }

    #[tokio::test]
    async fn denied_quota_skips_the_tick() {
        let kv = Arc::new(InMemoryKvStore::new());
        let scheduler = Scheduler::new(vec![every_minute_trigger("monthly")], quota_coordinator(100), kv);

        let fired = scheduler.tick(Utc::now()).await;
        assert!(fired.is_empty());
    }
}
