//! Builds the process-wide singletons and background tasks from an
//! [`EngineConfig`]. Construction is explicit and happens once at startup;
//! nothing here relies on ambient globals — there is no singleton quota manager.

use std::sync::Arc;
use std::time::Duration;

use biblio_analytics::AnalyticsEmitter;
use biblio_common::config::EngineConfig;
use biblio_common::{EnrichmentJob, JobEnvelope, KvStore, RedisKvStore};
use biblio_covers::{AllowedHost, CoverProcessor, FilesystemBlobStore, HostAllowList};
use biblio_persistence::{EnrichmentRepository, PgEnrichmentRepository, PgQueryRepository};
use biblio_providers::{
    ArchiveAdapter, ArchiveConfig, GeminiGeneratorAdapter, GeneratorEndpoint, OpenCatalogAdapter,
    OpenCatalogConfig, PaidMetadataAdapter, PaidMetadataConfig, WorkGraphAdapter, WorkGraphConfig,
    XaiGeneratorAdapter,
};
use biblio_quota::{QuotaCoordinator, RedisQuotaStore};
use biblio_queue::{
    CoverQueueConsumer, EnrichmentQueueConsumer, NotFoundStore, QueueClient, QueueProducer, RedisNotFoundCache,
    RedisStreamQueueClient,
};
use biblio_registry::{ProviderRegistry, Registration};
use biblio_scheduler::{BackfillCursor, ScheduledTrigger, Scheduler};
use cron::Schedule;
use redis::aio::ConnectionManager;
use sqlx::postgres::PgPoolOptions;
use std::str::FromStr;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Everything the background loops and the health/metrics router need to
/// stay alive for the life of the process.
pub struct Engine {
    pub config: EngineConfig,
    pub registry: Arc<ProviderRegistry>,
    pub quota: Arc<QuotaCoordinator>,
    pub repository: Arc<dyn EnrichmentRepository>,
    pub queries: Arc<PgQueryRepository>,
    pub analytics: Arc<AnalyticsEmitter>,
    pub shutdown: CancellationToken,
    tasks: JoinSet<()>,
}

impl Engine {
    /// Spawns the scheduler tick loop and both queue consumer loops,
    /// returning once every background task has been handed to the
    /// `JoinSet`. Callers await [`Engine::run`] to block until shutdown.
    pub async fn run(mut self) {
        while let Some(result) = self.tasks.join_next().await {
            if let Err(err) = result {
                tracing::error!(%err, "background task panicked");
            }
        }
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

/// Builds the full [`Engine`]: Postgres pool, Redis connection manager,
/// quota coordinator, provider registry, cover pipeline, and the scheduler
/// plus queue consumer background tasks, all under one `JoinSet`.
pub async fn build_engine(config: EngineConfig) -> anyhow::Result<Engine> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await?;

    let redis_client = redis::Client::open(config.redis.url.clone())?;
    let redis_conn = ConnectionManager::new(redis_client).await?;

    let quota_store = Arc::new(RedisQuotaStore::connect(&config.redis.url).await?);
    let quota = Arc::new(QuotaCoordinator::new("paid-metadata", config.quota.clone(), quota_store));

    let paid_metadata = Arc::new(PaidMetadataAdapter::new(
        PaidMetadataConfig {
            base_url: std::env::var("BIBLIO_PAID_METADATA_BASE_URL").unwrap_or_default(),
            api_key: std::env::var("BIBLIO_PAID_METADATA_API_KEY").unwrap_or_default(),
        },
        quota.clone(),
    ));
    let open_catalog = Arc::new(OpenCatalogAdapter::new(OpenCatalogConfig {
        base_url: std::env::var("BIBLIO_OPEN_CATALOG_BASE_URL")
            .unwrap_or_else(|_| "https://openlibrary.org".to_string()),
    }));
    let work_graph = Arc::new(WorkGraphAdapter::new(WorkGraphConfig {
        sparql_endpoint: std::env::var("BIBLIO_WORK_GRAPH_ENDPOINT")
            .unwrap_or_else(|_| "https://query.wikidata.org/sparql".to_string()),
    }));
    let archive = Arc::new(ArchiveAdapter::new(ArchiveConfig {
        base_url: std::env::var("BIBLIO_ARCHIVE_BASE_URL")
            .unwrap_or_else(|_| "https://archive.org".to_string()),
    }));
    let gemini = Arc::new(GeminiGeneratorAdapter::new(GeneratorEndpoint {
        base_url: std::env::var("BIBLIO_GEMINI_BASE_URL").unwrap_or_default(),
        api_key: std::env::var("BIBLIO_GEMINI_API_KEY").unwrap_or_default(),
        model: std::env::var("BIBLIO_GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.0-flash".to_string()),
    }));
    let xai = Arc::new(XaiGeneratorAdapter::new(GeneratorEndpoint {
        base_url: std::env::var("BIBLIO_XAI_BASE_URL").unwrap_or_default(),
        api_key: std::env::var("BIBLIO_XAI_API_KEY").unwrap_or_default(),
        model: std::env::var("BIBLIO_XAI_MODEL").unwrap_or_else(|_| "grok-2".to_string()),
    }));

    let registry = Arc::new(
        ProviderRegistry::builder()
            .register(
                Registration::new(paid_metadata.clone())
                    .with_isbn_resolver(paid_metadata.clone())
                    .with_cover_fetcher(paid_metadata.clone())
                    .with_metadata_fetcher(paid_metadata.clone())
                    .with_batch_metadata_fetcher(paid_metadata.clone()),
            )
            .register(
                Registration::new(open_catalog.clone())
                    .with_metadata_fetcher(open_catalog.clone())
                    .with_cover_fetcher(open_catalog.clone()),
            )
            .register(
                Registration::new(work_graph.clone())
                    .with_subject_fetcher(work_graph.clone())
                    .with_external_id_fetcher(work_graph.clone()),
            )
            .register(
                Registration::new(archive.clone())
                    .with_edition_variant_fetcher(archive.clone())
                    .with_ratings_fetcher(archive.clone()),
            )
            .register(Registration::new(gemini.clone()).with_book_generator(gemini.clone()))
            .register(Registration::new(xai.clone()).with_book_generator(xai.clone()))
            .build(),
    );

    let blob_store: Arc<dyn biblio_covers::BlobStore> = if std::env::var("BIBLIO_BLOB_BACKEND").as_deref() == Ok("s3") {
        Arc::new(
            biblio_covers::S3BlobStore::connect(biblio_covers::S3Config {
                bucket: config.blob.bucket.clone(),
                region: std::env::var("BIBLIO_BLOB_REGION").ok(),
            })
            .await,
        )
    } else {
        let blob_root = std::env::var("BIBLIO_BLOB_ROOT").unwrap_or_else(|_| "/tmp/biblio-covers".to_string());
        Arc::new(FilesystemBlobStore::new(blob_root))
    };
    let allow_list = HostAllowList::new(vec![
        AllowedHost::Wildcard("openlibrary.org".to_string()),
        AllowedHost::Exact("covers.openlibrary.org".to_string()),
        AllowedHost::Wildcard(
            std::env::var("BIBLIO_PAID_METADATA_COVER_HOST").unwrap_or_else(|_| "paid-books.example.com".to_string()),
        ),
    ]);
    let cover_processor = Arc::new(CoverProcessor::new(reqwest::Client::new(), allow_list, blob_store));

    let repository: Arc<dyn EnrichmentRepository> = Arc::new(PgEnrichmentRepository::new(pool.clone()));
    let queries = Arc::new(PgQueryRepository::new(pool));
    let analytics = Arc::new(AnalyticsEmitter::new(config.observability.metrics_enabled));

    let cover_queue: Arc<dyn QueueClient<JobEnvelope>> = Arc::new(
        RedisStreamQueueClient::connect(
            redis_conn.clone(),
            "biblio:covers",
            "cover-consumers",
            hostname(),
            config.queue.max_retries,
            Duration::from_secs(60),
        )
        .await?,
    );
    let enrichment_queue: Arc<dyn QueueClient<JobEnvelope>> = Arc::new(
        RedisStreamQueueClient::connect(
            redis_conn.clone(),
            "biblio:enrichment",
            "enrichment-consumers",
            hostname(),
            config.queue.max_retries,
            Duration::from_secs(60),
        )
        .await?,
    );
    let cover_producer: Arc<dyn QueueProducer<JobEnvelope>> = Arc::new(
        RedisStreamQueueClient::connect(
            redis_conn.clone(),
            "biblio:covers",
            "cover-consumers",
            hostname(),
            config.queue.max_retries,
            Duration::from_secs(60),
        )
        .await?,
    );

    let cover_consumer = CoverQueueConsumer::new(
        cover_queue,
        cover_processor,
        paid_metadata.clone(),
        repository.clone(),
        analytics.clone(),
        config.queue.cover_batch_size,
    );
    let not_found_cache: Arc<dyn NotFoundStore> = Arc::new(RedisNotFoundCache::new(redis_conn.clone()));
    let enrichment_consumer = EnrichmentQueueConsumer::new(
        enrichment_queue,
        cover_producer,
        paid_metadata.clone(),
        repository.clone(),
        not_found_cache,
        analytics.clone(),
        config.queue.enrichment_batch_size,
    );

    let kv: Arc<dyn KvStore> = Arc::new(RedisKvStore::new(redis_conn));
    let scheduler = Arc::new(Scheduler::new(default_triggers(), quota.clone(), kv));

    let shutdown = CancellationToken::new();
    let mut tasks = JoinSet::new();

    let cover_consumer = Arc::new(cover_consumer);
    {
        let consumer = cover_consumer.clone();
        let shutdown = shutdown.clone();
        tasks.spawn(async move {
            run_poll_loop("cover-consumer", &shutdown, || consumer.run_once()).await;
        });
    }

    let enrichment_consumer = Arc::new(enrichment_consumer);
    {
        let consumer = enrichment_consumer.clone();
        let shutdown = shutdown.clone();
        tasks.spawn(async move {
            run_poll_loop("enrichment-consumer", &shutdown, || consumer.run_once()).await;
        });
    }

    {
        let scheduler = scheduler.clone();
        let shutdown = shutdown.clone();
        tasks.spawn(async move {
            scheduler
                .run(
                    |name, job| tracing::info!(trigger = %name, ?job, "scheduler enqueued backfill job"),
                    shutdown,
                )
                .await;
        });
    }

    Ok(Engine {
        config,
        registry,
        quota,
        repository,
        queries,
        analytics,
        shutdown,
        tasks,
    })
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "biblio-worker".to_string())
}

/// Recent-releases, bulk-author, and Wikidata-diversity backfill triggers.
/// Each fires at most once per natural cron tick; the scheduler's
/// quota pre-check (`CallerClass::Cron`) is applied uniformly regardless of
/// which trigger is due.
fn default_triggers() -> Vec<ScheduledTrigger> {
    vec![
        ScheduledTrigger {
            name: "new-releases-backfill".to_string(),
            cron_schedule: Schedule::from_str("0 0 3 * * *").expect("valid cron expression"),
            job_builder: Box::new(|cursor: &BackfillCursor| EnrichmentJob::BackfillMonth {
                year: cursor.year,
                month: cursor.month.max(1),
                resume_page: Some(cursor.page),
            }),
            advance: Box::new(|cursor: &BackfillCursor| cursor.next_month()),
        },
        ScheduledTrigger {
            name: "author-bibliography-harvest".to_string(),
            cron_schedule: Schedule::from_str("0 30 4 * * 0").expect("valid cron expression"),
            job_builder: Box::new(|_cursor: &BackfillCursor| EnrichmentJob::EnrichAuthorBibliography {
                author_name: String::new(),
                max_pages: 5,
            }),
            advance: Box::new(|cursor: &BackfillCursor| cursor.next_page()),
        },
    ]
}

/// Polls a consumer's `run_once` on a short interval, backing off when a
/// batch comes back empty so an idle queue doesn't spin the process.
async fn run_poll_loop<F, Fut>(name: &'static str, shutdown: &CancellationToken, mut poll: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<usize, biblio_common::EnrichmentError>>,
{
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            result = poll() => {
                match result {
                    Ok(0) => tokio::time::sleep(Duration::from_secs(2)).await,
                    Ok(_) => {}
                    Err(err) => {
                        tracing::warn!(consumer = name, %err, "consumer batch failed, backing off");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }
    }
}
