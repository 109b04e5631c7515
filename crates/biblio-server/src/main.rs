//! Process entrypoint: tracing subscriber, layered config load, engine
//! composition, and the `/healthz` + `/metrics` router, all under one
//! Ctrl-C-aware shutdown.

use biblio_common::config::load_engine_config;
use biblio_server::{build_engine, build_router, AppState};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config_file = std::env::var("BIBLIO_CONFIG_FILE").ok();
    let config = load_engine_config(config_file.as_deref())?;

    let (recorder, metrics_handle) = PrometheusBuilder::new().build()?;
    metrics::set_global_recorder(recorder).expect("metrics recorder installed exactly once");

    let engine = build_engine(config).await?;
    let shutdown = engine.shutdown.clone();

    let state = AppState {
        registry: engine.registry.clone(),
        quota: engine.quota.clone(),
        metrics_handle,
    };
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
    let http_shutdown = shutdown.clone();
    let serve = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                http_shutdown.cancelled().await;
            })
            .await
    });

    let engine_task = tokio::spawn(engine.run());

    tokio::signal::ctrl_c().await?;
    tracing::info!("received ctrl-c, shutting down");
    shutdown.cancel();

    let _ = engine_task.await;
    if let Ok(Err(err)) = serve.await {
        tracing::error!(%err, "http server exited with error");
    }

    Ok(())
}
