//! The minimal operational surface this crate owns directly: `/healthz`
//! (liveness + registry/quota snapshot) and `/metrics` (Prometheus text
//! exposition). The full `/api/*` surface is an external
//! collaborator's handler layer sitting in front of this engine.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use biblio_common::health::{health_check, HealthResponse};
use biblio_quota::QuotaCoordinator;
use biblio_registry::{ProviderRegistry, RegistryStats};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ProviderRegistry>,
    pub quota: Arc<QuotaCoordinator>,
    pub metrics_handle: PrometheusHandle,
}

#[derive(Serialize)]
struct LivenessResponse {
    #[serde(flatten)]
    health: HealthResponse,
    registry: RegistryStats,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz(State(state): State<AppState>) -> Json<LivenessResponse> {
    Json(LivenessResponse {
        health: health_check(),
        registry: state.registry.stats(),
    })
}

async fn metrics(State(state): State<AppState>) -> String {
    state.metrics_handle.render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use biblio_common::config::QuotaConfig;
    use biblio_quota::InMemoryQuotaStore;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[tokio::test]
    async fn healthz_reports_registry_stats() {
        let registry = Arc::new(ProviderRegistry::builder().build());
        let quota = Arc::new(QuotaCoordinator::new(
            "paid-metadata",
            QuotaConfig::default(),
            Arc::new(InMemoryQuotaStore::new()),
        ));
        let (_recorder, handle) = PrometheusBuilder::new().build().expect("prometheus recorder builds");

        let state = AppState {
            registry,
            quota,
            metrics_handle: handle,
        };

        let response = healthz(State(state)).await.0;
        assert_eq!(response.health.status, "healthy");
        assert_eq!(response.registry.total, 0);
    }
}
