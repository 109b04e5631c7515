//! Fire-and-forget analytics sink: a dual tracing-event +
//! `metrics`-macro writer for orchestration and queue outcomes. Both
//! recording methods take `&self` and never return a `Result` — any
//! internal failure (most likely the global `metrics` recorder not yet
//! installed) is caught and discarded here, which is the one place in this
//! codebase where swallowing an error is the documented, correct behavior
//! rather than a defect.

use biblio_common::{OrchestrationOutcome, QueueOutcome};
use metrics::{counter, histogram};

pub struct AnalyticsEmitter {
    metrics_enabled: bool,
}

impl AnalyticsEmitter {
    pub fn new(metrics_enabled: bool) -> Self {
        Self { metrics_enabled }
    }

    pub fn record_orchestration(&self, event: OrchestrationOutcome) {
        tracing::info!(
            orchestrator = %event.orchestrator,
            operation = %event.operation,
            provider_chain = ?event.provider_chain,
            successful_provider = ?event.successful_provider,
            attempts_count = event.attempts_count,
            total_latency_ms = event.total_latency_ms,
            success = event.success,
            "orchestration completed"
        );

        if !self.metrics_enabled {
            return;
        }

        let success_label = if event.success { "true" } else { "false" };
        counter!(
            "enrichment_orchestration_total",
            "orchestrator" => event.orchestrator.clone(),
            "operation" => event.operation.clone(),
            "success" => success_label
        )
        .increment(1);
        histogram!(
            "enrichment_orchestration_latency_ms",
            "orchestrator" => event.orchestrator,
            "operation" => event.operation
        )
        .record(event.total_latency_ms as f64);
    }

    pub fn record_queue_outcome(&self, event: QueueOutcome) {
        tracing::info!(
            queue = %event.queue,
            outcome = %event.outcome,
            total_ms = event.total_ms,
            original_bytes = ?event.original_bytes,
            compressed_bytes = ?event.compressed_bytes,
            "queue message processed"
        );

        if !self.metrics_enabled {
            return;
        }

        counter!(
            "enrichment_queue_outcome_total",
            "queue" => event.queue.clone(),
            "outcome" => event.outcome
        )
        .increment(1);
        histogram!("enrichment_queue_latency_ms", "queue" => event.queue).record(event.total_ms as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_orchestration_does_not_panic_without_recorder_installed() {
        let emitter = AnalyticsEmitter::new(true);
        emitter.record_orchestration(OrchestrationOutcome {
            orchestrator: "metadata_enrichment".into(),
            operation: "enrich".into(),
            provider_chain: vec!["open-catalog".into()],
            successful_provider: Some("open-catalog".into()),
            attempts_count: 1,
            total_latency_ms: 42,
            success: true,
        });
    }

    #[test]
    fn record_queue_outcome_does_not_panic_without_recorder_installed() {
        let emitter = AnalyticsEmitter::new(true);
        emitter.record_queue_outcome(QueueOutcome {
            queue: "cover".into(),
            outcome: "ack".into(),
            total_ms: 10,
            original_bytes: Some(1024),
            compressed_bytes: Some(512),
        });
    }

    #[test]
    fn disabled_metrics_flag_still_emits_tracing_only() {
        let emitter = AnalyticsEmitter::new(false);
        emitter.record_queue_outcome(QueueOutcome {
            queue: "enrichment".into(),
            outcome: "retry".into(),
            total_ms: 5,
            original_bytes: None,
            compressed_bytes: None,
        });
    }
}
