//! The `Attempt<T>` sum type every orchestrator's `try_provider` skeleton
//! returns, per the "Error envelopes" design note: calling code
//! pattern-matches rather than relying on null/undefined sentinels.

use serde::{Deserialize, Serialize};

/// Outcome of a single provider call, always timed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Attempt<T> {
    Success { data: T, latency_ms: u64 },
    Timeout { latency_ms: u64 },
    Failed { reason: String, latency_ms: u64 },
}

impl<T> Attempt<T> {
    pub fn success(data: T, latency_ms: u64) -> Self {
        Attempt::Success { data, latency_ms }
    }

    pub fn timeout(latency_ms: u64) -> Self {
        Attempt::Timeout { latency_ms }
    }

    pub fn failed(reason: impl Into<String>, latency_ms: u64) -> Self {
        Attempt::Failed {
            reason: reason.into(),
            latency_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Attempt::Success { .. })
    }

    pub fn latency_ms(&self) -> u64 {
        match self {
            Attempt::Success { latency_ms, .. } => *latency_ms,
            Attempt::Timeout { latency_ms } => *latency_ms,
            Attempt::Failed { latency_ms, .. } => *latency_ms,
        }
    }

    /// The canonical message for a timed-out attempt: `"Provider timeout
    /// (request cancelled)"`.
    pub fn error_reason(&self) -> Option<String> {
        match self {
            Attempt::Success { .. } => None,
            Attempt::Timeout { .. } => Some("Provider timeout (request cancelled)".to_string()),
            Attempt::Failed { reason, .. } => Some(reason.clone()),
        }
    }

    pub fn into_success(self) -> Option<T> {
        match self {
            Attempt::Success { data, .. } => Some(data),
            _ => None,
        }
    }
}

/// One entry in the per-chain attempt log recorded by an orchestrator and
/// handed to the Analytics Emitter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderAttemptRecord {
    pub provider: String,
    pub success: bool,
    pub latency_ms: u64,
    pub error: Option<String>,
}

impl ProviderAttemptRecord {
    pub fn from_attempt<T>(provider: impl Into<String>, attempt: &Attempt<T>) -> Self {
        Self {
            provider: provider.into(),
            success: attempt.is_success(),
            latency_ms: attempt.latency_ms(),
            error: attempt.error_reason(),
        }
    }
}

/// Summary record emitted once per orchestration chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationOutcome {
    pub orchestrator: String,
    pub operation: String,
    pub provider_chain: Vec<String>,
    pub successful_provider: Option<String>,
    pub attempts_count: u32,
    pub total_latency_ms: u64,
    pub success: bool,
}

/// Summary record emitted once per queue message outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueOutcome {
    pub queue: String,
    pub outcome: String,
    pub total_ms: u64,
    pub original_bytes: Option<u64>,
    pub compressed_bytes: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_error_reason_matches_spec_string() {
        let attempt: Attempt<()> = Attempt::timeout(1000);
        assert_eq!(
            attempt.error_reason(),
            Some("Provider timeout (request cancelled)".to_string())
        );
    }

    #[test]
    fn success_has_no_error_reason() {
        let attempt = Attempt::success(42, 10);
        assert!(attempt.error_reason().is_none());
        assert_eq!(attempt.into_success(), Some(42));
    }
}
