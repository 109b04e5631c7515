//! Shared plumbing for every adapter: outcome classification and a
//! standard client builder. Centralized so each adapter's
//! capability method is a thin translation layer, not a copy of the same
//! status-code triage.

use std::time::Duration;

use biblio_common::EnrichmentError;
use reqwest::StatusCode;

/// Non-retryable 4xx → empty result; retryable 5xx/timeout → the
/// orchestrator should try the next provider.
pub enum AttemptOutcome {
    Empty,
    Retryable(String),
}

pub fn classify_http_error(status: Option<StatusCode>, source: &reqwest::Error) -> AttemptOutcome {
    if source.is_timeout() {
        return AttemptOutcome::Retryable("request timed out".to_string());
    }
    match status {
        Some(code) if code.is_client_error() => AttemptOutcome::Empty,
        Some(code) => AttemptOutcome::Retryable(format!("upstream returned {code}")),
        None => AttemptOutcome::Retryable(source.to_string()),
    }
}

pub fn classify_status(status: StatusCode) -> AttemptOutcome {
    if status.is_client_error() {
        AttemptOutcome::Empty
    } else {
        AttemptOutcome::Retryable(format!("upstream returned {status}"))
    }
}

pub fn outcome_to_error(provider: &str, outcome: AttemptOutcome) -> Option<EnrichmentError> {
    match outcome {
        AttemptOutcome::Empty => None,
        AttemptOutcome::Retryable(message) => Some(EnrichmentError::ProviderError {
            provider: provider.to_string(),
            message,
        }),
    }
}

/// One `reqwest::Client` per adapter, built once at construction with a
/// fixed `User-Agent` and default timeout.
pub fn build_client(user_agent: &str, timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
        .expect("static client configuration is always valid")
}

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
pub const AI_GENERATION_TIMEOUT: Duration = Duration::from_secs(60);
pub const CONTACT_USER_AGENT: &str = "biblio-enrichment/0.1 (+contact: enrichment-ops@biblio.systems)";
