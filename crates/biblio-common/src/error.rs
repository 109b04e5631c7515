//! Unified error type for the book-enrichment engine.
//!
//! One enum, one variant per error *kind* (not per failing library), so that
//! callers at every layer — orchestrators, queue consumers, the (external)
//! HTTP boundary — can match on a small closed set rather than threading
//! library-specific error types through the stack.

use thiserror::Error;

/// Convenience alias used throughout the workspace.
pub type EnrichmentResult<T> = Result<T, EnrichmentError>;

/// The error kinds a caller may observe crossing a component boundary.
///
/// Doc comments on each variant record the HTTP status the (external)
/// handler layer is expected to map it to, since that mapping table is the
/// contract between this crate and the out-of-scope HTTP layer.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    /// Maps to HTTP 400 (`INVALID_ISBN` / `MISSING_PARAMETER`).
    #[error("validation: {0}")]
    Validation(String),

    /// Maps to HTTP 404 (`NOT_FOUND`).
    #[error("not found: {0}")]
    NotFound(String),

    /// Maps to HTTP 429 (`RATE_LIMIT_EXCEEDED`). Never degrades silently
    /// into issuing the paid call anyway.
    #[error("quota exhausted: {0}")]
    QuotaExhausted(String),

    /// Maps to HTTP 504 (`PROVIDER_TIMEOUT`).
    #[error("provider timeout: {provider}")]
    ProviderTimeout { provider: String },

    /// Maps to HTTP 502 (`PROVIDER_ERROR`).
    #[error("provider error ({provider}): {message}")]
    ProviderError { provider: String, message: String },

    /// Maps to HTTP 429 (`RATE_LIMIT_EXCEEDED`), distinct from quota
    /// exhaustion in that it originates from a provider's own limiter.
    #[error("rate limit: {0}")]
    RateLimit(String),

    /// Maps to HTTP 503 (`DATABASE_ERROR`).
    #[error("storage error: {0}")]
    Storage(String),

    /// Maps to HTTP 503; a queue consumer should retry the message.
    #[error("queue error: {0}")]
    Queue(String),

    /// Maps to HTTP 500 (`INTERNAL_ERROR`).
    #[error("internal error: {0}")]
    Internal(String),
}

impl EnrichmentError {
    /// The stable error code used in the (external) HTTP error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            EnrichmentError::Validation(_) => "INVALID_ISBN",
            EnrichmentError::NotFound(_) => "NOT_FOUND",
            EnrichmentError::QuotaExhausted(_) => "RATE_LIMIT_EXCEEDED",
            EnrichmentError::ProviderTimeout { .. } => "PROVIDER_TIMEOUT",
            EnrichmentError::ProviderError { .. } => "PROVIDER_ERROR",
            EnrichmentError::RateLimit(_) => "RATE_LIMIT_EXCEEDED",
            EnrichmentError::Storage(_) => "DATABASE_ERROR",
            EnrichmentError::Queue(_) => "DATABASE_ERROR",
            EnrichmentError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for EnrichmentError {
    fn from(e: sqlx::Error) -> Self {
        EnrichmentError::Storage(e.to_string())
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for EnrichmentError {
    fn from(e: redis::RedisError) -> Self {
        EnrichmentError::Storage(e.to_string())
    }
}

#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for EnrichmentError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            EnrichmentError::ProviderTimeout {
                provider: e.url().map(|u| u.to_string()).unwrap_or_default(),
            }
        } else {
            EnrichmentError::ProviderError {
                provider: e.url().map(|u| u.to_string()).unwrap_or_default(),
                message: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_invalid_isbn() {
        let e = EnrichmentError::Validation("bad isbn".into());
        assert_eq!(e.code(), "INVALID_ISBN");
    }

    #[test]
    fn quota_exhausted_maps_to_rate_limit() {
        let e = EnrichmentError::QuotaExhausted("safety limit reached".into());
        assert_eq!(e.code(), "RATE_LIMIT_EXCEEDED");
    }

    #[test]
    fn display_includes_provider_name() {
        let e = EnrichmentError::ProviderTimeout {
            provider: "openlibrary".into(),
        };
        assert!(e.to_string().contains("openlibrary"));
    }
}
