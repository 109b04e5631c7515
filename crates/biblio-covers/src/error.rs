//! Cover-processing errors and the JWT-expiry retry classifier (open
//! question (a), resolved generically rather than hard-coded to one host —
//! see DESIGN.md).

use biblio_common::{EnrichmentError, Isbn13};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoverProcessError {
    #[error("host not on cover source allow-list: {0}")]
    HostNotAllowed(String),
    #[error("download failed: {0}")]
    Download(String),
    #[error("downloaded image outside size bounds ({size} bytes)")]
    SizeOutOfBounds { size: usize },
    #[error("unsupported image format")]
    UnsupportedFormat,
    #[error("image decode failed: {0}")]
    Decode(String),
    #[error("blob upload failed: {0}")]
    Upload(String),
    /// A 401/403 from a paid source whose response looked like an expired
    /// signed URL / bearer token, not a permanent rejection. The Cover Queue
    /// Consumer pattern-matches on this variant to mint a fresh URL and
    /// retry once.
    #[error("paid source auth expired for isbn {isbn}")]
    RetryableAuthExpired { isbn: Isbn13 },
}

impl From<CoverProcessError> for EnrichmentError {
    fn from(err: CoverProcessError) -> Self {
        match err {
            CoverProcessError::RetryableAuthExpired { isbn } => {
                EnrichmentError::ProviderError { provider: "cover-source".to_string(), message: format!("auth expired for {isbn}") }
            }
            other => EnrichmentError::Internal(other.to_string()),
        }
    }
}

/// Classifies a provider URL well enough to decide whether a 401/403 is the
/// "JWT expired, mint a fresh signed URL" kind of failure, without hard-
/// coding to one known host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderUrlKind {
    /// URL carries a query parameter suggestive of a signed/time-limited
    /// token (`token`, `signature`, `expires`, `X-Amz-*`).
    SignedUrl,
    /// No recognisable token scheme; a 401/403 here is treated as final.
    Unsigned,
}

impl ProviderUrlKind {
    pub fn classify(url: &url::Url) -> Self {
        const TOKEN_MARKERS: [&str; 6] = ["token", "signature", "expires", "x-amz-signature", "x-amz-expires", "sig"];
        let has_marker = url
            .query_pairs()
            .any(|(key, _)| TOKEN_MARKERS.iter().any(|marker| key.to_lowercase().contains(marker)));
        if has_marker {
            ProviderUrlKind::SignedUrl
        } else {
            ProviderUrlKind::Unsigned
        }
    }

    pub fn is_retryable_on_auth_failure(self) -> bool {
        matches!(self, ProviderUrlKind::SignedUrl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_url_with_token_param_is_retryable() {
        let url = url::Url::parse("https://paid.example.com/cover.jpg?token=abc&expires=123").unwrap();
        assert_eq!(ProviderUrlKind::classify(&url), ProviderUrlKind::SignedUrl);
        assert!(ProviderUrlKind::classify(&url).is_retryable_on_auth_failure());
    }

    #[test]
    fn plain_url_is_not_retryable() {
        let url = url::Url::parse("https://free.example.org/cover.jpg").unwrap();
        assert_eq!(ProviderUrlKind::classify(&url), ProviderUrlKind::Unsigned);
        assert!(!ProviderUrlKind::classify(&url).is_retryable_on_auth_failure());
    }
}
