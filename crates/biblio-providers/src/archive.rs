//! An archive-style provider, strong on pre-2000 editions; contributes
//! edition variants and the occasional ratings signal drawn from patron
//! review counts.

use std::collections::HashSet;

use async_trait::async_trait;
use biblio_common::{Capability, EnrichmentError, Isbn13, Tier};
use biblio_registry::{EditionVariant, EditionVariantFetcher, Provider, ProviderContext, RatingResult, RatingsFetcher};
use serde::Deserialize;

use crate::http_util::{build_client, classify_status, outcome_to_error, CONTACT_USER_AGENT, DEFAULT_TIMEOUT};

pub struct ArchiveConfig {
    pub base_url: String,
}

pub struct ArchiveAdapter {
    http: reqwest::Client,
    base_url: String,
    capabilities: HashSet<Capability>,
}

impl ArchiveAdapter {
    pub fn new(config: ArchiveConfig) -> Self {
        let mut capabilities = HashSet::new();
        capabilities.insert(Capability::EditionVariants);
        capabilities.insert(Capability::Ratings);

        Self {
            http: build_client(CONTACT_USER_AGENT, DEFAULT_TIMEOUT),
            base_url: config.base_url,
            capabilities,
        }
    }
}

#[async_trait]
impl Provider for ArchiveAdapter {
    fn name(&self) -> &str {
        "archive"
    }

    fn tier(&self) -> Tier {
        Tier::Free
    }

    fn capabilities(&self) -> &HashSet<Capability> {
        &self.capabilities
    }

    async fn is_available(&self, ctx: &ProviderContext) -> bool {
        let probe = self.http.head(&self.base_url).send();
        tokio::select! {
            result = probe => result.map(|r| r.status().is_success() || r.status().is_redirection()).unwrap_or(false),
            _ = ctx.cancellation.cancelled() => false,
        }
    }
}

#[derive(Deserialize)]
struct ArchiveEditionRecord {
    isbn: String,
    format: Option<String>,
    language: Option<String>,
    publisher: Option<String>,
}

#[derive(Deserialize)]
struct ArchiveEditionsResponseBody {
    editions: Vec<ArchiveEditionRecord>,
}

#[async_trait]
impl EditionVariantFetcher for ArchiveAdapter {
    async fn fetch_edition_variants(
        &self,
        isbn: &Isbn13,
        _ctx: &ProviderContext,
    ) -> Result<Vec<EditionVariant>, EnrichmentError> {
        let url = format!("{}/editions/{}.json", self.base_url, isbn.as_str());
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|_| EnrichmentError::ProviderTimeout {
                provider: self.name().to_string(),
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            if let Some(err) = outcome_to_error(self.name(), classify_status(response.status())) {
                return Err(err);
            }
            return Ok(Vec::new());
        }

        let body: ArchiveEditionsResponseBody = match response.json().await {
            Ok(body) => body,
            Err(_) => return Ok(Vec::new()),
        };

        Ok(body
            .editions
            .into_iter()
            .filter_map(|record| {
                let isbn = Isbn13::normalize(&record.isbn).ok()?;
                Some(EditionVariant {
                    isbn,
                    format: record.format.unwrap_or_else(|| "unknown".to_string()),
                    language: record.language,
                    publisher: record.publisher,
                })
            })
            .collect())
    }
}

#[derive(Deserialize)]
struct ArchiveRatingResponseBody {
    average: Option<f64>,
    review_count: Option<u32>,
}

#[async_trait]
impl RatingsFetcher for ArchiveAdapter {
    async fn fetch_ratings(
        &self,
        isbn: &Isbn13,
        _ctx: &ProviderContext,
    ) -> Result<Option<RatingResult>, EnrichmentError> {
        let url = format!("{}/ratings/{}.json", self.base_url, isbn.as_str());
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|_| EnrichmentError::ProviderTimeout {
                provider: self.name().to_string(),
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            if let Some(err) = outcome_to_error(self.name(), classify_status(response.status())) {
                return Err(err);
            }
            return Ok(None);
        }

        let body: ArchiveRatingResponseBody = match response.json().await {
            Ok(body) => body,
            Err(_) => return Ok(None),
        };

        // A thin review count is a low-confidence signal; scale confidence
        // by volume, capped at 90 (archive ratings never outrank the paid
        // adapter's own curated score).
        Ok(body.average.map(|value| {
            let confidence = body.review_count.unwrap_or(0).min(90) as u8;
            RatingResult { value, confidence }
        }))
    }
}
