//! A free, no-key catalog/covers service in the style of the Open Library
//! API: ISBN lookup, edition metadata, and a community covers endpoint
//! typical of the free metadata tier.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use biblio_common::{Capability, EnrichmentError, Isbn13, Tier};
use biblio_registry::{CoverFetcher, CoverResult, CoverSize, Metadata, MetadataFetcher, Provider, ProviderContext};
use serde::Deserialize;

use crate::http_util::{build_client, classify_status, outcome_to_error, CONTACT_USER_AGENT, DEFAULT_TIMEOUT};

pub struct OpenCatalogConfig {
    pub base_url: String,
}

pub struct OpenCatalogAdapter {
    http: reqwest::Client,
    base_url: String,
    capabilities: HashSet<Capability>,
}

impl OpenCatalogAdapter {
    pub fn new(config: OpenCatalogConfig) -> Self {
        let mut capabilities = HashSet::new();
        capabilities.insert(Capability::MetadataEnrichment);
        capabilities.insert(Capability::CoverImages);

        Self {
            http: build_client(CONTACT_USER_AGENT, DEFAULT_TIMEOUT),
            base_url: config.base_url,
            capabilities,
        }
    }
}

#[async_trait]
impl Provider for OpenCatalogAdapter {
    fn name(&self) -> &str {
        "open-catalog"
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

#[derive(Deserialize, Default)]
struct CatalogRecord {
    title: Option<String>,
    subtitle: Option<String>,
    publishers: Option<Vec<String>>,
    number_of_pages: Option<i32>,
    publish_date: Option<String>,
    subjects: Option<Vec<String>>,
    authors: Option<Vec<CatalogAuthorRef>>,
}

#[derive(Deserialize)]
struct CatalogAuthorRef {
    name: Option<String>,
}

#[async_trait]
impl MetadataFetcher for OpenCatalogAdapter {
    async fn fetch_metadata(
        &self,
        isbn: &Isbn13,
        _ctx: &ProviderContext,
    ) -> Result<Option<Metadata>, EnrichmentError> {
        let url = format!("{}/isbn/{}.json", self.base_url, isbn.as_str());
        let response = self.http.get(&url).send().await.map_err(|_| {
            EnrichmentError::ProviderTimeout {
                provider: self.name().to_string(),
            }
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

        // Graceful parsing: a malformed body is treated as "no record",
        // never a fatal error.
        let record: CatalogRecord = match response.json().await {
            Ok(record) => record,
            Err(_) => return Ok(None),
        };

        Ok(Some(Metadata {
            title: record.title,
            subtitle: record.subtitle,
            publisher: record.publishers.and_then(|p| p.into_iter().next()),
            page_count: record.number_of_pages,
            publication_year: record.publish_date.as_deref().and_then(parse_leading_year),
            subjects: record.subjects.unwrap_or_default(),
            authors: record
                .authors
                .unwrap_or_default()
                .into_iter()
                .filter_map(|a| a.name)
                .collect(),
            isbns: vec![isbn.as_str().to_string()],
            ..Metadata::default()
        }))
    }
}

#[async_trait]
impl CoverFetcher for OpenCatalogAdapter {
    async fn fetch_cover(
        &self,
        isbn: &Isbn13,
        _ctx: &ProviderContext,
    ) -> Result<Option<CoverResult>, EnrichmentError> {
        let url = format!("{}/covers/isbn/{}-L.jpg", self.base_url, isbn.as_str());
        let response = self
            .http
            .head(&url)
            .send()
            .await
            .map_err(|_| EnrichmentError::ProviderTimeout {
                provider: self.name().to_string(),
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Ok(None);
        }

        Ok(Some(CoverResult {
            url,
            size: CoverSize::Large,
        }))
    }
}

fn parse_leading_year(text: &str) -> Option<i32> {
    text.split_whitespace()
        .filter_map(|token| token.trim_matches(|c: char| !c.is_ascii_digit()).parse::<i32>().ok())
        .find(|year| (1000..=2100).contains(year))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_leading_year_out_of_free_text_date() {
        assert_eq!(parse_leading_year("September 30, 1999"), Some(1999));
        assert_eq!(parse_leading_year("1st edition, 2005"), Some(2005));
        assert_eq!(parse_leading_year("unknown"), None);
    }
}
