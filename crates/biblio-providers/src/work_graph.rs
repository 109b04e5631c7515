//! A free semantic work-graph service queried SPARQL-style, in the shape
//! of Wikidata: subject/genre enrichment and cross-reference external IDs
//! typical of the free metadata tier.

use std::collections::HashSet;

use async_trait::async_trait;
use biblio_common::{Capability, EnrichmentError, Isbn13, Tier};
use biblio_registry::{ExternalIdFetcher, ExternalIdResult, Provider, ProviderContext, SubjectFetcher};
use serde::Deserialize;

use crate::http_util::{build_client, classify_status, outcome_to_error, CONTACT_USER_AGENT, DEFAULT_TIMEOUT};

pub struct WorkGraphConfig {
    pub sparql_endpoint: String,
}

pub struct WorkGraphAdapter {
    http: reqwest::Client,
    sparql_endpoint: String,
    capabilities: HashSet<Capability>,
}

impl WorkGraphAdapter {
    pub fn new(config: WorkGraphConfig) -> Self {
        let mut capabilities = HashSet::new();
        capabilities.insert(Capability::SubjectEnrichment);
        capabilities.insert(Capability::EnhancedExternalIds);

        Self {
            http: build_client(CONTACT_USER_AGENT, DEFAULT_TIMEOUT),
            sparql_endpoint: config.sparql_endpoint,
            capabilities,
        }
    }

    fn isbn_query(&self, isbn: &Isbn13) -> String {
        format!(
            "SELECT ?item ?itemLabel WHERE {{ ?item wdt:P212 \"{}\" . SERVICE wikibase:label {{ bd:serviceParam wikibase:language \"en\" }} }}",
            isbn.as_str()
        )
    }
}

#[async_trait]
impl Provider for WorkGraphAdapter {
    fn name(&self) -> &str {
        "work-graph"
    }

    fn tier(&self) -> Tier {
        Tier::Free
    }

    fn capabilities(&self) -> &HashSet<Capability> {
        &self.capabilities
    }

    async fn is_available(&self, ctx: &ProviderContext) -> bool {
        let probe = self.http.head(&self.sparql_endpoint).send();
        tokio::select! {
            result = probe => result.map(|r| r.status().is_success() || r.status().is_redirection()).unwrap_or(false),
            _ = ctx.cancellation.cancelled() => false,
        }
    }
}

#[derive(Deserialize)]
struct SparqlBinding {
    #[serde(rename = "genreLabel")]
    genre_label: Option<SparqlValue>,
    #[serde(rename = "externalId")]
    external_id: Option<SparqlValue>,
}

#[derive(Deserialize)]
struct SparqlValue {
    value: String,
}

#[derive(Deserialize)]
struct SparqlResults {
    bindings: Vec<SparqlBinding>,
}

#[derive(Deserialize)]
struct SparqlResponseBody {
    results: SparqlResults,
}

async fn run_query(
    http: &reqwest::Client,
    endpoint: &str,
    query: &str,
    provider_name: &str,
) -> Result<Vec<SparqlBinding>, EnrichmentError> {
    let response = http
        .get(endpoint)
        .query(&[("query", query), ("format", "json")])
        .send()
        .await
        .map_err(|_| EnrichmentError::ProviderTimeout {
            provider: provider_name.to_string(),
        })?;

    if !response.status().is_success() {
        if let Some(err) = outcome_to_error(provider_name, classify_status(response.status())) {
            return Err(err);
        }
        return Ok(Vec::new());
    }

    match response.json::<SparqlResponseBody>().await {
        Ok(body) => Ok(body.results.bindings),
        Err(_) => Ok(Vec::new()),
    }
}

#[async_trait]
impl SubjectFetcher for WorkGraphAdapter {
    async fn fetch_subjects(
        &self,
        isbn: &Isbn13,
        _ctx: &ProviderContext,
    ) -> Result<Vec<String>, EnrichmentError> {
        let query = self.isbn_query(isbn);
        let bindings = run_query(&self.http, &self.sparql_endpoint, &query, self.name()).await?;
        Ok(bindings
            .into_iter()
            .filter_map(|b| b.genre_label.map(|v| v.value))
            .collect())
    }
}

#[async_trait]
impl ExternalIdFetcher for WorkGraphAdapter {
    async fn fetch_external_ids(
        &self,
        isbn: &Isbn13,
        _ctx: &ProviderContext,
    ) -> Result<Vec<ExternalIdResult>, EnrichmentError> {
        let query = self.isbn_query(isbn);
        let bindings = run_query(&self.http, &self.sparql_endpoint, &query, self.name()).await?;
        Ok(bindings
            .into_iter()
            .filter_map(|b| b.external_id)
            .map(|v| ExternalIdResult {
                id_type: "wikidata_qid".to_string(),
                value: v.value,
                confidence: 85,
            })
            .collect())
    }
}
