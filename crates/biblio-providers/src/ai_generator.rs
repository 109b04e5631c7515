//! AI book-generation adapters: given a free-text prompt and a target
//! count, return candidate `{title, author, publish_date, confidence,
//! source}` tuples. Two concrete providers share one
//! request/response shape but hold distinct API keys and quotas, matching
//! the corpus's one-trait-many-implementations family
//! (`NotificationChannel`/`SlackChannel`/`EmailChannel`/`WebhookChannel`).

use std::collections::HashSet;

use async_trait::async_trait;
use biblio_common::{Capability, EnrichmentError, Tier};
use biblio_registry::{BookCandidate, BookGenerator, Provider, ProviderContext};
use serde::{Deserialize, Serialize};

use crate::http_util::{build_client, classify_status, outcome_to_error, CONTACT_USER_AGENT, AI_GENERATION_TIMEOUT};

/// Which upstream chat-completion API this adapter speaks; both providers
/// below use the same request/response envelope shape, differing only in
/// endpoint and auth header.
pub struct GeneratorEndpoint {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

fn build_prompt(prompt: &str, count: u32) -> String {
    format!(
        "Suggest {count} real, published books matching: {prompt}. \
         Respond as a JSON array of objects with fields title, author, publish_date, confidence (0-100)."
    )
}

#[derive(Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponseBody {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Deserialize)]
struct GeneratedBookEntry {
    title: String,
    author: String,
    publish_date: Option<String>,
    confidence: Option<u8>,
}

async fn call_chat_completion(
    http: &reqwest::Client,
    endpoint: &GeneratorEndpoint,
    provider_name: &str,
    prompt: &str,
    count: u32,
) -> Result<Vec<BookCandidate>, EnrichmentError> {
    let body = ChatRequestBody {
        model: &endpoint.model,
        messages: vec![ChatMessage {
            role: "user",
            content: build_prompt(prompt, count),
        }],
    };

    let response = http
        .post(format!("{}/chat/completions", endpoint.base_url))
        .bearer_auth(&endpoint.api_key)
        .json(&body)
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

    let parsed: ChatResponseBody = response
        .json()
        .await
        .map_err(|e| EnrichmentError::ProviderError {
            provider: provider_name.to_string(),
            message: e.to_string(),
        })?;

    let Some(first_choice) = parsed.choices.into_iter().next() else {
        return Ok(Vec::new());
    };

    // Malformed model output is dropped, not fatal.
    let entries: Vec<GeneratedBookEntry> =
        serde_json::from_str(&first_choice.message.content).unwrap_or_default();

    Ok(entries
        .into_iter()
        .map(|entry| BookCandidate {
            title: entry.title,
            author: entry.author,
            publish_date: entry.publish_date,
            confidence: entry.confidence.unwrap_or(50),
            source: provider_name.to_string(),
        })
        .collect())
}

pub struct GeminiGeneratorAdapter {
    http: reqwest::Client,
    endpoint: GeneratorEndpoint,
    capabilities: HashSet<Capability>,
}

impl GeminiGeneratorAdapter {
    pub fn new(endpoint: GeneratorEndpoint) -> Self {
        let mut capabilities = HashSet::new();
        capabilities.insert(Capability::BookGeneration);
        Self {
            http: build_client(CONTACT_USER_AGENT, AI_GENERATION_TIMEOUT),
            endpoint,
            capabilities,
        }
    }
}

#[async_trait]
impl Provider for GeminiGeneratorAdapter {
    fn name(&self) -> &str {
        "gemini-generator"
    }
    fn tier(&self) -> Tier {
        Tier::Ai
    }
    fn capabilities(&self) -> &HashSet<Capability> {
        &self.capabilities
    }
    async fn is_available(&self, _ctx: &ProviderContext) -> bool {
        !self.endpoint.api_key.is_empty()
    }
}

#[async_trait]
impl BookGenerator for GeminiGeneratorAdapter {
    async fn generate_books(
        &self,
        prompt: &str,
        count: u32,
        _ctx: &ProviderContext,
    ) -> Result<Vec<BookCandidate>, EnrichmentError> {
        call_chat_completion(&self.http, &self.endpoint, self.name(), prompt, count).await
    }
}

pub struct XaiGeneratorAdapter {
    http: reqwest::Client,
    endpoint: GeneratorEndpoint,
    capabilities: HashSet<Capability>,
}

impl XaiGeneratorAdapter {
    pub fn new(endpoint: GeneratorEndpoint) -> Self {
        let mut capabilities = HashSet::new();
        capabilities.insert(Capability::BookGeneration);
        Self {
            http: build_client(CONTACT_USER_AGENT, AI_GENERATION_TIMEOUT),
            endpoint,
            capabilities,
        }
    }
}

#[async_trait]
impl Provider for XaiGeneratorAdapter {
    fn name(&self) -> &str {
        "xai-generator"
    }
    fn tier(&self) -> Tier {
        Tier::Ai
    }
    fn capabilities(&self) -> &HashSet<Capability> {
        &self.capabilities
    }
    async fn is_available(&self, _ctx: &ProviderContext) -> bool {
        !self.endpoint.api_key.is_empty()
    }
}

#[async_trait]
impl BookGenerator for XaiGeneratorAdapter {
    async fn generate_books(
        &self,
        prompt: &str,
        count: u32,
        _ctx: &ProviderContext,
    ) -> Result<Vec<BookCandidate>, EnrichmentError> {
        call_chat_completion(&self.http, &self.endpoint, self.name(), prompt, count).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_prompt_includes_count_and_text() {
        let prompt = build_prompt("space opera set on generation ships", 5);
        assert!(prompt.contains("5 real"));
        assert!(prompt.contains("generation ships"));
    }
}
