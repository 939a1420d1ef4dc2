use anyhow::{anyhow, bail, Context, Result};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{LlmProvider, LlmRequest, LlmResponse, UsageMetadata};

pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com";

/// The key travels in a header so it never shows up in URLs or error text.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Discovery stops after this many pages of the model listing.
const MAX_DISCOVERY_PAGES: usize = 5;

/// Google Gemini provider over the public REST API
pub struct GeminiProvider {
    base_url: String,
    api_key: String,
    default_timeout: Duration,
    discovery_timeout: Duration,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            default_timeout: Duration::from_secs(30),
            discovery_timeout: Duration::from_secs(10),
            client: reqwest::Client::new(),
        }
    }

    /// Reuse a process-wide client instead of a private one
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_timeouts(mut self, generation_secs: u64, discovery_secs: u64) -> Self {
        self.default_timeout = Duration::from_secs(generation_secs);
        self.discovery_timeout = Duration::from_secs(discovery_secs);
        self
    }
}

#[async_trait::async_trait]
impl LlmProvider for GeminiProvider {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse> {
        let timeout = request
            .timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        let req_body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: Some(request.prompt) }],
            }],
        };

        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, request.model);
        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .timeout(timeout)
            .json(&req_body)
            .send()
            .await
            .map_err(|e| transport_error(e, timeout))
            .context("Gemini HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = error_message(&body).unwrap_or(body);
            if status == StatusCode::TOO_MANY_REQUESTS {
                bail!("quota exceeded ({}): {}", status, detail);
            }
            bail!("Gemini API error {}: {}", status, detail);
        }

        let resp_body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| transport_error(e, timeout))
            .context("Failed to parse Gemini response")?;

        let content = resp_body
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .context("Gemini response missing text content")?;

        if content.trim().is_empty() {
            bail!("Gemini returned empty text");
        }

        let usage = resp_body
            .usage_metadata
            .map(|u| UsageMetadata {
                prompt_tokens: u.prompt_token_count.unwrap_or(0),
                completion_tokens: u.candidates_token_count.unwrap_or(0),
                total_tokens: u.total_token_count.unwrap_or(0),
            })
            .unwrap_or_default();

        Ok(LlmResponse {
            content,
            usage,
            model: resp_body.model_version.unwrap_or(request.model),
        })
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/v1beta/models", self.base_url);
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_DISCOVERY_PAGES {
            let mut query = vec![("pageSize", "100".to_string())];
            if let Some(token) = page_token.take() {
                query.push(("pageToken", token));
            }

            let response = self
                .client
                .get(&url)
                .header(API_KEY_HEADER, &self.api_key)
                .query(&query)
                .timeout(self.discovery_timeout)
                .send()
                .await
                .map_err(|e| transport_error(e, self.discovery_timeout))
                .context("model discovery request failed")?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                bail!("model discovery error {}: {}", status, error_message(&body).unwrap_or(body));
            }

            let page: ListModelsResponse = response
                .json()
                .await
                .map_err(|e| transport_error(e, self.discovery_timeout))
                .context("Failed to parse model listing")?;
            models.extend(
                page.models
                    .into_iter()
                    .filter(|m| m.supported_generation_methods.iter().any(|g| g == "generateContent"))
                    .map(|m| m.name.trim_start_matches("models/").to_string()),
            );

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!(count = models.len(), "gemini: models discovered");
        Ok(models)
    }
}

/// reqwest errors without the request URL; timeouts name the limit.
fn transport_error(error: reqwest::Error, timeout: Duration) -> anyhow::Error {
    if error.is_timeout() {
        return anyhow!("timed out after {}s", timeout.as_secs());
    }
    anyhow::Error::new(error.without_url())
}

/// Pulls `error.message` out of a Gemini error body.
fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error.message)
}

// Gemini REST request/response structures
#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<Usage>,
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Usage {
    prompt_token_count: Option<usize>,
    candidates_token_count: Option<usize>,
    total_token_count: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelInfo {
    name: String,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_is_extracted() {
        let body = r#"{"error": {"code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(error_message(body).as_deref(), Some("Resource has been exhausted"));
        assert_eq!(error_message("<html>bad gateway</html>"), None);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let provider = GeminiProvider::new("http://localhost:1234/", "k");
        assert_eq!(provider.base_url, "http://localhost:1234");
    }
}
