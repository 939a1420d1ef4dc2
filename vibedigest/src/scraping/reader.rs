use anyhow::Result;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Response, StatusCode};
use tracing::{debug, warn};

use super::{send, success_text, BackendSettings, Extractor};

pub const DEFAULT_READER_URL: &str = "https://r.jina.ai";

/// Third-party reader proxy: the service fetches and renders the page and
/// answers with plain text.
///
/// With a key the request is authenticated; a key the service rejects is
/// dropped for one free-tier retry.
pub struct ReaderExtractor {
    settings: BackendSettings,
    base_url: String,
    api_key: Option<String>,
}

impl ReaderExtractor {
    pub fn new(settings: BackendSettings, api_key: Option<String>) -> Self {
        Self {
            settings,
            base_url: DEFAULT_READER_URL.to_string(),
            api_key,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn request(&self, url: &str, api_key: Option<&str>) -> Result<Response> {
        let mut request = self
            .settings
            .client
            .get(format!("{}/{}", self.base_url, url))
            .header(ACCEPT, "text/plain")
            .header("X-Return-Format", "text");
        if let Some(key) = api_key {
            request = request.header(AUTHORIZATION, format!("Bearer {}", key));
        }
        send(request, self.settings.timeout).await
    }
}

#[async_trait::async_trait]
impl Extractor for ReaderExtractor {
    fn name(&self) -> &'static str {
        "reader"
    }

    async fn extract(&self, url: &str) -> Result<String> {
        let mut response = self.request(url, self.api_key.as_deref()).await?;

        if self.api_key.is_some() && matches!(response.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            warn!(url = %url, status = %response.status(), "reader: key rejected, retrying without it");
            response = self.request(url, None).await?;
        }

        let text = success_text(response).await?;
        debug!(url = %url, text_chars = text.len(), "reader: text received");
        Ok(text.trim().to_string())
    }
}
