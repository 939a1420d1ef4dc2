use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::debug;

use super::{send, BackendSettings, Extractor};

pub const DEFAULT_MICROLINK_URL: &str = "https://api.microlink.io";

/// Metadata/content API: asks the service for the page title, description and
/// the text of the main content node.
pub struct MicrolinkExtractor {
    settings: BackendSettings,
    base_url: String,
}

impl MicrolinkExtractor {
    pub fn new(settings: BackendSettings) -> Self {
        Self {
            settings,
            base_url: DEFAULT_MICROLINK_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }
}

#[derive(Debug, Deserialize)]
struct MicrolinkResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<MicrolinkData>,
}

#[derive(Debug, Default, Deserialize)]
struct MicrolinkData {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

#[async_trait::async_trait]
impl Extractor for MicrolinkExtractor {
    fn name(&self) -> &'static str {
        "microlink"
    }

    async fn extract(&self, url: &str) -> Result<String> {
        let request = self.settings.client.get(&self.base_url).query(&[
            ("url", url),
            ("meta", "true"),
            ("data.content.selector", "article, main, body"),
            ("data.content.attr", "text"),
        ]);
        let response = send(request, self.settings.timeout).await?;
        let status = response.status();
        if !status.is_success() {
            bail!("HTTP {}", status);
        }

        let body: MicrolinkResponse = response.json().await.context("malformed microlink response")?;
        if body.status != "success" {
            bail!(
                "microlink status '{}': {}",
                body.status,
                body.message.unwrap_or_else(|| "no message".to_string())
            );
        }

        let data = body.data.unwrap_or_default();
        let text = [data.title, data.description, data.content]
            .into_iter()
            .flatten()
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        debug!(url = %url, text_chars = text.len(), "microlink: metadata received");
        Ok(text)
    }
}
