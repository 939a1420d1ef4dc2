use anyhow::Result;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use tracing::debug;

use super::{html_to_text, send, success_text, BackendSettings, Extractor};

/// Fetches the page itself with browser-like headers and strips the markup.
pub struct DirectExtractor {
    settings: BackendSettings,
}

impl DirectExtractor {
    pub fn new(settings: BackendSettings) -> Self {
        Self { settings }
    }
}

#[async_trait::async_trait]
impl Extractor for DirectExtractor {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn extract(&self, url: &str) -> Result<String> {
        let request = self
            .settings
            .client
            .get(url)
            .header(USER_AGENT, &self.settings.user_agent)
            .header(ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9");

        let html = success_text(send(request, self.settings.timeout).await?).await?;
        let text = html_to_text(&html);
        debug!(url = %url, html_bytes = html.len(), text_chars = text.len(), "direct: page stripped");
        Ok(text)
    }
}
