use anyhow::Result;
use reqwest::header::USER_AGENT;
use tracing::debug;

use super::{html_to_text, send, success_text, BackendSettings, Extractor};

/// Wayback Machine redirect to the most recent snapshot of a URL.
pub const DEFAULT_MIRROR_PREFIX: &str = "https://web.archive.org/web/2/";

/// Reads the page from a cache mirror instead of the origin site.
pub struct MirrorExtractor {
    settings: BackendSettings,
    prefix: String,
}

impl MirrorExtractor {
    pub fn new(settings: BackendSettings) -> Self {
        Self {
            settings,
            prefix: DEFAULT_MIRROR_PREFIX.to_string(),
        }
    }

    /// The article URL is appended verbatim to `prefix`.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }
}

#[async_trait::async_trait]
impl Extractor for MirrorExtractor {
    fn name(&self) -> &'static str {
        "mirror"
    }

    async fn extract(&self, url: &str) -> Result<String> {
        let mirror_url = format!("{}{}", self.prefix, url);
        let request = self
            .settings
            .client
            .get(&mirror_url)
            .header(USER_AGENT, &self.settings.user_agent);

        let html = success_text(send(request, self.settings.timeout).await?).await?;
        let text = html_to_text(&html);
        debug!(url = %url, mirror = %mirror_url, text_chars = text.len(), "mirror: snapshot stripped");
        Ok(text)
    }
}
