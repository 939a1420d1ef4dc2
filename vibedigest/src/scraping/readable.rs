use anyhow::{anyhow, bail, Context, Result};
use reqwest::header::{ACCEPT, USER_AGENT};
use std::io::Cursor;
use tracing::debug;
use url::Url;

use super::{html_to_text, send, BackendSettings, Extractor};

/// Readability-style extraction of the main article node.
///
/// The `readability` extractor is synchronous and CPU bound, so it runs on the
/// blocking pool instead of stalling the other backends.
pub struct ReadabilityExtractor {
    settings: BackendSettings,
}

impl ReadabilityExtractor {
    pub fn new(settings: BackendSettings) -> Self {
        Self { settings }
    }
}

#[async_trait::async_trait]
impl Extractor for ReadabilityExtractor {
    fn name(&self) -> &'static str {
        "readability"
    }

    async fn extract(&self, url: &str) -> Result<String> {
        let page_url = Url::parse(url).context("failed to parse article URL")?;

        let request = self
            .settings
            .client
            .get(page_url.clone())
            .header(USER_AGENT, &self.settings.user_agent)
            .header(ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8");
        let response = send(request, self.settings.timeout).await?;
        let status = response.status();
        if !status.is_success() {
            bail!("HTTP {}", status);
        }
        let bytes = response.bytes().await.context("failed to read response body")?;

        let product = tokio::task::spawn_blocking(move || {
            let mut reader = Cursor::new(bytes);
            readability::extractor::extract(&mut reader, &page_url).map_err(|e| e.to_string())
        })
        .await
        .context("readability task failed")?
        .map_err(|e| anyhow!("readability failed: {}", e))?;

        let body = if product.text.trim().is_empty() {
            html_to_text(&product.content)
        } else {
            product.text.split_whitespace().collect::<Vec<_>>().join(" ")
        };
        debug!(url = %url, text_chars = body.len(), "readability: article node extracted");

        if product.title.trim().is_empty() {
            Ok(body)
        } else {
            Ok(format!("{}\n\n{}", product.title.trim(), body))
        }
    }
}
