//! Extractor backends: independent ways of turning an article URL into plain text.
//!
//! Every backend implements [`Extractor`]. They share nothing but an HTTP client
//! handle, and every failure is returned as an error for the coordinator to record.

use anyhow::{bail, Context, Result};
use reqwest::{Client, RequestBuilder, Response};
use scraper::{ElementRef, Html};
use std::sync::Arc;
use std::time::Duration;

use common::{credential_from_env, ExtractionConfig};

pub mod direct;
pub mod microlink;
pub mod mirror;
pub mod readable;
pub mod reader;

pub use direct::DirectExtractor;
pub use microlink::MicrolinkExtractor;
pub use mirror::MirrorExtractor;
pub use readable::ReadabilityExtractor;
pub use reader::ReaderExtractor;

pub const DEFAULT_BACKENDS: &[&str] = &["direct", "reader", "readability", "microlink", "mirror"];
pub const DEFAULT_MIN_CHARS: usize = 200;
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Placeholder signatures only count when they show up this close to the start.
pub const PLACEHOLDER_WINDOW: usize = 500;

/// Phrases of error pages served with a 200 status by mirrors, proxies and bot walls.
const PLACEHOLDER_SIGNATURES: &[&str] = &[
    "did not match any documents",
    "before you continue to google",
    "just a moment...",
    "enable javascript and cookies to continue",
    "checking your browser before accessing",
    "attention required! | cloudflare",
    "wayback machine doesn't have that page archived",
    "hrm. the wayback machine",
    "are you a robot",
];

/// Elements whose text never belongs to the article body.
const STRIPPED_TAGS: &[&str] = &["script", "style", "nav", "footer", "header", "iframe", "noscript"];

/// A single content extraction strategy.
#[async_trait::async_trait]
pub trait Extractor: Send + Sync {
    /// Stable name used in diagnostics and in configuration.
    fn name(&self) -> &'static str;

    /// Fetch `url` and return the article text.
    async fn extract(&self, url: &str) -> Result<String>;
}

/// True when the start of `text` looks like a search page, bot wall or mirror error page.
pub fn looks_like_placeholder_page(text: &str) -> bool {
    let window: String = text.chars().take(PLACEHOLDER_WINDOW).collect::<String>().to_lowercase();
    PLACEHOLDER_SIGNATURES.iter().any(|signature| window.contains(signature))
}

/// Checks that extracted text is plausible article content.
/// The error is the short rejection reason reported in diagnostics.
pub fn check_qualifying(text: &str, min_chars: usize) -> std::result::Result<(), String> {
    let length = text.trim().chars().count();
    if length == 0 {
        return Err("empty text".to_string());
    }
    if length < min_chars {
        return Err(format!("too short ({} chars, need {})", length, min_chars));
    }
    if looks_like_placeholder_page(text) {
        return Err("placeholder page".to_string());
    }
    Ok(())
}

/// Strips non-content elements and flattens the remaining text nodes.
pub fn html_to_text(raw_html: &str) -> String {
    let document = Html::parse_document(raw_html);
    let mut out = String::new();
    collect_text(document.root_element(), &mut out);
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            out.push(' ');
        } else if let Some(child_element) = ElementRef::wrap(child) {
            if !STRIPPED_TAGS.contains(&child_element.value().name()) {
                collect_text(child_element, out);
            }
        }
    }
}

/// Sends a request with a per-call timeout, reporting timeouts distinctly.
pub(crate) async fn send(request: RequestBuilder, timeout: Duration) -> Result<Response> {
    request.timeout(timeout).send().await.map_err(|e| {
        if e.is_timeout() {
            anyhow::anyhow!("timed out after {}s", timeout.as_secs())
        } else {
            anyhow::Error::new(e).context("request failed")
        }
    })
}

/// Fails on non-2xx statuses, otherwise returns the body as text.
pub(crate) async fn success_text(response: Response) -> Result<String> {
    let status = response.status();
    if !status.is_success() {
        bail!("HTTP {}", status);
    }
    response.text().await.context("failed to read response body")
}

/// Shared settings handed to every backend
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub client: Client,
    pub timeout: Duration,
    pub user_agent: String,
}

/// Builds one shared HTTP client for all outbound calls.
pub fn build_client() -> Result<Client> {
    Client::builder()
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .context("failed to build reqwest client")
}

/// Instantiates the configured backends in preference order.
pub fn build_extractors(config: &ExtractionConfig, client: Client) -> Result<Vec<Arc<dyn Extractor>>> {
    let settings = BackendSettings {
        client,
        timeout: Duration::from_secs(config.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        user_agent: config.user_agent.clone().unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
    };

    let names: Vec<String> = config
        .backends
        .clone()
        .unwrap_or_else(|| DEFAULT_BACKENDS.iter().map(|s| s.to_string()).collect());

    let mut extractors: Vec<Arc<dyn Extractor>> = Vec::with_capacity(names.len());
    for name in &names {
        let extractor: Arc<dyn Extractor> = match name.as_str() {
            "direct" => Arc::new(DirectExtractor::new(settings.clone())),
            "reader" => {
                let api_key = credential_from_env(config.reader_api_key_env.as_deref().unwrap_or("JINA_API_KEY"));
                let mut reader = ReaderExtractor::new(settings.clone(), api_key);
                if let Some(base) = &config.reader_url {
                    reader = reader.with_base_url(base);
                }
                Arc::new(reader)
            }
            "readability" => Arc::new(ReadabilityExtractor::new(settings.clone())),
            "microlink" => {
                let mut microlink = MicrolinkExtractor::new(settings.clone());
                if let Some(base) = &config.microlink_url {
                    microlink = microlink.with_base_url(base);
                }
                Arc::new(microlink)
            }
            "mirror" => {
                let mut mirror = MirrorExtractor::new(settings.clone());
                if let Some(prefix) = &config.mirror_url {
                    mirror = mirror.with_prefix(prefix);
                }
                Arc::new(mirror)
            }
            other => bail!("unknown extraction backend '{}'", other),
        };
        if extractors.iter().any(|e| e.name() == extractor.name()) {
            bail!("extraction backend '{}' listed twice", name);
        }
        extractors.push(extractor);
    }

    if extractors.is_empty() {
        bail!("no extraction backends configured");
    }
    Ok(extractors)
}
