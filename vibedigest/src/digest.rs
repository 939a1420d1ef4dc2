//! Request pipeline: acquire article text, then summarize it.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use common::{credential_from_env, Config};

use crate::acquisition::Acquisition;
use crate::error::DigestError;
use crate::llm::catalog::{CatalogPolicy, ModelCache, ModelCatalog, DEFAULT_CACHE_TTL_SECS};
use crate::llm::gemini::{GeminiProvider, DEFAULT_API_URL};
use crate::llm::summarizer::{OutputLanguage, Summarizer, DEFAULT_MAX_INPUT_CHARS};
use crate::llm::LlmProvider;
use crate::scraping::{build_client, build_extractors, DEFAULT_MIN_CHARS};
use crate::types::{ModelCandidate, SummaryResult};

pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";
const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DISCOVERY_TIMEOUT_SECS: u64 = 10;

pub struct Digest {
    acquisition: Acquisition,
    /// `None` when no usable API key was found at startup
    summarizer: Option<Summarizer>,
    language: OutputLanguage,
}

impl Digest {
    pub fn new(acquisition: Acquisition, summarizer: Option<Summarizer>) -> Self {
        let language = summarizer
            .as_ref()
            .map(|s| s.language().clone())
            .unwrap_or(OutputLanguage::SameAsSource);
        Self { acquisition, summarizer, language }
    }

    /// Wires backends, provider and catalog from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = build_client()?;

        let extraction = &config.extraction;
        let acquisition = Acquisition::new(
            build_extractors(extraction, client.clone())?,
            extraction.min_chars.unwrap_or(DEFAULT_MIN_CHARS),
        );

        let llm = &config.llm;
        let language = OutputLanguage::from_setting(config.summary.language.as_deref());
        let key_env = llm.api_key_env.as_deref().unwrap_or(DEFAULT_API_KEY_ENV);

        let summarizer = match credential_from_env(key_env) {
            Some(api_key) => {
                let generation_secs = llm.timeout_seconds.unwrap_or(DEFAULT_GENERATION_TIMEOUT_SECS);
                let provider: Arc<dyn LlmProvider> = Arc::new(
                    GeminiProvider::new(llm.api_url.as_deref().unwrap_or(DEFAULT_API_URL), api_key)
                        .with_client(client)
                        .with_timeouts(
                            generation_secs,
                            llm.discovery_timeout_seconds.unwrap_or(DEFAULT_DISCOVERY_TIMEOUT_SECS),
                        ),
                );
                let cache = Arc::new(ModelCache::new(Duration::from_secs(
                    llm.model_cache_ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS),
                )));
                let catalog = ModelCatalog::new(provider.clone(), CatalogPolicy::from_config(llm), cache);
                info!(key_env = %key_env, "Gemini provider initialized");
                Some(
                    Summarizer::new(provider, catalog)
                        .with_language(language.clone())
                        .with_max_input_chars(config.summary.max_input_chars.unwrap_or(DEFAULT_MAX_INPUT_CHARS))
                        .with_timeout(generation_secs),
                )
            }
            None => {
                warn!("API key env var '{}' not set, summarize requests will fail", key_env);
                None
            }
        };

        Ok(Self { acquisition, summarizer, language })
    }

    /// Acquires and summarizes one URL.
    ///
    /// A missing API key is reported before any backend is contacted.
    pub async fn summarize_url(&self, url: &str) -> Result<SummaryResult, DigestError> {
        let summarizer = self.summarizer.as_ref().ok_or(DigestError::MissingApiKey)?;
        let content = self.acquisition.acquire(url).await?;
        info!(url = %url, backend = %content.source_backend, "digest: summarizing");
        summarizer.summarize(&content.text).await
    }

    pub fn backend_names(&self) -> Vec<&'static str> {
        self.acquisition.backend_names()
    }

    pub fn language(&self) -> &OutputLanguage {
        &self.language
    }

    pub fn has_api_key(&self) -> bool {
        self.summarizer.is_some()
    }

    /// Current candidate queue, empty without an API key
    pub async fn candidate_models(&self) -> Vec<ModelCandidate> {
        match &self.summarizer {
            Some(summarizer) => summarizer.catalog().candidates().await,
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(language: &str, key_env: &str) -> Config {
        let mut config = Config::default();
        config.summary.language = Some(language.to_string());
        config.llm.api_key_env = Some(key_env.to_string());
        config
    }

    #[test]
    fn language_is_kept_without_an_api_key() {
        let digest = Digest::from_config(&config_with("Korean", "VIBEDIGEST_TEST_UNSET_KEY")).expect("digest");
        assert!(!digest.has_api_key());
        assert_eq!(digest.language(), &OutputLanguage::Fixed("Korean".to_string()));
        assert_eq!(digest.backend_names(), vec!["direct", "reader", "readability", "microlink", "mirror"]);
    }

    #[tokio::test]
    async fn missing_key_is_reported_before_fetching() {
        let digest = Digest::from_config(&config_with("source", "VIBEDIGEST_TEST_UNSET_KEY")).expect("digest");
        assert_eq!(digest.language(), &OutputLanguage::SameAsSource);
        assert!(digest.candidate_models().await.is_empty());

        let err = digest.summarize_url("http://127.0.0.1:1/never-fetched").await.unwrap_err();
        assert!(matches!(err, DigestError::MissingApiKey));
    }
}
