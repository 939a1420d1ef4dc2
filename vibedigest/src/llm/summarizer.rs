// Summarization executor
use std::sync::Arc;
use tracing::{info, warn};

use super::catalog::ModelCatalog;
use super::{LlmProvider, LlmRequest};
use crate::error::DigestError;
use crate::types::{GenerationAttempt, ModelCandidate, Outcome, SummaryResult};

/// Hard cap on article characters placed in the prompt
pub const DEFAULT_MAX_INPUT_CHARS: usize = 30_000;

/// Language policy for generated summaries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLanguage {
    /// Answer in the language of the article
    SameAsSource,
    /// Always answer in this language
    Fixed(String),
}

impl OutputLanguage {
    /// `None`, `""`, `"source"` and `"auto"` keep the article's language.
    pub fn from_setting(setting: Option<&str>) -> Self {
        match setting.map(str::trim) {
            None | Some("") => OutputLanguage::SameAsSource,
            Some(s) if s.eq_ignore_ascii_case("source") || s.eq_ignore_ascii_case("auto") => {
                OutputLanguage::SameAsSource
            }
            Some(language) => OutputLanguage::Fixed(language.to_string()),
        }
    }

    fn instruction(&self) -> String {
        match self {
            OutputLanguage::SameAsSource => "The summary must be in the same language as the content.".to_string(),
            OutputLanguage::Fixed(language) => format!("The summary must be written in {}.", language),
        }
    }
}

/// First `cap` characters of `text` (characters, not bytes)
pub fn truncate_chars(text: &str, cap: usize) -> &str {
    match text.char_indices().nth(cap) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Fixed prompt template; `content` must already be truncated.
pub fn build_prompt(content: &str, language: &OutputLanguage) -> String {
    format!(
        r#"Please summarize the following content. {}

Format:
1. One sentence headline (bold)
2. 3 Key Points (bullet list)
3. Insight Comment (italic)

Use only the content below. Do not add facts that are not in it.

Content:
{}
"#,
        language.instruction(),
        content
    )
}

pub struct Summarizer {
    provider: Arc<dyn LlmProvider>,
    catalog: ModelCatalog,
    language: OutputLanguage,
    max_input_chars: usize,
    timeout_seconds: Option<u64>,
}

impl Summarizer {
    pub fn new(provider: Arc<dyn LlmProvider>, catalog: ModelCatalog) -> Self {
        Self {
            provider,
            catalog,
            language: OutputLanguage::SameAsSource,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            timeout_seconds: None,
        }
    }

    pub fn with_language(mut self, language: OutputLanguage) -> Self {
        self.language = language;
        self
    }

    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars;
        self
    }

    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = Some(timeout_seconds);
        self
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn language(&self) -> &OutputLanguage {
        &self.language
    }

    /// Tries each candidate model in order; the first non-empty answer wins.
    pub async fn summarize(&self, article_text: &str) -> Result<SummaryResult, DigestError> {
        let content = truncate_chars(article_text, self.max_input_chars);
        let prompt = build_prompt(content, &self.language);
        let queue = self.catalog.candidates().await;

        let mut last_error: Option<String> = None;
        for candidate in queue {
            let attempt = self.attempt(candidate, &prompt).await;
            match attempt.outcome {
                Outcome::Success(summary) => {
                    info!(
                        model = %attempt.model.identifier,
                        rank = attempt.model.priority_rank,
                        input_chars = content.chars().count(),
                        "summarizer: summary generated"
                    );
                    return Ok(SummaryResult { summary });
                }
                Outcome::Failure(reason) => {
                    warn!(model = %attempt.model.identifier, "summarizer: model failed: {}", reason);
                    last_error = Some(format!("{}: {}", attempt.model.identifier, reason));
                }
            }
        }

        Err(DigestError::GenerationExhausted {
            last_error: last_error.unwrap_or_else(|| "no candidate models".to_string()),
        })
    }

    async fn attempt(&self, model: ModelCandidate, prompt: &str) -> GenerationAttempt {
        let request = LlmRequest {
            model: model.identifier.clone(),
            prompt: prompt.to_string(),
            timeout_seconds: self.timeout_seconds,
        };

        let outcome = match self.provider.generate(request).await {
            Ok(response) if !response.content.trim().is_empty() => {
                info!(
                    model = %response.model,
                    total_tokens = response.usage.total_tokens,
                    "summarizer: generation succeeded"
                );
                Outcome::Success(response.content.trim().to_string())
            }
            Ok(_) => Outcome::Failure("empty response".to_string()),
            Err(e) => Outcome::Failure(format!("{:#}", e)),
        };

        GenerationAttempt { model, outcome }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::catalog::{CatalogPolicy, ModelCache};
    use crate::llm::{LlmResponse, UsageMetadata};
    use anyhow::{anyhow, Result};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Answers per model from a script and records every call.
    struct ScriptedModels {
        answers: HashMap<&'static str, std::result::Result<&'static str, &'static str>>,
        calls: Mutex<Vec<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModels {
        fn new(answers: &[(&'static str, std::result::Result<&'static str, &'static str>)]) -> Arc<Self> {
            Arc::new(Self {
                answers: answers.iter().cloned().collect(),
                calls: Mutex::new(Vec::new()),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl LlmProvider for ScriptedModels {
        async fn generate(&self, request: LlmRequest) -> Result<LlmResponse> {
            self.calls.lock().unwrap().push(request.model.clone());
            self.prompts.lock().unwrap().push(request.prompt.clone());
            match self.answers.get(request.model.as_str()) {
                Some(Ok(text)) => Ok(LlmResponse {
                    content: text.to_string(),
                    usage: UsageMetadata::default(),
                    model: request.model,
                }),
                Some(Err(reason)) => Err(anyhow!(reason.to_string())),
                None => Err(anyhow!("404 model not found")),
            }
        }

        async fn list_models(&self) -> Result<Vec<String>> {
            Err(anyhow!("discovery unavailable"))
        }
    }

    fn summarizer_over(provider: Arc<ScriptedModels>, preferred: &[&str]) -> Summarizer {
        let policy = CatalogPolicy {
            preferred: preferred.iter().map(|s| s.to_string()).collect(),
            excluded: vec![],
            default_model: "default-model".into(),
        };
        let catalog = ModelCatalog::new(provider.clone(), policy, Arc::new(ModelCache::disabled()));
        Summarizer::new(provider, catalog)
    }

    #[tokio::test]
    async fn first_success_short_circuits() {
        let provider = ScriptedModels::new(&[
            ("m1", Err("quota exceeded (429 Too Many Requests)")),
            ("m2", Ok("**Headline**\n- a\n- b\n- c\n*insight*")),
            ("m3", Ok("should never be used")),
        ]);
        let summarizer = summarizer_over(provider.clone(), &["m1", "m2", "m3"]);

        let result = summarizer.summarize("article text").await.expect("summary");
        assert_eq!(result.summary, "**Headline**\n- a\n- b\n- c\n*insight*");
        assert_eq!(*provider.calls.lock().unwrap(), vec!["m1", "m2"]);
    }

    #[tokio::test]
    async fn exhausted_queue_reports_last_failure_only() {
        let provider = ScriptedModels::new(&[
            ("m1", Err("quota exceeded on m1")),
            ("m2", Ok("   ")),
            ("m3", Err("503 overloaded")),
        ]);
        let summarizer = summarizer_over(provider.clone(), &["m1", "m2", "m3"]);

        let err = summarizer.summarize("article text").await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("m3: 503 overloaded"));
        assert!(!message.contains("quota exceeded on m1"));
        assert_eq!(provider.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn prompt_holds_exactly_the_truncated_text() {
        let provider = ScriptedModels::new(&[("m1", Ok("summary"))]);
        let summarizer = summarizer_over(provider.clone(), &["m1"]).with_max_input_chars(50);

        let article = format!("{}§§§§", "x".repeat(50));
        summarizer.summarize(&article).await.expect("summary");

        let prompts = provider.prompts.lock().unwrap();
        assert!(prompts[0].contains(&"x".repeat(50)));
        assert!(!prompts[0].contains(&"x".repeat(51)));
        assert!(!prompts[0].contains('§'));
    }

    #[test]
    fn truncation_counts_characters() {
        assert_eq!(truncate_chars("héllo wörld", 4), "héll");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(truncate_chars("", 3), "");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn language_policy_is_explicit() {
        assert_eq!(OutputLanguage::from_setting(None), OutputLanguage::SameAsSource);
        assert_eq!(OutputLanguage::from_setting(Some("source")), OutputLanguage::SameAsSource);
        assert_eq!(OutputLanguage::from_setting(Some(" Auto ")), OutputLanguage::SameAsSource);
        assert_eq!(
            OutputLanguage::from_setting(Some("Korean")),
            OutputLanguage::Fixed("Korean".to_string())
        );

        let prompt = build_prompt("body", &OutputLanguage::Fixed("Korean".into()));
        assert!(prompt.contains("written in Korean"));
        assert!(prompt.contains("One sentence headline (bold)"));
        assert!(prompt.contains("3 Key Points (bullet list)"));
        assert!(prompt.contains("Insight Comment (italic)"));
        assert!(prompt.ends_with("body\n"));
    }
}
