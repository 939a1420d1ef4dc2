//! Acquisition coordinator: runs every extractor backend concurrently against one
//! URL and keeps the first qualifying result in preference order.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::error::DigestError;
use crate::scraping::{check_qualifying, Extractor};
use crate::types::{AcquiredContent, ExtractionAttempt, Outcome};

/// Separator between backend reasons in the aggregate diagnostic.
pub const DIAGNOSTIC_SEPARATOR: &str = " | ";

pub struct Acquisition {
    extractors: Vec<Arc<dyn Extractor>>,
    min_chars: usize,
}

impl Acquisition {
    /// `extractors` are listed in preference order.
    pub fn new(extractors: Vec<Arc<dyn Extractor>>, min_chars: usize) -> Self {
        Self { extractors, min_chars }
    }

    pub fn backend_names(&self) -> Vec<&'static str> {
        self.extractors.iter().map(|e| e.name()).collect()
    }

    /// Starts every backend at once and waits until all of them have settled.
    /// Attempts come back in preference order whatever order they finished in.
    pub async fn run_all(&self, url: &str) -> Vec<ExtractionAttempt> {
        let handles = self.extractors.iter().map(|extractor| {
            let extractor = Arc::clone(extractor);
            let url = url.to_string();
            tokio::spawn(async move {
                let started = Instant::now();
                let outcome = Outcome::from_result(extractor.extract(&url).await);
                debug!(
                    backend = extractor.name(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    success = matches!(outcome, Outcome::Success(_)),
                    "acquisition: backend settled"
                );
                outcome
            })
        });

        let settled = join_all(handles).await;

        self.extractors
            .iter()
            .zip(settled)
            .map(|(extractor, joined)| ExtractionAttempt {
                backend: extractor.name().to_string(),
                outcome: joined.unwrap_or_else(|e| Outcome::Failure(format!("backend task failed: {}", e))),
            })
            .collect()
    }

    /// Returns the preferred qualifying content, or every backend's reason.
    pub async fn acquire(&self, url: &str) -> Result<AcquiredContent, DigestError> {
        let attempts = self.run_all(url).await;
        match select_winner(&attempts, self.min_chars) {
            Ok(content) => {
                info!(
                    url = %url,
                    backend = %content.source_backend,
                    chars = content.text.chars().count(),
                    "acquisition: content acquired"
                );
                Ok(content)
            }
            Err(diagnostic) => {
                warn!(url = %url, %diagnostic, "acquisition: every backend failed");
                Err(DigestError::AcquisitionExhausted(diagnostic))
            }
        }
    }
}

/// Scans attempts in order and returns the first qualifying success.
///
/// On failure the error joins one `"<backend>: <reason>"` entry per attempt.
pub fn select_winner(attempts: &[ExtractionAttempt], min_chars: usize) -> Result<AcquiredContent, String> {
    let mut reasons = Vec::with_capacity(attempts.len());

    for attempt in attempts {
        match &attempt.outcome {
            Outcome::Success(text) => match check_qualifying(text, min_chars) {
                Ok(()) => {
                    return Ok(AcquiredContent {
                        text: text.trim().to_string(),
                        source_backend: attempt.backend.clone(),
                    })
                }
                Err(rejection) => reasons.push(format!("{}: {}", attempt.backend, rejection)),
            },
            Outcome::Failure(reason) => reasons.push(format!("{}: {}", attempt.backend, reason)),
        }
    }

    if reasons.is_empty() {
        return Err("no extraction backends configured".to_string());
    }
    Err(reasons.join(DIAGNOSTIC_SEPARATOR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn article(words: usize) -> String {
        "lorem ".repeat(words)
    }

    fn attempt(backend: &str, outcome: Outcome) -> ExtractionAttempt {
        ExtractionAttempt { backend: backend.to_string(), outcome }
    }

    struct Scripted {
        name: &'static str,
        delay_ms: u64,
        result: std::result::Result<String, String>,
        finished: Arc<AtomicUsize>,
        finish_order: Arc<std::sync::Mutex<Vec<&'static str>>>,
    }

    #[async_trait::async_trait]
    impl Extractor for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn extract(&self, _url: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            self.finish_order.lock().unwrap().push(self.name);
            self.result.clone().map_err(|e| anyhow!(e))
        }
    }

    struct Panicking;

    #[async_trait::async_trait]
    impl Extractor for Panicking {
        fn name(&self) -> &'static str {
            "panicking"
        }

        async fn extract(&self, _url: &str) -> Result<String> {
            panic!("backend bug")
        }
    }

    #[test]
    fn winner_follows_preference_order() {
        let attempts = vec![
            attempt("a", Outcome::Failure("timed out after 15s".into())),
            attempt("b", Outcome::Success(article(100))),
            attempt("c", Outcome::Success(article(200))),
        ];
        let winner = select_winner(&attempts, 200).expect("winner");
        assert_eq!(winner.source_backend, "b");
    }

    #[test]
    fn short_or_junk_text_is_never_selected() {
        let only_short = vec![attempt("a", Outcome::Success("tiny".into()))];
        let err = select_winner(&only_short, 200).unwrap_err();
        assert!(err.contains("a: too short"));

        let junk = format!("Before you continue to Google {}", article(100));
        let only_junk = vec![attempt("mirror", Outcome::Success(junk.clone()))];
        assert_eq!(select_winner(&only_junk, 200).unwrap_err(), "mirror: placeholder page");

        let junk_first = vec![
            attempt("mirror", Outcome::Success(junk)),
            attempt("direct", Outcome::Success(article(100))),
        ];
        assert_eq!(select_winner(&junk_first, 200).unwrap().source_backend, "direct");
    }

    #[test]
    fn aggregate_lists_every_backend() {
        for n in 1..=5 {
            let attempts: Vec<_> = (0..n)
                .map(|i| attempt(&format!("backend{}", i), Outcome::Failure(format!("reason-{}", i))))
                .collect();
            let err = select_winner(&attempts, 200).unwrap_err();
            for i in 0..n {
                assert!(err.contains(&format!("backend{}: reason-{}", i, i)), "missing {} in {}", i, err);
            }
            assert_eq!(err.matches(DIAGNOSTIC_SEPARATOR).count(), n - 1);
        }
    }

    #[tokio::test]
    async fn completion_order_does_not_change_the_winner() {
        let finished = Arc::new(AtomicUsize::new(0));
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let scripted = |name, delay_ms, result| -> Arc<dyn Extractor> {
            Arc::new(Scripted {
                name,
                delay_ms,
                result,
                finished: finished.clone(),
                finish_order: order.clone(),
            })
        };

        // Completion order is C, A, B; only B and C qualify.
        let acquisition = Acquisition::new(
            vec![
                scripted("a", 40, Ok("junk".to_string())),
                scripted("b", 80, Ok(article(100))),
                scripted("c", 1, Ok(article(150))),
            ],
            200,
        );

        let content = acquisition.acquire("https://example.com/story").await.expect("content");
        assert_eq!(content.source_backend, "b");
        assert_eq!(finished.load(Ordering::SeqCst), 3);
        assert_eq!(*order.lock().unwrap(), vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn total_failure_reports_all_reasons() {
        let finished = Arc::new(AtomicUsize::new(0));
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let acquisition = Acquisition::new(
            vec![
                Arc::new(Scripted {
                    name: "direct",
                    delay_ms: 5,
                    result: Err("HTTP 403 Forbidden".into()),
                    finished: finished.clone(),
                    finish_order: order.clone(),
                }),
                Arc::new(Panicking),
            ],
            200,
        );

        let err = acquisition.acquire("https://example.com/paywalled").await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("direct: HTTP 403 Forbidden"));
        assert!(message.contains("panicking: backend task failed"));
    }
}
