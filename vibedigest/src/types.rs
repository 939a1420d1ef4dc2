use serde::{Deserialize, Serialize};

/// Result of one fallible step (one backend, one model)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(String),
    Failure(String),
}

impl Outcome {
    pub fn from_result(result: anyhow::Result<String>) -> Self {
        match result {
            Ok(text) => Outcome::Success(text),
            Err(e) => Outcome::Failure(format!("{:#}", e)),
        }
    }
}

/// One backend invocation against the requested URL
#[derive(Debug, Clone)]
pub struct ExtractionAttempt {
    pub backend: String,
    pub outcome: Outcome,
}

/// Text that passed the length and placeholder checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredContent {
    pub text: String,
    pub source_backend: String,
}

/// A model identifier queued for generation; lower rank goes first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCandidate {
    pub identifier: String,
    pub priority_rank: usize,
}

/// One generation call against a candidate model
#[derive(Debug, Clone)]
pub struct GenerationAttempt {
    pub model: ModelCandidate,
    pub outcome: Outcome,
}

/// Response body of the summarize endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SummaryResult {
    pub summary: String,
}
