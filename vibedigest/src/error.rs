use thiserror::Error;

/// Request-level failures the HTTP handler distinguishes
#[derive(Debug, Error)]
pub enum DigestError {
    #[error("Gemini API key not configured")]
    MissingApiKey,

    /// Every backend failed; the message lists each backend's reason
    #[error("Failed to fetch URL content: {0}")]
    AcquisitionExhausted(String),

    /// Every candidate model failed; only the last reason is kept
    #[error("Summarization failed: {last_error}")]
    GenerationExhausted { last_error: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_diagnostics() {
        let err = DigestError::AcquisitionExhausted("direct: HTTP 403 | reader: timed out".into());
        assert!(err.to_string().contains("direct: HTTP 403"));
        assert!(err.to_string().contains("reader: timed out"));

        let err = DigestError::GenerationExhausted { last_error: "quota exceeded".into() };
        assert_eq!(err.to_string(), "Summarization failed: quota exceeded");
    }
}
