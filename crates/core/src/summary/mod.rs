//! Conversation summaries and interest assessment.

mod config;
mod keyword;
mod llm;
mod types;

use std::sync::Arc;

pub use config::{LlmSummarizerConfig, SummarizerBackend, SummarizerConfig};
pub use keyword::KeywordSummarizer;
pub use llm::LlmSummarizer;
pub use types::{CallSummary, Summarizer, SummaryError};

/// Build the summarizer selected by configuration.
pub fn build_summarizer(config: &SummarizerConfig) -> Result<Arc<dyn Summarizer>, SummaryError> {
    match (config.backend, &config.llm) {
        (SummarizerBackend::Keyword, _) => Ok(Arc::new(KeywordSummarizer::new())),
        (SummarizerBackend::Llm, Some(llm)) => Ok(Arc::new(LlmSummarizer::new(llm.clone())?)),
        (SummarizerBackend::Llm, None) => Err(SummaryError::NotConfigured(
            "summarizer.llm section missing".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_default_is_keyword() {
        let summarizer = build_summarizer(&SummarizerConfig::default()).unwrap();
        assert_eq!(summarizer.name(), "keyword");
    }

    #[test]
    fn test_build_llm_requires_section() {
        let config = SummarizerConfig {
            backend: SummarizerBackend::Llm,
            llm: None,
        };
        assert!(build_summarizer(&config).is_err());
    }
}
