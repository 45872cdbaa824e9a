//! Summarizer configuration.

use serde::{Deserialize, Serialize};

/// Which summary generator to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SummarizerBackend {
    /// Keyword heuristics, no external calls.
    #[default]
    Keyword,
    /// Anthropic Messages API.
    Llm,
}

/// Summarizer section of the config file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SummarizerConfig {
    #[serde(default)]
    pub backend: SummarizerBackend,
    /// Required when `backend = "llm"`.
    #[serde(default)]
    pub llm: Option<LlmSummarizerConfig>,
}

/// LLM summarizer settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmSummarizerConfig {
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_model() -> String {
    "claude-3-haiku-20240307".to_string()
}

fn default_api_base() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_tokens() -> u32 {
    512
}
