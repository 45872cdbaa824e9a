//! LLM-backed summarizer using the Anthropic Messages API.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::conversation::ConversationEnd;
use crate::lead::Lead;
use crate::metrics::observe_external;
use crate::outcome::InterestLevel;

use super::{CallSummary, LlmSummarizerConfig, Summarizer, SummaryError};

const SYSTEM_PROMPT: &str = "You review transcripts of outbound sales calls. \
Respond with a single JSON object and nothing else, with keys: \
\"summary\" (string, two sentences at most), \
\"interest_level\" (one of \"high\", \"medium\", \"low\", \"none\"), \
\"meeting_scheduled\" (boolean), \
\"next_steps\" (one of \"schedule_meeting\", \"follow_up\", \"archive\", \"retry_later\").";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct SummaryPayload {
    summary: String,
    interest_level: String,
    #[serde(default)]
    meeting_scheduled: bool,
    #[serde(default)]
    next_steps: String,
}

/// Summarizer that asks an LLM to assess the transcript.
pub struct LlmSummarizer {
    client: reqwest::Client,
    config: LlmSummarizerConfig,
}

impl LlmSummarizer {
    pub fn new(config: LlmSummarizerConfig) -> Result<Self, SummaryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SummaryError::Http(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn build_prompt(lead: &Lead, conversation: &ConversationEnd) -> String {
        let mut prompt = format!(
            "Business: {}\nType: {}\nSize: {}\nContact: {}\n",
            lead.business_name, lead.business_type, lead.company_size, lead.contact_name
        );
        if let Some(ref challenges) = lead.current_challenges {
            prompt.push_str(&format!("Known challenges: {}\n", challenges));
        }
        if !conversation.answered {
            prompt.push_str("The call was not answered by a person.\n");
        }
        prompt.push_str("\nTranscript:\n");
        if conversation.transcript.is_empty() {
            prompt.push_str("(empty)");
        } else {
            prompt.push_str(&conversation.render());
        }
        prompt
    }

    /// Parse the model's reply, tolerating code fences or surrounding prose.
    fn parse_reply(text: &str) -> Result<CallSummary, SummaryError> {
        let start = text.find('{');
        let end = text.rfind('}');
        let json = match (start, end) {
            (Some(s), Some(e)) if s < e => &text[s..=e],
            _ => return Err(SummaryError::Parse(format!("no JSON object in: {}", text))),
        };

        let payload: SummaryPayload =
            serde_json::from_str(json).map_err(|e| SummaryError::Parse(e.to_string()))?;
        let interest_level = payload
            .interest_level
            .parse::<InterestLevel>()
            .map_err(SummaryError::Parse)?;

        Ok(CallSummary {
            summary: payload.summary,
            interest_level,
            meeting_scheduled: payload.meeting_scheduled,
            next_steps: if payload.next_steps.is_empty() {
                "follow_up".to_string()
            } else {
                payload.next_steps
            },
        })
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    fn name(&self) -> &str {
        "llm"
    }

    async fn summarize(
        &self,
        lead: &Lead,
        conversation: &ConversationEnd,
    ) -> Result<CallSummary, SummaryError> {
        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            system: SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user",
                content: Self::build_prompt(lead, conversation),
            }],
        };

        let started = Instant::now();
        let sent = self
            .client
            .post(format!(
                "{}/v1/messages",
                self.config.api_base.trim_end_matches('/')
            ))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await;
        let ok = matches!(&sent, Ok(r) if r.status().is_success());
        observe_external("llm", "summarize", ok, started.elapsed().as_secs_f64());
        let response = sent.map_err(|e| SummaryError::Http(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiError>(&error_text)
                .map(|e| e.error.message)
                .unwrap_or(error_text);
            return Err(SummaryError::Api { status, message });
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| SummaryError::Parse(e.to_string()))?;

        let text = body
            .content
            .into_iter()
            .filter(|c| c.content_type == "text")
            .map(|c| c.text)
            .collect::<Vec<_>>()
            .join("");

        debug!(lead_id = %lead.id, model = %self.config.model, "Summary generated");
        Self::parse_reply(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[test]
    fn test_parse_plain_json() {
        let summary = LlmSummarizer::parse_reply(
            r#"{"summary": "Owner keen", "interest_level": "high", "meeting_scheduled": true, "next_steps": "schedule_meeting"}"#,
        )
        .unwrap();
        assert_eq!(summary.interest_level, InterestLevel::High);
        assert!(summary.meeting_scheduled);
        assert_eq!(summary.next_steps, "schedule_meeting");
    }

    #[test]
    fn test_parse_fenced_json() {
        let text = "Here you go:\n```json\n{\"summary\": \"Busy\", \"interest_level\": \"Low\"}\n```";
        let summary = LlmSummarizer::parse_reply(text).unwrap();
        assert_eq!(summary.interest_level, InterestLevel::Low);
        assert!(!summary.meeting_scheduled);
        assert_eq!(summary.next_steps, "follow_up");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            LlmSummarizer::parse_reply("I cannot help with that"),
            Err(SummaryError::Parse(_))
        ));
        assert!(matches!(
            LlmSummarizer::parse_reply(r#"{"summary": "x", "interest_level": "extreme"}"#),
            Err(SummaryError::Parse(_))
        ));
    }

    #[test]
    fn test_prompt_includes_context_and_transcript() {
        let lead = fixtures::lead("Acme Dental");
        let prompt =
            LlmSummarizer::build_prompt(&lead, &fixtures::conversation(&["We might be keen"]));
        assert!(prompt.contains("Business: Acme Dental"));
        assert!(prompt.contains("Contact: We might be keen"));
    }

    #[tokio::test]
    async fn test_unreachable_api_is_http_error() {
        let summarizer = LlmSummarizer::new(LlmSummarizerConfig {
            api_key: "sk-test".to_string(),
            model: "test-model".to_string(),
            api_base: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            max_tokens: 64,
        })
        .unwrap();
        let lead = fixtures::lead("Acme Dental");
        let result = summarizer
            .summarize(&lead, &fixtures::conversation(&["hello"]))
            .await;
        assert!(matches!(result, Err(SummaryError::Http(_))));
    }
}
