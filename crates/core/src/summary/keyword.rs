//! Keyword-heuristic summarizer.
//!
//! Matches whole words and phrases in what the contact said. No network
//! access, so it never fails.

use async_trait::async_trait;

use crate::conversation::ConversationEnd;
use crate::lead::Lead;
use crate::outcome::InterestLevel;

use super::{CallSummary, Summarizer, SummaryError};

const POSITIVE: &[&str] = &[
    "yes",
    "sure",
    "okay",
    "interested",
    "sounds good",
    "let's do it",
    "tell me more",
    "when",
    "how",
    "available",
    "schedule",
    "meeting",
    "discuss",
];

const NEGATIVE: &[&str] = &[
    "no",
    "not interested",
    "not now",
    "maybe later",
    "think about it",
    "not ready",
    "too busy",
    "call back",
    "remove",
];

const TIME: &[&str] = &[
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "morning",
    "afternoon",
    "evening",
    "am",
    "pm",
    "next week",
    "this week",
    "tomorrow",
];

const OBJECTIONS: &[(&str, &[&str])] = &[
    (
        "cost",
        &["expensive", "cost", "price", "afford", "budget", "money", "fee"],
    ),
    (
        "technology",
        &["technical", "complicated", "reliable", "glitch"],
    ),
    ("replacement", &["replace", "fire", "staff", "employee"]),
    ("customization", &["specific", "unique", "custom", "special"]),
    ("trust", &["real person", "robot", "human"]),
];

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn contains_phrase(tokens: &[String], phrase: &str) -> bool {
    let words: Vec<&str> = phrase.split(' ').collect();
    tokens
        .windows(words.len())
        .any(|window| window.iter().zip(&words).all(|(t, w)| t == w))
}

fn contains_any(tokens: &[String], phrases: &[&str]) -> bool {
    phrases.iter().any(|p| contains_phrase(tokens, p))
}

/// Keyword-based conversation assessment.
#[derive(Debug, Default, Clone)]
pub struct KeywordSummarizer;

impl KeywordSummarizer {
    pub fn new() -> Self {
        Self
    }

    /// Assess a conversation synchronously.
    pub fn assess(&self, lead: &Lead, conversation: &ConversationEnd) -> CallSummary {
        let mut notes = format!("Called {} ({}). ", lead.business_name, lead.business_type);
        let tokens = tokenize(&conversation.contact_text());

        if !conversation.answered || tokens.is_empty() {
            notes.push_str("No conversation with the contact.");
            return CallSummary {
                summary: notes,
                interest_level: InterestLevel::None,
                meeting_scheduled: false,
                next_steps: "retry_later".to_string(),
            };
        }

        let positive = contains_any(&tokens, POSITIVE);
        let negative = contains_any(&tokens, NEGATIVE);
        let time_mentioned = contains_any(&tokens, TIME);

        let interest_level = match (positive, negative) {
            (_, true) => InterestLevel::Low,
            (true, false) if time_mentioned => InterestLevel::High,
            (true, false) => InterestLevel::Medium,
            (false, false) => InterestLevel::None,
        };
        let meeting_scheduled = interest_level == InterestLevel::High;

        notes.push_str(match interest_level {
            _ if meeting_scheduled => "Agreed to a follow-up meeting. ",
            InterestLevel::Medium => "Some interest shown, may need nurturing. ",
            _ => "Low interest or not ready at this time. ",
        });

        let objections: Vec<&str> = OBJECTIONS
            .iter()
            .filter(|(_, keywords)| contains_any(&tokens, keywords))
            .map(|(name, _)| *name)
            .collect();
        if !objections.is_empty() {
            notes.push_str(&format!("Objections raised: {}.", objections.join(", ")));
        }

        let next_steps = if meeting_scheduled {
            "schedule_meeting"
        } else if interest_level == InterestLevel::Medium {
            "follow_up"
        } else {
            "archive"
        };

        CallSummary {
            summary: notes.trim_end().to_string(),
            interest_level,
            meeting_scheduled,
            next_steps: next_steps.to_string(),
        }
    }
}

#[async_trait]
impl Summarizer for KeywordSummarizer {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn summarize(
        &self,
        lead: &Lead,
        conversation: &ConversationEnd,
    ) -> Result<CallSummary, SummaryError> {
        Ok(self.assess(lead, conversation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    fn assess(lines: &[&str]) -> CallSummary {
        let lead = fixtures::lead("Acme Dental");
        KeywordSummarizer::new().assess(&lead, &fixtures::conversation(lines))
    }

    #[test]
    fn test_phrase_matching_uses_word_boundaries() {
        let tokens = tokenize("I know, nothing to add");
        assert!(!contains_phrase(&tokens, "no"));
        let tokens = tokenize("Tell me more, please!");
        assert!(contains_phrase(&tokens, "tell me more"));
    }

    #[test]
    fn test_meeting_when_positive_with_time() {
        let summary = assess(&["Yes, that sounds good", "Tuesday afternoon works"]);
        assert_eq!(summary.interest_level, InterestLevel::High);
        assert!(summary.meeting_scheduled);
        assert_eq!(summary.next_steps, "schedule_meeting");
        assert!(summary.summary.starts_with("Called Acme Dental (Healthcare)."));
    }

    #[test]
    fn test_medium_interest_without_time() {
        let summary = assess(&["Hi, speaking", "Sure, tell me more"]);
        assert_eq!(summary.interest_level, InterestLevel::Medium);
        assert!(!summary.meeting_scheduled);
        assert_eq!(summary.next_steps, "follow_up");
    }

    #[test]
    fn test_negative_wins() {
        let summary = assess(&["Yes this is Alex", "We're not interested"]);
        assert_eq!(summary.interest_level, InterestLevel::Low);
        assert_eq!(summary.next_steps, "archive");
    }

    #[test]
    fn test_objections_listed() {
        let summary = assess(&["Okay but it sounds expensive", "I want a real person"]);
        assert!(summary.summary.contains("Objections raised: cost, trust."));
    }

    #[test]
    fn test_silent_call() {
        let summary = assess(&[]);
        assert_eq!(summary.interest_level, InterestLevel::None);
        assert_eq!(summary.next_steps, "retry_later");
    }

    #[test]
    fn test_unanswered_call() {
        let lead = fixtures::lead("Acme Dental");
        let mut conversation = fixtures::conversation(&["yes"]);
        conversation.answered = false;
        let summary = KeywordSummarizer::new().assess(&lead, &conversation);
        assert_eq!(summary.next_steps, "retry_later");
    }

    #[tokio::test]
    async fn test_summarize_never_fails() {
        let lead = fixtures::lead("Acme Dental");
        let summarizer = KeywordSummarizer::new();
        assert_eq!(summarizer.name(), "keyword");
        assert!(summarizer
            .summarize(&lead, &fixtures::conversation(&["hello"]))
            .await
            .is_ok());
    }
}
