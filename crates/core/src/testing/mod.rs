//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the external collaborator
//! traits, so campaigns can be exercised end to end without a telephony
//! provider or a live conversation pipeline.
//!
//! # Example
//!
//! ```rust,ignore
//! use callrunner_core::testing::{MockConversationPipeline, MockPlacementClient};
//!
//! let placement = MockPlacementClient::new();
//! let pipeline = MockConversationPipeline::new();
//!
//! placement.fail_for("+15550100002").await;
//! pipeline.set_duration(Duration::from_millis(50)).await;
//! ```

mod mock_hours;
mod mock_pipeline;
mod mock_placement;
mod mock_summarizer;

pub use mock_hours::MockHoursPolicy;
pub use mock_pipeline::MockConversationPipeline;
pub use mock_placement::{MockPlacementClient, RecordedCall};
pub use mock_summarizer::MockSummarizer;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::Utc;

    use crate::conversation::{ConversationEnd, Speaker, Turn};
    use crate::lead::{CreateLeadRequest, Lead, LeadStatus};

    /// Create a pending lead with reasonable defaults.
    pub fn lead(business_name: &str) -> Lead {
        let now = Utc::now();
        Lead {
            id: uuid::Uuid::new_v4().to_string(),
            contact_number: "+15550100000".to_string(),
            business_name: business_name.to_string(),
            contact_name: "Alex".to_string(),
            business_type: "Healthcare".to_string(),
            company_size: "Small".to_string(),
            current_challenges: Some("Missed calls after hours".to_string()),
            best_call_time: Some("Morning".to_string()),
            status: LeadStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a lead import request.
    pub fn lead_request(business_name: &str, contact_number: &str) -> CreateLeadRequest {
        CreateLeadRequest {
            contact_number: contact_number.to_string(),
            business_name: business_name.to_string(),
            contact_name: "Alex".to_string(),
            business_type: "Healthcare".to_string(),
            company_size: "Small".to_string(),
            current_challenges: None,
            best_call_time: None,
        }
    }

    /// Create an answered conversation where the contact says `lines`.
    pub fn conversation(lines: &[&str]) -> ConversationEnd {
        let mut transcript = vec![Turn {
            speaker: Speaker::Agent,
            text: "Hi, this is Alex calling about your phone line.".to_string(),
        }];
        transcript.extend(lines.iter().map(|line| Turn {
            speaker: Speaker::Contact,
            text: line.to_string(),
        }));
        ConversationEnd {
            transcript,
            answered: true,
        }
    }
}
