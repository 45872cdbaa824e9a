//! Telephony webhook handlers.
//!
//! The provider posts call status changes here, and the media pipeline
//! reports the end of each conversation. Both are routed to the waiting
//! call attempt through the call event hub.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Form, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use callrunner_core::conversation::Turn;
use callrunner_core::ConversationEnd;

use super::handlers::{error_response, ErrorResponse};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Provider status callback (form-encoded).
#[derive(Debug, Deserialize)]
pub struct StatusCallback {
    #[serde(rename = "CallSid")]
    pub call_sid: String,
    #[serde(rename = "CallStatus")]
    pub call_status: String,
    #[serde(rename = "CallDuration")]
    pub call_duration: Option<String>,
}

/// Conversation-end notification from the media pipeline.
#[derive(Debug, Deserialize)]
pub struct ConversationReport {
    pub call_id: String,
    #[serde(default)]
    pub transcript: Vec<Turn>,
    #[serde(default = "default_answered")]
    pub answered: bool,
    /// Set when the pipeline itself failed.
    pub error: Option<String>,
}

fn default_answered() -> bool {
    true
}

/// Query parameters on the call-instructions URL.
#[derive(Debug, Deserialize)]
pub struct TwimlParams {
    pub run_id: Option<String>,
    pub lead_id: Option<String>,
}

/// What the hub did with an event.
#[derive(Debug, Serialize)]
pub struct EventAck {
    pub call_id: String,
    pub delivery: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Provider status callback
pub async fn status_callback(
    State(state): State<Arc<AppState>>,
    Form(callback): Form<StatusCallback>,
) -> Json<EventAck> {
    debug!(
        call_id = %callback.call_sid,
        status = %callback.call_status,
        duration = ?callback.call_duration,
        "Status callback"
    );
    let delivery = state
        .call_events()
        .provider_status(&callback.call_sid, &callback.call_status);

    Json(EventAck {
        call_id: callback.call_sid,
        delivery: delivery.as_str().to_string(),
    })
}

/// Conversation-end notification
pub async fn conversation_end(
    State(state): State<Arc<AppState>>,
    Json(report): Json<ConversationReport>,
) -> Result<Json<EventAck>, (StatusCode, Json<ErrorResponse>)> {
    if report.call_id.trim().is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "call_id is required"));
    }

    let delivery = match report.error {
        Some(reason) => state.call_events().fail(&report.call_id, reason),
        None => state.call_events().complete(
            &report.call_id,
            ConversationEnd {
                transcript: report.transcript,
                answered: report.answered,
            },
        ),
    };

    info!(call_id = %report.call_id, delivery = delivery.as_str(), "Conversation reported");
    Ok(Json(EventAck {
        call_id: report.call_id,
        delivery: delivery.as_str().to_string(),
    }))
}

/// Call instructions fetched by the provider once the callee picks up
pub async fn twiml(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TwimlParams>,
) -> impl IntoResponse {
    let stream_url = state
        .config()
        .telephony
        .as_ref()
        .and_then(|t| t.media_stream_url.as_deref());

    let body = match stream_url {
        Some(url) => {
            let mut parameters = String::new();
            if let Some(ref run_id) = params.run_id {
                parameters.push_str(&format!(
                    "<Parameter name=\"run_id\" value=\"{}\"/>",
                    xml_escape(run_id)
                ));
            }
            if let Some(ref lead_id) = params.lead_id {
                parameters.push_str(&format!(
                    "<Parameter name=\"lead_id\" value=\"{}\"/>",
                    xml_escape(lead_id)
                ));
            }
            format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
                 <Response><Connect><Stream url=\"{}\">{}</Stream></Connect></Response>",
                xml_escape(url),
                parameters
            )
        }
        None => "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
                 <Response><Say>Sorry, we cannot take this call right now.</Say><Hangup/></Response>"
            .to_string(),
    };

    ([(header::CONTENT_TYPE, "text/xml")], body)
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xml_escape() {
        assert_eq!(
            xml_escape("wss://media.example/s?a=1&b=\"2\""),
            "wss://media.example/s?a=1&amp;b=&quot;2&quot;"
        );
    }

    #[test]
    fn test_conversation_report_defaults() {
        let report: ConversationReport = serde_json::from_str(r#"{"call_id": "CA1"}"#).unwrap();
        assert!(report.answered);
        assert!(report.transcript.is_empty());
        assert!(report.error.is_none());
    }
}
