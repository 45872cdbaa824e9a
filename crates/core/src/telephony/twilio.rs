//! Twilio-compatible REST call placement.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::TelephonyConfig;
use crate::metrics::observe_external;

use super::{CallContext, CallPlacementClient, PlacedCall, PlacementError};

static DIALABLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?[0-9]{7,15}$").unwrap());

/// Provider ring timeout bounds, in seconds.
const MIN_RING_TIMEOUT: u64 = 5;
const MAX_RING_TIMEOUT: u64 = 600;

#[derive(Debug, Deserialize)]
struct CallResource {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

/// Normalize a phone number to E.164 (`+` followed by digits).
///
/// Spaces, dashes, dots and parentheses are stripped.
pub fn normalize_destination(raw: &str) -> Result<String, PlacementError> {
    let compact: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();

    if !DIALABLE.is_match(&compact) {
        return Err(PlacementError::InvalidDestination(raw.to_string()));
    }

    if compact.starts_with('+') {
        Ok(compact)
    } else {
        Ok(format!("+{}", compact))
    }
}

/// Call placement client for the Twilio REST API.
pub struct TwilioClient {
    client: Client,
    config: TelephonyConfig,
    ring_timeout_secs: u64,
}

impl TwilioClient {
    /// Create a new client. The provider ring timeout is half the attempt
    /// budget, clamped to what the provider accepts.
    pub fn new(config: TelephonyConfig, call_timeout_secs: u64) -> Result<Self, PlacementError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| PlacementError::Http(e.to_string()))?;

        Ok(Self {
            client,
            config,
            ring_timeout_secs: (call_timeout_secs / 2).clamp(MIN_RING_TIMEOUT, MAX_RING_TIMEOUT),
        })
    }

    fn api_base(&self) -> &str {
        self.config.api_base.trim_end_matches('/')
    }

    fn webhook_base(&self) -> &str {
        self.config.webhook_base_url.trim_end_matches('/')
    }

    fn calls_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Calls.json",
            self.api_base(),
            self.config.account_sid
        )
    }

    fn call_url(&self, external_call_id: &str) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Calls/{}.json",
            self.api_base(),
            self.config.account_sid,
            urlencoding::encode(external_call_id)
        )
    }

    /// URL the provider fetches call instructions from once the call connects.
    pub fn twiml_url(&self, context: &CallContext) -> String {
        format!(
            "{}/api/v1/telephony/twiml?run_id={}&lead_id={}",
            self.webhook_base(),
            urlencoding::encode(&context.run_id),
            urlencoding::encode(&context.lead_id)
        )
    }

    /// URL the provider posts call status changes to.
    pub fn status_callback_url(&self) -> String {
        format!("{}/api/v1/telephony/status", self.webhook_base())
    }

    fn map_send_error(e: reqwest::Error) -> PlacementError {
        if e.is_timeout() {
            PlacementError::Timeout
        } else {
            PlacementError::Http(e.to_string())
        }
    }

    async fn rejection(response: reqwest::Response) -> PlacementError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_else(|| body.chars().take(200).collect());
        PlacementError::Rejected { status, message }
    }
}

#[async_trait]
impl CallPlacementClient for TwilioClient {
    async fn place_call(
        &self,
        destination: &str,
        context: &CallContext,
    ) -> Result<PlacedCall, PlacementError> {
        let to = normalize_destination(destination)?;
        let twiml_url = self.twiml_url(context);
        let status_callback = self.status_callback_url();
        let ring_timeout = self.ring_timeout_secs.to_string();

        let params = [
            ("To", to.as_str()),
            ("From", self.config.from_number.as_str()),
            ("Url", twiml_url.as_str()),
            ("Method", "POST"),
            ("StatusCallback", status_callback.as_str()),
            ("StatusCallbackMethod", "POST"),
            ("StatusCallbackEvent", "completed"),
            ("Timeout", ring_timeout.as_str()),
            ("Record", "false"),
        ];

        debug!(lead_id = %context.lead_id, to = %to, "Placing outbound call");

        let started = Instant::now();
        let sent = self
            .client
            .post(self.calls_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&params)
            .send()
            .await;
        let ok = matches!(&sent, Ok(r) if r.status().is_success());
        observe_external("telephony", "place_call", ok, started.elapsed().as_secs_f64());
        let response = sent.map_err(Self::map_send_error)?;

        if !response.status().is_success() {
            let err = Self::rejection(response).await;
            warn!(lead_id = %context.lead_id, error = %err, "Provider rejected call");
            return Err(err);
        }

        let resource: CallResource = response
            .json()
            .await
            .map_err(|e| PlacementError::Http(format!("invalid call resource: {}", e)))?;

        Ok(PlacedCall {
            external_call_id: resource.sid,
        })
    }

    async fn hang_up(&self, external_call_id: &str) -> Result<(), PlacementError> {
        let started = Instant::now();
        let sent = self
            .client
            .post(self.call_url(external_call_id))
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[("Status", "completed")])
            .send()
            .await;
        let ok = matches!(&sent, Ok(r) if r.status().is_success());
        observe_external("telephony", "hang_up", ok, started.elapsed().as_secs_f64());
        let response = sent.map_err(Self::map_send_error)?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        debug!(call_id = %external_call_id, "Call hung up");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TelephonyConfig {
        TelephonyConfig {
            account_sid: "AC123".to_string(),
            auth_token: "token".to_string(),
            from_number: "+15550001111".to_string(),
            webhook_base_url: "https://calls.example.com/".to_string(),
            api_base: "https://api.example.com/".to_string(),
            timeout_secs: 5,
            media_stream_url: None,
        }
    }

    fn context() -> CallContext {
        CallContext {
            run_id: "run 1".to_string(),
            lead_id: "lead-1".to_string(),
            business_name: "Acme".to_string(),
            contact_name: "Alex".to_string(),
        }
    }

    #[test]
    fn test_normalize_adds_plus() {
        assert_eq!(normalize_destination("15551234567").unwrap(), "+15551234567");
        assert_eq!(normalize_destination("+44 20 7946 0958").unwrap(), "+442079460958");
        assert_eq!(
            normalize_destination("(555) 123-4567").unwrap(),
            "+5551234567"
        );
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert!(matches!(
            normalize_destination(""),
            Err(PlacementError::InvalidDestination(_))
        ));
        assert!(normalize_destination("call me").is_err());
        assert!(normalize_destination("123").is_err());
        assert!(normalize_destination("++15551234567").is_err());
    }

    #[test]
    fn test_urls() {
        let client = TwilioClient::new(config(), 300).unwrap();
        assert_eq!(
            client.calls_url(),
            "https://api.example.com/2010-04-01/Accounts/AC123/Calls.json"
        );
        assert_eq!(
            client.call_url("CA42"),
            "https://api.example.com/2010-04-01/Accounts/AC123/Calls/CA42.json"
        );
        assert_eq!(
            client.twiml_url(&context()),
            "https://calls.example.com/api/v1/telephony/twiml?run_id=run%201&lead_id=lead-1"
        );
        assert_eq!(
            client.status_callback_url(),
            "https://calls.example.com/api/v1/telephony/status"
        );
    }

    #[test]
    fn test_ring_timeout_is_half_budget_clamped() {
        assert_eq!(TwilioClient::new(config(), 300).unwrap().ring_timeout_secs, 150);
        assert_eq!(TwilioClient::new(config(), 4).unwrap().ring_timeout_secs, 5);
        assert_eq!(
            TwilioClient::new(config(), 10_000).unwrap().ring_timeout_secs,
            600
        );
    }

    #[tokio::test]
    async fn test_invalid_destination_fails_before_request() {
        let client = TwilioClient::new(config(), 300).unwrap();
        let result = client.place_call("n/a", &context()).await;
        assert!(matches!(result, Err(PlacementError::InvalidDestination(_))));
    }
}
