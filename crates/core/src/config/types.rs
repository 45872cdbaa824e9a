use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::campaign::CampaignConfig;
use crate::summary::{SummarizerBackend, SummarizerConfig};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub campaign: CampaignConfig,
    #[serde(default)]
    pub telephony: Option<TelephonyConfig>,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    7860
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("callrunner.db")
}

/// Telephony provider configuration (Twilio-compatible REST API).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelephonyConfig {
    /// Account identifier used in the API path and as basic-auth user.
    pub account_sid: String,
    /// Auth token used as basic-auth password.
    pub auth_token: String,
    /// Caller ID for outbound calls (E.164).
    pub from_number: String,
    /// Public base URL the provider calls back into (webhooks).
    #[serde(default = "default_webhook_base_url")]
    pub webhook_base_url: String,
    /// REST API base URL.
    #[serde(default = "default_telephony_api_base")]
    pub api_base: String,
    /// Request timeout in seconds (default: 15)
    #[serde(default = "default_telephony_timeout")]
    pub timeout_secs: u32,
    /// Media stream endpoint handed to the provider once a call connects.
    /// Without it the call is answered with a short message and hung up.
    #[serde(default)]
    pub media_stream_url: Option<String>,
}

fn default_webhook_base_url() -> String {
    "http://localhost:7860".to_string()
}

fn default_telephony_api_base() -> String {
    "https://api.twilio.com".to_string()
}

fn default_telephony_timeout() -> u32 {
    15
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub campaign: CampaignConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telephony: Option<SanitizedTelephonyConfig>,
    pub summarizer: SanitizedSummarizerConfig,
}

/// Sanitized telephony config (auth token hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTelephonyConfig {
    pub account_sid: String,
    pub auth_token_configured: bool,
    pub from_number: String,
    pub webhook_base_url: String,
    pub api_base: String,
    pub timeout_secs: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_stream_url: Option<String>,
}

/// Sanitized summarizer config (LLM API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedSummarizerConfig {
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub api_key_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            campaign: config.campaign.clone(),
            telephony: config.telephony.as_ref().map(|t| SanitizedTelephonyConfig {
                account_sid: t.account_sid.clone(),
                auth_token_configured: !t.auth_token.is_empty(),
                from_number: t.from_number.clone(),
                webhook_base_url: t.webhook_base_url.clone(),
                api_base: t.api_base.clone(),
                timeout_secs: t.timeout_secs,
                media_stream_url: t.media_stream_url.clone(),
            }),
            summarizer: SanitizedSummarizerConfig {
                backend: match config.summarizer.backend {
                    SummarizerBackend::Keyword => "keyword".to_string(),
                    SummarizerBackend::Llm => "llm".to_string(),
                },
                model: config.summarizer.llm.as_ref().map(|l| l.model.clone()),
                api_key_configured: config
                    .summarizer
                    .llm
                    .as_ref()
                    .is_some_and(|l| !l.api_key.is_empty()),
            },
        }
    }
}
