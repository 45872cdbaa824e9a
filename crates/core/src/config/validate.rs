use super::{types::Config, ConfigError};
use crate::campaign::{MAX_CALL_TIMEOUT_SECS, MAX_CONCURRENT_CALLS};
use crate::summary::SummarizerBackend;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Campaign concurrency cap and call timeout are positive and bounded
/// - Business hours parse as `HH:MM`
/// - Telephony credentials are non-empty when the section is present
/// - LLM settings are present when the LLM summarizer is selected
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    let campaign = &config.campaign;
    if campaign.max_concurrent_calls == 0 {
        return Err(ConfigError::ValidationError(
            "campaign.max_concurrent_calls must be at least 1".to_string(),
        ));
    }
    if campaign.max_concurrent_calls > MAX_CONCURRENT_CALLS {
        return Err(ConfigError::ValidationError(format!(
            "campaign.max_concurrent_calls must be at most {}",
            MAX_CONCURRENT_CALLS
        )));
    }
    if campaign.call_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "campaign.call_timeout_secs must be positive".to_string(),
        ));
    }
    if campaign.call_timeout_secs > MAX_CALL_TIMEOUT_SECS {
        return Err(ConfigError::ValidationError(format!(
            "campaign.call_timeout_secs must be at most {}",
            MAX_CALL_TIMEOUT_SECS
        )));
    }
    if campaign.hours_check_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "campaign.hours_check_interval_ms must be positive".to_string(),
        ));
    }
    campaign
        .call_window()
        .map_err(|e| ConfigError::ValidationError(format!("campaign call hours: {}", e)))?;

    if let Some(ref telephony) = config.telephony {
        if telephony.account_sid.trim().is_empty() || telephony.auth_token.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "telephony.account_sid and telephony.auth_token must be set".to_string(),
            ));
        }
        if telephony.from_number.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "telephony.from_number must be set".to_string(),
            ));
        }
    }

    if config.summarizer.backend == SummarizerBackend::Llm {
        match config.summarizer.llm {
            Some(ref llm) if !llm.api_key.trim().is_empty() => {}
            _ => {
                return Err(ConfigError::ValidationError(
                    "summarizer.llm.api_key is required when backend = \"llm\"".to_string(),
                ));
            }
        }
    }

    Ok(())
}
