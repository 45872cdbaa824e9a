use std::sync::Arc;

use callrunner_core::{
    CallEventHub, CampaignController, Config, LeadStore, ResultSink, SanitizedConfig,
};

/// Shared application state
pub struct AppState {
    config: Config,
    leads: Arc<dyn LeadStore>,
    results: Arc<dyn ResultSink>,
    controller: Arc<CampaignController>,
    call_events: Arc<CallEventHub>,
}

impl AppState {
    pub fn new(
        config: Config,
        leads: Arc<dyn LeadStore>,
        results: Arc<dyn ResultSink>,
        controller: Arc<CampaignController>,
        call_events: Arc<CallEventHub>,
    ) -> Self {
        Self {
            config,
            leads,
            results,
            controller,
            call_events,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn leads(&self) -> &Arc<dyn LeadStore> {
        &self.leads
    }

    pub fn results(&self) -> &Arc<dyn ResultSink> {
        &self.results
    }

    pub fn controller(&self) -> &Arc<CampaignController> {
        &self.controller
    }

    pub fn call_events(&self) -> &Arc<CallEventHub> {
        &self.call_events
    }
}
