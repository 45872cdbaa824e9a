pub mod campaign;
pub mod config;
pub mod conversation;
pub mod lead;
pub mod metrics;
pub mod outcome;
pub mod summary;
pub mod telephony;
pub mod testing;

pub use campaign::{
    AttemptDeps, BusinessHoursPolicy, CallWindow, CampaignConfig, CampaignController,
    CampaignError, CampaignFilters, CampaignStatus, ConcurrencyGate, RunHandle, RunKind,
    RunOptions, RunState, StopAck,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use conversation::{CallEventHub, ConversationEnd, ConversationPipeline, PipelineError};
pub use lead::{
    parse_leads_csv, CreateLeadRequest, Lead, LeadError, LeadFilter, LeadStatus, LeadStore,
    SqliteLeadStore, LEAD_CSV_TEMPLATE,
};
pub use outcome::{
    outcomes_to_csv, CallStatistics, InterestLevel, OutcomeError, OutcomeFilter, OutcomeRecord,
    OutcomeStatus, ResultSink, SqliteResultSink,
};
pub use summary::{build_summarizer, CallSummary, Summarizer, SummarizerConfig, SummaryError};
pub use telephony::{
    CallContext, CallPlacementClient, PlacedCall, PlacementError, TwilioClient,
    UnconfiguredPlacementClient,
};
