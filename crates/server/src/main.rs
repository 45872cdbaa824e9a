use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use callrunner_core::{
    build_summarizer, load_config, validate_config, AttemptDeps, BusinessHoursPolicy,
    CallEventHub, CallPlacementClient, CampaignController, LeadStore, ResultSink,
    SqliteLeadStore, SqliteResultSink, TwilioClient, UnconfiguredPlacementClient,
};

use callrunner_server::api::create_router;
use callrunner_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("CALLRUNNER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        version = VERSION,
        config_hash = &config_hash[..16],
        "Configuration loaded successfully"
    );
    info!("Database path: {:?}", config.database.path);
    info!(
        "Campaign limits: {} concurrent calls, {}s call timeout",
        config.campaign.max_concurrent_calls, config.campaign.call_timeout_secs
    );

    // Create SQLite stores
    let leads: Arc<dyn LeadStore> = Arc::new(
        SqliteLeadStore::new(&config.database.path).context("Failed to create lead store")?,
    );
    let results: Arc<dyn ResultSink> = Arc::new(
        SqliteResultSink::new(&config.database.path).context("Failed to create result sink")?,
    );
    info!("Lead store and result sink initialized");

    // Create placement client if configured
    let placement: Arc<dyn CallPlacementClient> = match &config.telephony {
        Some(telephony) => {
            info!("Initializing telephony client (from {})", telephony.from_number);
            Arc::new(
                TwilioClient::new(telephony.clone(), config.campaign.call_timeout_secs)
                    .context("Failed to create telephony client")?,
            )
        }
        None => {
            warn!("No telephony configured, every call attempt will fail at placement");
            Arc::new(UnconfiguredPlacementClient)
        }
    };

    let call_events = Arc::new(CallEventHub::new());

    let summarizer = build_summarizer(&config.summarizer).context("Failed to create summarizer")?;
    info!("Using summarizer: {}", summarizer.name());

    let hours: Arc<dyn BusinessHoursPolicy> = Arc::new(
        config
            .campaign
            .call_window()
            .context("Invalid call hours")?,
    );

    let controller = Arc::new(CampaignController::new(
        config.campaign.clone(),
        Arc::clone(&leads),
        Arc::clone(&results),
        AttemptDeps {
            placement,
            pipeline: call_events.clone(),
            summarizer,
        },
        hours,
    ));

    // Leads left in_progress by a previous process can never finish
    let recovered = controller
        .recover_interrupted()
        .await
        .context("Failed to recover interrupted calls")?;
    if recovered > 0 {
        warn!("Marked {} interrupted call(s) as failed", recovered);
    }

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        leads,
        results,
        Arc::clone(&controller),
        call_events,
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Let in-flight calls record their outcomes
    info!("Server shutting down, stopping campaign...");
    controller.shutdown().await;
    info!("Campaign stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
