use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{campaign, handlers, leads, middleware::metrics_middleware, results, telephony};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::<Arc<AppState>>::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Campaign control
        .route("/campaign/start", post(campaign::start))
        .route("/campaign/status", get(campaign::status))
        .route("/campaign/stop", post(campaign::stop))
        .route("/campaign/retry", post(campaign::retry))
        // Leads
        .route("/leads", post(leads::create_leads).get(leads::list_leads))
        .route("/leads/pending", get(leads::list_pending))
        .route("/leads/upload", post(leads::upload_leads))
        .route("/leads/template", get(leads::lead_template))
        .route("/leads/{id}", get(leads::get_lead))
        // Results
        .route("/results", get(results::list_results))
        .route("/results/statistics", get(results::statistics))
        .route("/results/download", get(results::download_results))
        // Provider and media pipeline webhooks
        .route("/telephony/status", post(telephony::status_callback))
        .route("/telephony/conversation", post(telephony::conversation_end))
        .route("/telephony/twiml", post(telephony::twiml).get(telephony::twiml));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::get_metrics))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
