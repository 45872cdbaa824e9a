//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with mock dependencies injected. Conversations complete through the
//! real call event hub, so tests drive calls to an end by posting to the
//! telephony webhooks like the media pipeline would.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use callrunner_core::config::{DatabaseConfig, ServerConfig, TelephonyConfig};
use callrunner_core::testing::{MockHoursPolicy, MockPlacementClient, MockSummarizer};
use callrunner_core::{
    AttemptDeps, CallEventHub, CampaignConfig, CampaignController, Config, LeadStore,
    ResultSink, SqliteLeadStore, SqliteResultSink,
};

/// Re-export fixtures for test convenience
pub use callrunner_core::testing::fixtures;

/// Test fixture for API testing with mock dependencies.
///
/// Provides an in-process server with fully controllable mocks for:
/// - Call placement (MockPlacementClient)
/// - Summaries (MockSummarizer)
/// - Business hours (MockHoursPolicy)
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_lead_import() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.post("/api/v1/leads", json!({
///         "contact_number": "+15550100001",
///         "business_name": "Acme",
///         "contact_name": "Jo"
///     })).await;
///
///     assert_eq!(response.status, 201);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock placement client - inspect placed calls, inject failures
    pub placement: Arc<MockPlacementClient>,
    /// Mock summarizer - configure summaries
    pub summarizer: Arc<MockSummarizer>,
    /// Mock business hours - open or close the call window
    pub hours: Arc<MockHoursPolicy>,
    /// Direct access to the lead store for seeding
    pub leads: Arc<dyn LeadStore>,
    /// Campaign controller behind the API
    pub controller: Arc<CampaignController>,
    /// Temporary directory for the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Configuration for test fixture.
#[derive(Debug, Clone)]
pub struct TestConfig {
    pub max_concurrent_calls: usize,
    pub call_timeout_secs: u64,
    pub retry_enabled: bool,
    /// Media stream URL handed out in call instructions
    pub media_stream_url: Option<String>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            max_concurrent_calls: 2,
            call_timeout_secs: 30,
            retry_enabled: true,
            media_stream_url: None,
        }
    }
}

impl TestConfig {
    /// Config with retry runs disabled.
    pub fn without_retry() -> Self {
        Self {
            retry_enabled: false,
            ..Default::default()
        }
    }

    /// Config with a media stream endpoint.
    pub fn with_media_stream(url: &str) -> Self {
        Self {
            media_stream_url: Some(url.to_string()),
            ..Default::default()
        }
    }
}

impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        // Create mocks
        let placement = Arc::new(MockPlacementClient::new());
        let summarizer = Arc::new(MockSummarizer::new());
        let hours = Arc::new(MockHoursPolicy::new(true));
        let call_events = Arc::new(CallEventHub::new());

        // Create config
        let config = Config {
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            campaign: CampaignConfig {
                max_concurrent_calls: test_config.max_concurrent_calls,
                call_timeout_secs: test_config.call_timeout_secs,
                hours_check_interval_ms: 20,
                retry_enabled: test_config.retry_enabled,
                ..Default::default()
            },
            telephony: test_config.media_stream_url.map(|url| TelephonyConfig {
                account_sid: "AC_test".to_string(),
                auth_token: "secret-token".to_string(),
                from_number: "+15550000000".to_string(),
                webhook_base_url: "http://localhost:7860".to_string(),
                api_base: "http://localhost:1".to_string(),
                timeout_secs: 5,
                media_stream_url: Some(url),
            }),
            summarizer: Default::default(),
        };

        // Create stores
        let leads: Arc<dyn LeadStore> =
            Arc::new(SqliteLeadStore::new(&db_path).expect("Failed to create lead store"));
        let results: Arc<dyn ResultSink> =
            Arc::new(SqliteResultSink::new(&db_path).expect("Failed to create result sink"));

        let controller = Arc::new(CampaignController::new(
            config.campaign.clone(),
            Arc::clone(&leads),
            Arc::clone(&results),
            AttemptDeps {
                placement: placement.clone(),
                pipeline: call_events.clone(),
                summarizer: summarizer.clone(),
            },
            hours.clone(),
        ));

        // Create app state with mocks
        let state = Arc::new(callrunner_server::state::AppState::new(
            config,
            Arc::clone(&leads),
            results,
            Arc::clone(&controller),
            call_events,
        ));

        // Create router
        let router = callrunner_server::api::create_router(state);

        Self {
            router,
            placement,
            summarizer,
            hours,
            leads,
            controller,
            temp_dir,
        }
    }

    /// Import a lead through the API and return its ID.
    pub async fn create_lead(&self, business_name: &str, contact_number: &str) -> String {
        let response = self
            .post(
                "/api/v1/leads",
                serde_json::json!({
                    "contact_number": contact_number,
                    "business_name": business_name,
                    "contact_name": "Alex",
                    "business_type": "Healthcare",
                    "company_size": "Small"
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
        response.body["leads"][0]["id"]
            .as_str()
            .expect("lead id")
            .to_string()
    }

    /// Wait until the mock provider has placed `count` calls.
    pub async fn wait_for_calls(&self, count: usize) -> Vec<String> {
        for _ in 0..200 {
            let placed = self.placement.placed_calls().await;
            if placed.len() >= count {
                return placed.into_iter().map(|c| c.external_call_id).collect();
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} placed calls", count);
    }

    /// Wait until no campaign run is active.
    pub async fn wait_for_idle(&self) {
        tokio::time::timeout(Duration::from_secs(5), self.controller.wait_idle())
            .await
            .expect("campaign did not finish in time");
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        self.request_raw("POST", path, body, "application/json").await
    }

    /// Send a form-encoded POST, as the telephony provider does.
    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> TestResponse {
        let body = form
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        self.request_raw("POST", path, &body, "application/x-www-form-urlencoded")
            .await
    }

    /// Send a POST with a CSV body.
    pub async fn post_csv(&self, path: &str, body: &str) -> TestResponse {
        self.request_raw("POST", path, body, "text/csv").await
    }

    /// Send a CORS preflight for `method` on `path` from `origin`.
    pub async fn preflight(&self, path: &str, method: &str, origin: &str) -> (StatusCode, HeaderMap) {
        let request = Request::builder()
            .method("OPTIONS")
            .uri(path)
            .header("Origin", origin)
            .header("Access-Control-Request-Method", method)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        (response.status(), response.headers().clone())
    }

    /// Send a request and return the raw body as text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String, Option<String>) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        (
            status,
            String::from_utf8_lossy(&body_bytes).into_owned(),
            content_type,
        )
    }

    /// Send a request with raw string body and custom content type.
    async fn request_raw(
        &self,
        method: &str,
        path: &str,
        body: &str,
        content_type: &str,
    ) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .header("Content-Type", content_type)
            .body(Body::from(body.to_string()))
            .unwrap();

        self.send(request).await
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}

/// Helper to assert a JSON path equals expected value.
#[macro_export]
macro_rules! assert_json_path {
    ($json:expr, $path:expr, $expected:expr) => {
        let actual = &$json[$path];
        assert_eq!(
            actual, &$expected,
            "Path '{}' expected {:?}, got {:?}",
            $path, $expected, actual
        );
    };
}
