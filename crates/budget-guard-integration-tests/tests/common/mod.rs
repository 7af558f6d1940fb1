//! Common test utilities for budget-guard integration tests
//!
//! This module provides:
//! - A test harness with wiremock servers standing in for the metadata server
//!   and the billing API
//! - Builders for push envelopes and HTTP requests

use axum::{body::Body, http::Request, Router};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use budget_guard_api::{build_alert_processor, create_router, AppState, ServiceConfig};
use budget_guard_core::BudgetAlertProcessor;
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const PROJECT_NUMBER_PATH: &str = "/computeMetadata/v1/project/numeric-project-id";
pub const TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

// ============================================================================
// Harness
// ============================================================================

/// Fake metadata server and billing API plus a service configured to use them.
pub struct TestHarness {
    pub metadata: MockServer,
    pub billing: MockServer,
    pub config: ServiceConfig,
}

impl TestHarness {
    /// Start both fake servers. `project_number` plays the role of
    /// `GCP_PROJECT_NUMBER`.
    pub async fn start(project_number: Option<&str>) -> Self {
        let metadata = MockServer::start().await;
        let billing = MockServer::start().await;

        let mut config = ServiceConfig::default();
        config.gcp.metadata_base_url = format!("{}/computeMetadata/v1", metadata.uri());
        config.gcp.billing_api_base_url = format!("{}/v1", billing.uri());
        config.gcp.request_timeout_seconds = 5;
        config.gcp.project_number = project_number.map(str::to_string);

        Self {
            metadata,
            billing,
            config,
        }
    }

    pub fn processor(&self) -> BudgetAlertProcessor {
        build_alert_processor(&self.config.gcp).expect("test configuration must be valid")
    }

    pub fn router(&self) -> Router {
        create_router(AppState::new(
            self.config.clone(),
            Arc::new(self.processor()),
        ))
    }

    /// Serve the project number lookup, expecting `calls` requests.
    pub async fn mount_project_number(&self, body: &str, calls: u64) {
        Mock::given(method("GET"))
            .and(path(PROJECT_NUMBER_PATH))
            .and(header("Metadata-Flavor", "Google"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(calls)
            .named("project number lookup")
            .mount(&self.metadata)
            .await;
    }

    /// Serve the token endpoint with `access_token`, expecting `calls` requests.
    pub async fn mount_token(&self, access_token: &str, calls: u64) {
        Mock::given(method("GET"))
            .and(path(TOKEN_PATH))
            .and(header("Metadata-Flavor", "Google"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": access_token,
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(calls)
            .named("access token")
            .mount(&self.metadata)
            .await;
    }

    /// Fail the test if the metadata server is contacted at all.
    pub async fn forbid_metadata_calls(&self) {
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .named("any metadata call")
            .mount(&self.metadata)
            .await;
    }

    /// Fail the test if the billing API is contacted at all.
    pub async fn forbid_billing_calls(&self) {
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .named("any billing call")
            .mount(&self.billing)
            .await;
    }
}

// ============================================================================
// Request builders
// ============================================================================

/// Wrap `inner_json` in a push envelope the way the push subscription does.
pub fn envelope_body(inner_json: &str) -> String {
    serde_json::json!({
        "message": {
            "data": STANDARD.encode(inner_json.as_bytes()),
            "messageId": "2070443601311540",
            "publishTime": "2026-10-16T08:00:00.000Z",
            "attributes": {
                "billingAccountId": "01D4EE-079462-DFD6EC",
                "budgetId": "de72f49d-779b-4945-a127-4d6ce8def0bb",
                "schemaVersion": "1.0"
            }
        },
        "subscription": "projects/my-project/subscriptions/budget-alerts"
    })
    .to_string()
}

/// Budget notification JSON for the given threshold.
pub fn alert_json(threshold: f64) -> String {
    serde_json::json!({
        "budgetDisplayName": "monthly-cap",
        "alertThresholdExceeded": threshold,
        "costAmount": 100.01,
        "costIntervalStart": "2026-10-01T07:00:00Z",
        "budgetAmount": 100.0,
        "budgetAmountType": "SPECIFIED_AMOUNT",
        "currencyCode": "USD"
    })
    .to_string()
}

pub fn push_request(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/json")
        .body(body.into())
        .expect("request must build")
}
