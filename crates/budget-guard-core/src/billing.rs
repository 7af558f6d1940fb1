//! Cloud Billing API access.
//!
//! Unlinking a project from its billing account is done by updating the
//! project's `billingInfo` resource with an empty `billingAccountName`:
//!
//! ```text
//! PUT {base}/projects/{projectNumber}/billingInfo
//! Authorization: Bearer {token}
//!
//! { "name": "projects/{projectNumber}/billingInfo", "billingAccountName": "" }
//! ```

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{AccessToken, ProjectNumber};

/// Base URL of the Cloud Billing v1 API.
pub const DEFAULT_BILLING_API_BASE_URL: &str = "https://cloudbilling.googleapis.com/v1";

/// Billing API failures that prevented a response from being received.
#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("Failed to encode billing request: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Billing request failed: {message}")]
    Transport { message: String },
}

// ============================================================================
// Request and response
// ============================================================================

/// Body of a `billingInfo` update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingInfoUpdate {
    /// Resource name, `projects/{projectNumber}/billingInfo`
    pub name: String,

    /// Billing account to link. Empty unlinks the current account.
    pub billing_account_name: String,
}

impl BillingInfoUpdate {
    /// Build the update that unlinks `project` from its billing account.
    pub fn disable(project: &ProjectNumber) -> Self {
        Self {
            name: project.billing_info_name(),
            billing_account_name: String::new(),
        }
    }
}

/// Raw answer of the billing API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingResponse {
    pub status: u16,

    /// Status line text, e.g. `403 Forbidden`
    pub status_text: String,

    pub body: String,
}

impl BillingResponse {
    /// Only an exact `200 OK` counts as success.
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

// ============================================================================
// Billing API trait
// ============================================================================

/// Operations against the billing control API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BillingApi: Send + Sync {
    /// Send a `billingInfo` update for `project`.
    ///
    /// Any HTTP answer, successful or not, is returned as a
    /// [`BillingResponse`]. Only failures to obtain an answer are errors.
    async fn update_billing_info(
        &self,
        project: &ProjectNumber,
        token: &AccessToken,
        update: &BillingInfoUpdate,
    ) -> Result<BillingResponse, BillingError>;
}

// ============================================================================
// Cloud Billing client
// ============================================================================

/// [`BillingApi`] backed by the Cloud Billing REST API.
#[derive(Debug, Clone)]
pub struct CloudBillingClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl CloudBillingClient {
    /// Create a client for the billing API at `base_url`.
    pub fn new(http_client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http_client,
            base_url,
        }
    }

    /// URL of the `billingInfo` resource for `project`.
    pub fn billing_info_url(&self, project: &ProjectNumber) -> String {
        format!("{}/{}", self.base_url, project.billing_info_name())
    }
}

#[async_trait]
impl BillingApi for CloudBillingClient {
    #[instrument(skip(self, token, update), fields(project_number = %project))]
    async fn update_billing_info(
        &self,
        project: &ProjectNumber,
        token: &AccessToken,
        update: &BillingInfoUpdate,
    ) -> Result<BillingResponse, BillingError> {
        let url = self.billing_info_url(project);
        debug!(url = %url, "Executing billingInfo PUT");

        let payload = serde_json::to_vec(update)?;

        let response = self
            .http_client
            .put(&url)
            .bearer_auth(token.expose())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(|e| BillingError::Transport {
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response body".to_string());

        Ok(BillingResponse {
            status: status.as_u16(),
            status_text: status.to_string(),
            body,
        })
    }
}

#[cfg(test)]
#[path = "billing_tests.rs"]
mod tests;
