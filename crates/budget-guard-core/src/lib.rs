//! # Budget-Guard Core
//!
//! Domain logic for the budget-guard billing kill switch.
//!
//! A cloud budget publishes alerts to a push subscription. Each alert carries
//! the fraction of the budget that has been consumed. Once that fraction
//! reaches the disable threshold (100% by default), this crate unlinks the
//! hosting project from its billing account.
//!
//! ## Architecture
//!
//! - [`alert`] decodes the push envelope and the budget notification inside it
//! - [`metadata`] talks to the instance metadata server for the project number
//!   and an access token
//! - [`billing`] issues the `billingInfo` update against the Cloud Billing API
//! - [`controller`] resolves the project and drives one disable attempt
//! - [`processor`] ties the pieces together per inbound alert
//!
//! External services sit behind the [`MetadataProvider`] and [`BillingApi`]
//! traits so the orchestration can be exercised without a network.
//!
//! ## Usage
//!
//! ```rust
//! use budget_guard_core::ProjectNumber;
//!
//! let project = ProjectNumber::parse("123456789012").unwrap();
//! assert_eq!(project.billing_info_name(), "projects/123456789012/billingInfo");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub mod alert;
pub mod billing;
pub mod controller;
pub mod metadata;
pub mod processor;

pub use alert::{BudgetAlert, PayloadError, PushEnvelope, PushMessage};
pub use billing::{BillingApi, BillingError, BillingInfoUpdate, BillingResponse, CloudBillingClient};
pub use controller::{resolve_project_number, BillingController, DisableOutcome};
pub use metadata::{AccessToken, GceMetadataClient, MetadataError, MetadataProvider};
pub use processor::{AlertOutcome, AlertProcessor, BudgetAlertProcessor};

/// User agent sent on every outbound request.
pub const USER_AGENT: &str = concat!("budget-guard/", env!("CARGO_PKG_VERSION"));

/// Default fraction of the budget at which billing is disabled.
pub const DEFAULT_DISABLE_THRESHOLD: f64 = 1.0;

// ============================================================================
// Project Number
// ============================================================================

/// Numeric identifier of a cloud project.
///
/// The billing API accepts either the project ID or the project number; the
/// metadata server reports the number, so that is what the service carries.
/// The value is always non-empty and made of ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectNumber(String);

impl ProjectNumber {
    /// Parse a project number, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidProjectNumber`] when the trimmed value is empty or
    /// contains anything other than ASCII digits.
    pub fn parse(value: &str) -> Result<Self, InvalidProjectNumber> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(InvalidProjectNumber::Empty);
        }

        if !trimmed.chars().all(|c| c.is_ascii_digit()) {
            return Err(InvalidProjectNumber::NotNumeric {
                value: trimmed.to_string(),
            });
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Get the project number as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resource name of the project's billing info, e.g. `projects/42/billingInfo`.
    pub fn billing_info_name(&self) -> String {
        format!("projects/{}/billingInfo", self.0)
    }
}

impl fmt::Display for ProjectNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ProjectNumber {
    type Error = InvalidProjectNumber;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProjectNumber> for String {
    fn from(value: ProjectNumber) -> Self {
        value.0
    }
}

/// Reasons a string is rejected as a [`ProjectNumber`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidProjectNumber {
    #[error("project number is empty")]
    Empty,

    #[error("project number must contain only digits, got '{value}'")]
    NotNumeric { value: String },
}

// ============================================================================
// HTTP client
// ============================================================================

/// Build the HTTP client shared by the metadata and billing clients.
///
/// Every request made through the client is bounded by `timeout`.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
