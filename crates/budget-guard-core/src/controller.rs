//! Project resolution and the billing disable attempt.
//!
//! A disable is one linear attempt with no retries:
//!
//! 1. Resolve the project number: the configured value if there is one,
//!    otherwise a metadata lookup.
//! 2. Fetch a fresh access token from the metadata server. Without a
//!    response the attempt ends here. An unusable response leaves the token
//!    empty and the billing API refuses the request.
//! 3. PUT the unlink request to the billing API.
//!
//! Every path ends in a [`DisableOutcome`] which is logged here and returned
//! to the caller. Nothing is propagated to the webhook sender.

use std::fmt;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::billing::{BillingApi, BillingInfoUpdate};
use crate::metadata::{AccessToken, MetadataError, MetadataProvider};
use crate::ProjectNumber;

// ============================================================================
// Project resolution
// ============================================================================

/// Resolve the project number to act on.
///
/// A configured project number always wins and the metadata server is not
/// contacted. Without one, a single metadata lookup is made.
pub async fn resolve_project_number(
    configured: Option<&ProjectNumber>,
    metadata: &dyn MetadataProvider,
) -> Result<ProjectNumber, MetadataError> {
    if let Some(project) = configured {
        return Ok(project.clone());
    }

    info!("GCP_PROJECT_NUMBER is not set; requesting the project number from the metadata server");
    metadata.project_number().await
}

// ============================================================================
// Outcome
// ============================================================================

/// Result of one disable attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisableOutcome {
    /// The billing API accepted the unlink.
    Disabled { project_number: ProjectNumber },

    /// No project number was configured and the metadata lookup failed.
    ProjectUnresolved { reason: String },

    /// The token request never produced a response; no billing call was made.
    TokenUnavailable {
        project_number: ProjectNumber,
        reason: String,
    },

    /// The billing API answered with something other than `200 OK`.
    Rejected {
        project_number: ProjectNumber,
        status: u16,
        status_text: String,
        body: String,
    },

    /// The billing call did not produce an answer.
    RequestFailed {
        project_number: ProjectNumber,
        reason: String,
    },
}

impl DisableOutcome {
    pub fn is_disabled(&self) -> bool {
        matches!(self, Self::Disabled { .. })
    }

    /// Whether a billing call was sent, regardless of its result.
    pub fn billing_call_attempted(&self) -> bool {
        matches!(
            self,
            Self::Disabled { .. } | Self::Rejected { .. } | Self::RequestFailed { .. }
        )
    }
}

impl fmt::Display for DisableOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled { project_number } => {
                write!(f, "SUCCESS: Project {} unlinked from billing.", project_number)
            }
            Self::ProjectUnresolved { reason } => {
                write!(f, "FAILURE: Could not determine Project Number ({}).", reason)
            }
            Self::TokenUnavailable {
                project_number,
                reason,
            } => write!(
                f,
                "FAILURE: Token Error for project {}: {}",
                project_number, reason
            ),
            Self::Rejected {
                status_text, body, ..
            } => write!(f, "FAILURE: Status {} - Body: {}", status_text, body),
            Self::RequestFailed {
                project_number,
                reason,
            } => write!(
                f,
                "FAILURE: Billing request for project {} failed: {}",
                project_number, reason
            ),
        }
    }
}

// ============================================================================
// Controller
// ============================================================================

/// Drives billing disable attempts.
#[derive(Clone)]
pub struct BillingController {
    metadata: Arc<dyn MetadataProvider>,
    billing: Arc<dyn BillingApi>,
}

impl BillingController {
    pub fn new(metadata: Arc<dyn MetadataProvider>, billing: Arc<dyn BillingApi>) -> Self {
        Self { metadata, billing }
    }

    /// Attempt to unlink billing for the project.
    ///
    /// `configured` is the operator-supplied project number, if any; when it
    /// is `None` the project number is looked up on the metadata server.
    #[instrument(skip(self, configured))]
    pub async fn disable_billing(&self, configured: Option<&ProjectNumber>) -> DisableOutcome {
        let project_number =
            match resolve_project_number(configured, self.metadata.as_ref()).await {
                Ok(project) => project,
                Err(e) => {
                    let outcome = DisableOutcome::ProjectUnresolved {
                        reason: e.to_string(),
                    };
                    error!(error = %e, "{}", outcome);
                    return outcome;
                }
            };

        let token = match self.metadata.access_token().await {
            Ok(token) => token,
            Err(e @ MetadataError::Transport { .. }) => {
                let outcome = DisableOutcome::TokenUnavailable {
                    project_number,
                    reason: e.to_string(),
                };
                error!("{}", outcome);
                return outcome;
            }
            Err(e) => {
                // The billing API rejects the empty token and that failure is logged below
                warn!(
                    project_number = %project_number,
                    error = %e,
                    "Token response unusable; continuing with an empty token"
                );
                AccessToken::empty()
            }
        };

        let update = BillingInfoUpdate::disable(&project_number);

        let outcome = match self
            .billing
            .update_billing_info(&project_number, &token, &update)
            .await
        {
            Ok(response) if response.is_success() => DisableOutcome::Disabled { project_number },
            Ok(response) => DisableOutcome::Rejected {
                project_number,
                status: response.status,
                status_text: response.status_text,
                body: response.body,
            },
            Err(e) => DisableOutcome::RequestFailed {
                project_number,
                reason: e.to_string(),
            },
        };

        if outcome.is_disabled() {
            info!("{}", outcome);
        } else {
            error!("{}", outcome);
        }

        outcome
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
