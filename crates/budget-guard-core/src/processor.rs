//! Per-alert orchestration.
//!
//! The HTTP layer decodes the push envelope and hands it to an
//! [`AlertProcessor`]. From there on nothing is reported back to the sender;
//! the returned [`AlertOutcome`] exists for logging and tests.

use async_trait::async_trait;
use tracing::{error, info, instrument};

use crate::alert::{BudgetAlert, PushEnvelope};
use crate::controller::{BillingController, DisableOutcome};
use crate::{ProjectNumber, DEFAULT_DISABLE_THRESHOLD};

/// What happened to one alert.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertOutcome {
    /// The envelope did not carry a budget notification.
    InvalidNotification { reason: String },

    /// The alert was below the disable threshold; nothing was done.
    BelowThreshold { threshold: f64 },

    /// A disable attempt was made.
    DisableAttempted(DisableOutcome),
}

/// Handles decoded push envelopes.
#[async_trait]
pub trait AlertProcessor: Send + Sync {
    async fn process_alert(&self, envelope: PushEnvelope) -> AlertOutcome;
}

/// [`AlertProcessor`] that disables billing once the budget is exhausted.
#[derive(Clone)]
pub struct BudgetAlertProcessor {
    controller: BillingController,
    project_number: Option<ProjectNumber>,
    disable_threshold: f64,
}

impl BudgetAlertProcessor {
    /// Create a processor using the default 100% threshold and no configured
    /// project number.
    pub fn new(controller: BillingController) -> Self {
        Self {
            controller,
            project_number: None,
            disable_threshold: DEFAULT_DISABLE_THRESHOLD,
        }
    }

    /// Use a fixed project number instead of asking the metadata server.
    pub fn with_project_number(mut self, project_number: Option<ProjectNumber>) -> Self {
        self.project_number = project_number;
        self
    }

    /// Set the fraction of the budget at which billing is disabled.
    pub fn with_disable_threshold(mut self, disable_threshold: f64) -> Self {
        self.disable_threshold = disable_threshold;
        self
    }

    pub fn disable_threshold(&self) -> f64 {
        self.disable_threshold
    }

    /// The fixed project number, or `None` when the metadata server decides.
    pub fn project_number(&self) -> Option<&ProjectNumber> {
        self.project_number.as_ref()
    }

    fn log_received(&self, envelope: &PushEnvelope, alert: &BudgetAlert) {
        info!(
            threshold = alert.threshold,
            message_id = envelope.message.message_id.as_deref().unwrap_or(""),
            subscription = envelope.subscription.as_deref().unwrap_or(""),
            budget = alert.budget_display_name.as_deref().unwrap_or(""),
            cost_amount = alert.cost_amount,
            budget_amount = alert.budget_amount,
            currency = alert.currency_code.as_deref().unwrap_or(""),
            "Alert received! Threshold: {:.2}",
            alert.threshold
        );
    }
}

#[async_trait]
impl AlertProcessor for BudgetAlertProcessor {
    #[instrument(skip_all)]
    async fn process_alert(&self, envelope: PushEnvelope) -> AlertOutcome {
        let alert = match envelope.budget_alert() {
            Ok(alert) => alert,
            Err(e) => {
                error!(error = %e, "Error unmarshaling inner data");
                return AlertOutcome::InvalidNotification {
                    reason: e.to_string(),
                };
            }
        };

        self.log_received(&envelope, &alert);

        if !alert.should_disable(self.disable_threshold) {
            return AlertOutcome::BelowThreshold {
                threshold: alert.threshold,
            };
        }

        info!(
            threshold = alert.threshold,
            disable_threshold = self.disable_threshold,
            "CRITICAL: budget threshold reached. Initiating billing disconnect..."
        );

        let outcome = self
            .controller
            .disable_billing(self.project_number.as_ref())
            .await;

        AlertOutcome::DisableAttempted(outcome)
    }
}

#[cfg(test)]
#[path = "processor_tests.rs"]
mod tests;
