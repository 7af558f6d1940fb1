//! Push envelope and budget notification decoding.
//!
//! A push subscription delivers each budget notification wrapped in an
//! envelope:
//!
//! ```json
//! { "message": { "data": "<base64 of the notification JSON>", "messageId": "..." },
//!   "subscription": "projects/p/subscriptions/s" }
//! ```
//!
//! Decoding happens in two stages with different failure semantics. A body
//! that is not a valid envelope (including `data` that is not valid base64)
//! is rejected back to the caller. A valid envelope whose `data` does not hold
//! a budget notification is only logged.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;

/// Errors produced while decoding inbound alerts.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    /// The request body is not a push envelope.
    #[error("Invalid push envelope: {0}")]
    InvalidEnvelope(#[source] serde_json::Error),

    /// The envelope's `data` is not a budget notification.
    #[error("Invalid budget notification: {0}")]
    InvalidNotification(#[source] serde_json::Error),
}

// ============================================================================
// Push envelope
// ============================================================================

/// Outer wrapper delivered by the push subscription.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PushEnvelope {
    /// The published message
    #[serde(default)]
    pub message: PushMessage,

    /// Full name of the subscription that delivered the message
    #[serde(default)]
    pub subscription: Option<String>,
}

/// A single published message.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    /// Decoded message payload. Empty when the field is absent.
    #[serde(default, deserialize_with = "deserialize_base64")]
    pub data: Vec<u8>,

    /// Server-assigned message identifier
    #[serde(default, alias = "message_id")]
    pub message_id: Option<String>,

    /// Time the message was published (RFC 3339)
    #[serde(default, alias = "publish_time")]
    pub publish_time: Option<String>,

    /// Message attributes set by the publisher
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl PushEnvelope {
    /// Decode an envelope from a raw request body.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::InvalidEnvelope`] when the body is not JSON of
    /// the envelope shape or when `message.data` is not valid base64.
    pub fn from_slice(body: &[u8]) -> Result<Self, PayloadError> {
        serde_json::from_slice(body).map_err(PayloadError::InvalidEnvelope)
    }

    /// Build an envelope around an already encoded notification.
    pub fn from_data(data: impl Into<Vec<u8>>) -> Self {
        Self {
            message: PushMessage {
                data: data.into(),
                ..PushMessage::default()
            },
            subscription: None,
        }
    }

    /// Decode the budget notification carried by this envelope.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::InvalidNotification`] when the payload is empty
    /// or not a JSON object of the notification shape.
    pub fn budget_alert(&self) -> Result<BudgetAlert, PayloadError> {
        BudgetAlert::from_slice(&self.message.data)
    }
}

fn deserialize_base64<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let encoded = Option::<String>::deserialize(deserializer)?;
    match encoded {
        Some(encoded) => STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom),
        None => Ok(Vec::new()),
    }
}

// ============================================================================
// Budget notification
// ============================================================================

/// Budget notification published by the billing budget.
///
/// Only [`threshold`](Self::threshold) drives behavior. The remaining fields
/// are informational and logged when present.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetAlert {
    /// Fraction of the budget consumed when the alert fired (1.0 = 100%).
    ///
    /// Not range checked. A notification without the field decodes as `0.0`.
    #[serde(rename = "alertThresholdExceeded", default)]
    pub threshold: f64,

    #[serde(default)]
    pub budget_display_name: Option<String>,

    #[serde(default)]
    pub cost_amount: Option<f64>,

    #[serde(default)]
    pub cost_interval_start: Option<String>,

    #[serde(default)]
    pub budget_amount: Option<f64>,

    #[serde(default)]
    pub budget_amount_type: Option<String>,

    #[serde(default)]
    pub currency_code: Option<String>,
}

impl BudgetAlert {
    /// Decode a notification from its JSON bytes.
    pub fn from_slice(data: &[u8]) -> Result<Self, PayloadError> {
        serde_json::from_slice(data).map_err(PayloadError::InvalidNotification)
    }

    /// Whether this alert reached the disable threshold.
    ///
    /// The comparison is a plain `>=`; alerts below the threshold (50% or
    /// 90% warnings) never trigger.
    pub fn should_disable(&self, disable_threshold: f64) -> bool {
        self.threshold >= disable_threshold
    }
}

#[cfg(test)]
#[path = "alert_tests.rs"]
mod tests;
