//! Instance metadata server access.
//!
//! The metadata server is reachable from inside the hosting platform only and
//! requires the `Metadata-Flavor: Google` header on every request. It provides
//! the numeric project identifier and short-lived access tokens for the
//! default service account.
//!
//! Each lookup is a single attempt. Failures come back as [`MetadataError`]
//! and the caller decides how far to degrade.

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use tracing::{debug, instrument};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{InvalidProjectNumber, ProjectNumber};

/// Base URL of the metadata server's v1 API.
pub const DEFAULT_METADATA_BASE_URL: &str = "http://metadata.google.internal/computeMetadata/v1";

/// Header the metadata server requires on every request.
pub const METADATA_FLAVOR_HEADER: &str = "Metadata-Flavor";

/// Required value of [`METADATA_FLAVOR_HEADER`].
pub const METADATA_FLAVOR_VALUE: &str = "Google";

const PROJECT_NUMBER_PATH: &str = "project/numeric-project-id";
const ACCESS_TOKEN_PATH: &str = "instance/service-accounts/default/token";

// ============================================================================
// Errors
// ============================================================================

/// Metadata lookup failures.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// The request never produced a response (DNS, connect, timeout, ...).
    #[error("Metadata request failed: {message}")]
    Transport { message: String },

    /// The server answered with a non-success status.
    #[error("Metadata server returned status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// The server answered but the body could not be interpreted.
    #[error("Invalid metadata response: {message}")]
    InvalidResponse { message: String },
}

impl From<InvalidProjectNumber> for MetadataError {
    fn from(e: InvalidProjectNumber) -> Self {
        Self::InvalidResponse {
            message: e.to_string(),
        }
    }
}

// ============================================================================
// Access token
// ============================================================================

/// OAuth2 access token for the default service account.
///
/// Fetched fresh for every billing call and never cached. The value is kept
/// out of `Debug` output and wiped from memory on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a raw token value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// An empty token; the billing API rejects requests made with it.
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// Get the raw token value for use in an `Authorization` header.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the token carries no value, as after a failed fetch.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AccessToken").field(&"[REDACTED]").finish()
    }
}

#[derive(Deserialize, Zeroize, ZeroizeOnDrop)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
}

// ============================================================================
// Provider trait
// ============================================================================

/// Source of project identity and credentials.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Look up the numeric identifier of the hosting project.
    async fn project_number(&self) -> Result<ProjectNumber, MetadataError>;

    /// Fetch a fresh access token for the default service account.
    async fn access_token(&self) -> Result<AccessToken, MetadataError>;
}

// ============================================================================
// Metadata server client
// ============================================================================

/// [`MetadataProvider`] backed by the instance metadata server.
#[derive(Debug, Clone)]
pub struct GceMetadataClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl GceMetadataClient {
    /// Create a client for the metadata server at `base_url`.
    ///
    /// Trailing slashes on `base_url` are ignored.
    pub fn new(http_client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http_client,
            base_url,
        }
    }

    async fn get(&self, path: &str) -> Result<String, MetadataError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(url = %url, "Querying metadata server");

        let response = self
            .http_client
            .get(&url)
            .header(METADATA_FLAVOR_HEADER, METADATA_FLAVOR_VALUE)
            .send()
            .await
            .map_err(|e| MetadataError::Transport {
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| MetadataError::Transport {
                message: format!("Failed to read response body: {}", e),
            })?;

        if !status.is_success() {
            return Err(MetadataError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl MetadataProvider for GceMetadataClient {
    #[instrument(skip(self))]
    async fn project_number(&self) -> Result<ProjectNumber, MetadataError> {
        let body = self.get(PROJECT_NUMBER_PATH).await?;
        Ok(ProjectNumber::parse(&body)?)
    }

    #[instrument(skip(self))]
    async fn access_token(&self) -> Result<AccessToken, MetadataError> {
        let mut body = self.get(ACCESS_TOKEN_PATH).await?;
        let parsed = serde_json::from_str::<TokenResponse>(&body);
        body.zeroize();

        let mut token = parsed.map_err(|e| MetadataError::InvalidResponse {
            message: format!("Failed to parse token response: {}", e),
        })?;

        Ok(AccessToken::new(std::mem::take(&mut token.access_token)))
    }
}

#[cfg(test)]
#[path = "metadata_tests.rs"]
mod tests;
