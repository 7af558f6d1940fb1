//! Configuration types for the HTTP service

use budget_guard_core::{
    billing::DEFAULT_BILLING_API_BASE_URL, metadata::DEFAULT_METADATA_BASE_URL, ProjectNumber,
    DEFAULT_DISABLE_THRESHOLD,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::ConfigError;

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Metadata server and billing API settings
    pub gcp: GcpConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Check the configuration for values the service cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.gcp.validate()?;
        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,

    /// Maximum request size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout_seconds: 30,
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}

impl ServerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Invalid {
                message: "server.port must be between 1 and 65535".to_string(),
            });
        }

        if self.host.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "server.host".to_string(),
            });
        }

        if self.max_body_size == 0 {
            return Err(ConfigError::Invalid {
                message: "server.max_body_size must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

/// Cloud project and API endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GcpConfig {
    /// Project number to act on. When unset, it is looked up on the metadata
    /// server for every triggering alert.
    pub project_number: Option<String>,

    /// Base URL of the instance metadata server
    pub metadata_base_url: String,

    /// Base URL of the Cloud Billing API
    pub billing_api_base_url: String,

    /// Timeout for each outbound request in seconds
    pub request_timeout_seconds: u64,

    /// Fraction of the budget at which billing is disabled (1.0 = 100%)
    pub disable_threshold: f64,
}

impl Default for GcpConfig {
    fn default() -> Self {
        Self {
            project_number: None,
            metadata_base_url: DEFAULT_METADATA_BASE_URL.to_string(),
            billing_api_base_url: DEFAULT_BILLING_API_BASE_URL.to_string(),
            request_timeout_seconds: 30,
            disable_threshold: DEFAULT_DISABLE_THRESHOLD,
        }
    }
}

impl GcpConfig {
    /// The configured project number, if one is set.
    ///
    /// An empty value counts as unset.
    pub fn project_number(&self) -> Result<Option<ProjectNumber>, ConfigError> {
        match self.project_number.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => ProjectNumber::parse(value)
                .map(Some)
                .map_err(|e| ConfigError::Invalid {
                    message: format!("gcp.project_number: {}", e),
                }),
        }
    }

    /// Timeout applied to every outbound request.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.project_number()?;

        for (key, value) in [
            ("gcp.metadata_base_url", &self.metadata_base_url),
            ("gcp.billing_api_base_url", &self.billing_api_base_url),
        ] {
            url::Url::parse(value).map_err(|e| ConfigError::Invalid {
                message: format!("{} '{}' is not a valid URL: {}", key, value, e),
            })?;
        }

        if self.request_timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                message: "gcp.request_timeout_seconds must be greater than zero".to_string(),
            });
        }

        if !self.disable_threshold.is_finite() || self.disable_threshold <= 0.0 {
            return Err(ConfigError::Invalid {
                message: format!(
                    "gcp.disable_threshold must be a positive number, got {}",
                    self.disable_threshold
                ),
            });
        }

        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
