//! # Budget-Guard HTTP Service
//!
//! HTTP server receiving budget alerts from a push subscription.
//!
//! Every request, whatever its method or path, is treated as a push delivery:
//! the body is decoded as a push envelope and handed to the
//! [`AlertProcessor`]. The sender only ever sees two answers:
//!
//! - `400 Bad Request` when the body is not a push envelope
//! - `200 OK` otherwise, whatever happened downstream

pub mod config;
pub mod errors;

pub use config::{GcpConfig, LoggingConfig, ServerConfig, ServiceConfig};
pub use errors::{AlertHandlerError, ConfigError, ServiceError};

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{Method, StatusCode, Uri},
    Router,
};
use budget_guard_core::{
    build_http_client, AlertProcessor, BillingController, BudgetAlertProcessor,
    CloudBillingClient, GceMetadataClient, PushEnvelope,
};
use bytes::Bytes;
use std::{future::IntoFuture, sync::Arc, time::Duration};
use tokio::sync::Notify;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, instrument, warn};

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: Arc<ServiceConfig>,

    /// Processor for decoded alerts
    pub alert_processor: Arc<dyn AlertProcessor>,
}

impl AppState {
    /// Create new application state
    pub fn new(config: ServiceConfig, alert_processor: Arc<dyn AlertProcessor>) -> Self {
        Self {
            config: Arc::new(config),
            alert_processor,
        }
    }
}

// ============================================================================
// Wiring
// ============================================================================

/// Build the alert processor described by `config`.
///
/// The metadata and billing clients share one HTTP client bounded by
/// `gcp.request_timeout_seconds`.
pub fn build_alert_processor(config: &GcpConfig) -> Result<BudgetAlertProcessor, ServiceError> {
    let http_client = build_http_client(config.request_timeout()).map_err(|e| {
        ServiceError::Configuration(ConfigError::Invalid {
            message: format!("Failed to build HTTP client: {}", e),
        })
    })?;

    let metadata = Arc::new(GceMetadataClient::new(
        http_client.clone(),
        config.metadata_base_url.clone(),
    ));
    let billing = Arc::new(CloudBillingClient::new(
        http_client,
        config.billing_api_base_url.clone(),
    ));

    Ok(
        BudgetAlertProcessor::new(BillingController::new(metadata, billing))
            .with_project_number(config.project_number()?)
            .with_disable_threshold(config.disable_threshold),
    )
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router sending every request to the alert handler
pub fn create_router(state: AppState) -> Router {
    let max_body_size = state.config.server.max_body_size;

    Router::new()
        .fallback(handle_alert)
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start HTTP server and run until a shutdown signal arrives
pub async fn start_server(
    config: ServiceConfig,
    alert_processor: Arc<dyn AlertProcessor>,
) -> Result<(), ServiceError> {
    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_seconds);
    let bind_address = format!("{}:{}", config.server.host, config.server.port);

    let app = create_router(AppState::new(config, alert_processor));

    let listener = tokio::net::TcpListener::bind(bind_address.as_str())
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: bind_address.clone(),
            message: e.to_string(),
        })?;

    match listener.local_addr() {
        Ok(addr) => info!("Listening on {}", addr),
        Err(_) => info!("Listening on {}", bind_address),
    }

    // In-flight requests may finish after the signal, but only for `shutdown_timeout`
    let shutdown_started = Arc::new(Notify::new());
    let notifier = shutdown_started.clone();

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!(
                "Initiating graceful shutdown with {}s timeout",
                shutdown_timeout.as_secs()
            );
            notifier.notify_one();
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.map_err(|e| ServiceError::ServerFailed {
                message: e.to_string(),
            })?;
        }
        _ = async {
            shutdown_started.notified().await;
            tokio::time::sleep(shutdown_timeout).await;
        } => {
            warn!(
                timeout_seconds = shutdown_timeout.as_secs(),
                "Graceful shutdown timed out; abandoning in-flight requests"
            );
        }
    }

    info!("HTTP server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C)"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Handle a push delivery of a budget alert
///
/// Method and path are not checked. Once the envelope decodes the answer is
/// `200 OK`, including when the notification inside is malformed or the
/// disable attempt fails.
#[instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4()))]
pub async fn handle_alert(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Result<StatusCode, AlertHandlerError> {
    debug!(method = %method, path = %uri.path(), size = body.len(), "Received push delivery");

    let envelope = PushEnvelope::from_slice(&body).map_err(AlertHandlerError::InvalidEnvelope)?;

    let outcome = state.alert_processor.process_alert(envelope).await;
    debug!(outcome = ?outcome, "Alert handled");

    Ok(StatusCode::OK)
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
