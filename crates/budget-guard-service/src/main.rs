//! # Budget-Guard Service
//!
//! Binary entry point for the budget-guard HTTP service.
//!
//! This executable:
//! - Loads configuration from files and environment
//! - Initializes structured logging
//! - Builds the metadata and billing clients
//! - Starts the HTTP server from budget-guard-api
//!
//! Exit codes: `1` bind failure, `2` server failure, `3` configuration error.

mod settings;

use budget_guard_api::{build_alert_processor, start_server, LoggingConfig};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const CONFIG_EXIT_CODE: i32 = 3;

#[tokio::main]
async fn main() {
    let service_config = match settings::load_config() {
        Ok(config) => config,
        Err(e) => {
            init_logging(&LoggingConfig::default());
            error!(error = %format!("{:#}", e), "Failed to load configuration; aborting");
            std::process::exit(CONFIG_EXIT_CODE);
        }
    };

    init_logging(&service_config.logging);

    info!("Starting budget-guard service");

    if let Err(e) = service_config.validate() {
        error!(error = %e, "Service configuration is invalid; aborting");
        std::process::exit(CONFIG_EXIT_CODE);
    }

    let alert_processor = match build_alert_processor(&service_config.gcp) {
        Ok(processor) => processor,
        Err(e) => {
            error!(error = %e, "Failed to build alert processor; aborting");
            std::process::exit(e.exit_code());
        }
    };

    match alert_processor.project_number() {
        Some(project_number) => {
            info!(project_number = %project_number, "Using configured project number")
        }
        None => info!("No project number configured; it will be read from the metadata server"),
    }

    info!(
        host = %service_config.server.host,
        port = service_config.server.port,
        disable_threshold = service_config.gcp.disable_threshold,
        "Starting HTTP server"
    );

    if let Err(e) = start_server(service_config, Arc::new(alert_processor)).await {
        error!("Server failed: {}", e);
        std::process::exit(e.exit_code());
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &logging.level;
        EnvFilter::new(format!(
            "budget_guard_service={level},budget_guard_api={level},budget_guard_core={level},tower_http={level}"
        ))
    });

    let json = logging.json_format;
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}
