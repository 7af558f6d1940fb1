//! Layered configuration loading for the service binary.
//!
//! Sources, applied in order (later sources override earlier ones):
//!
//! 1. Built-in defaults from [`ServiceConfig::default`]
//! 2. `/etc/budget-guard/service.yaml`
//! 3. `./config/service.yaml`
//! 4. The file named by `BUDGET_GUARD_CONFIG_FILE` (must exist when set)
//! 5. Environment variables prefixed `BG__`, e.g. `BG__SERVER__PORT=9090`
//! 6. The platform variables `PORT` and `GCP_PROJECT_NUMBER`
//!
//! Empty platform variables count as unset.

use anyhow::Context;
use budget_guard_api::ServiceConfig;

pub const CONFIG_FILE_ENV: &str = "BUDGET_GUARD_CONFIG_FILE";
pub const PORT_ENV: &str = "PORT";
pub const PROJECT_NUMBER_ENV: &str = "GCP_PROJECT_NUMBER";

/// Build the service configuration from all sources.
///
/// The result is not validated; call [`ServiceConfig::validate`] on it.
pub fn load_config() -> anyhow::Result<ServiceConfig> {
    let mut builder = config::Config::builder()
        .add_source(
            config::File::with_name("/etc/budget-guard/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        )
        .add_source(
            config::File::with_name("config/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        );

    if let Some(explicit_path) = non_empty_env(CONFIG_FILE_ENV) {
        builder = builder.add_source(
            config::File::with_name(&explicit_path)
                .required(true)
                .format(config::FileFormat::Yaml),
        );
    }

    builder = builder.add_source(
        config::Environment::with_prefix("BG")
            .separator("__")
            .try_parsing(true),
    );

    let port = match non_empty_env(PORT_ENV) {
        Some(value) => Some(
            value
                .trim()
                .parse::<u16>()
                .with_context(|| format!("{} must be a port number, got '{}'", PORT_ENV, value))?,
        ),
        None => None,
    };

    let config = builder
        .set_override_option("server.port", port.map(i64::from))?
        .set_override_option("gcp.project_number", non_empty_env(PROJECT_NUMBER_ENV))?
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize::<ServiceConfig>()
        .context("Could not deserialize service configuration")
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
