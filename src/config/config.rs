use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use super::logging::LoggingConfig;
use crate::gateway::GatewayConfig;

/// A top-level enum for versioned configurations.
#[derive(Deserialize, Serialize, JsonSchema)]
#[serde(tag = "version")]
pub enum Config {
    #[serde(rename = "1.0.0")]
    ConfigV1(ConfigV1),
}

/// Main config for v1.0.0.
#[derive(Deserialize, Serialize, Debug, JsonSchema)]
pub struct ConfigV1 {
    /// Listen address. Every client of the service shares the one signed-in
    /// session, so keep this on a loopback address.
    pub bind_address: String,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

/// Tuning for the auth controller.
#[derive(Deserialize, Serialize, Debug, JsonSchema, Clone)]
pub struct AuthConfig {
    /// Deadline for the admin-privilege lookup after a login.
    #[serde(default = "default_admin_check_timeout")]
    pub admin_check_timeout_in_ms: u64,
}

fn default_admin_check_timeout() -> u64 {
    8000
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            admin_check_timeout_in_ms: default_admin_check_timeout(),
        }
    }
}

/// Settings for the in-memory notification dropdown.
#[derive(Deserialize, Serialize, Debug, JsonSchema, Clone)]
pub struct NotificationConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_seed_samples")]
    pub seed_samples: bool,
}

fn default_capacity() -> usize {
    50
}

fn default_seed_samples() -> bool {
    true
}

impl Default for NotificationConfig {
    fn default() -> Self {
        NotificationConfig {
            capacity: default_capacity(),
            seed_samples: default_seed_samples(),
        }
    }
}

/// Extracts a `ConfigV1` from any figment, resolving the version tag.
pub fn extract_config(figment: Figment) -> Result<ConfigV1, figment::Error> {
    match figment.extract::<Config>()? {
        Config::ConfigV1(c) => Ok(c),
    }
}

/// Load config from "./config.yaml", with `RIGAUTH_` environment overrides
/// (nested keys separated by `__`, e.g. `RIGAUTH_AUTH__ADMIN_CHECK_TIMEOUT_IN_MS`).
pub fn load_config() -> ConfigV1 {
    let figment = Figment::new()
        .merge(Yaml::file("./config.yaml"))
        .merge(Env::prefixed("RIGAUTH_").split("__"));
    match extract_config(figment) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            std::process::exit(1);
        }
    }
}

/// Print the JSON schema for the configuration to stdout.
pub fn print_schema() {
    let schema = schema_for!(Config);
    match serde_json::to_string_pretty(&schema) {
        Ok(s) => println!("{}", s),
        Err(e) => {
            eprintln!("Failed to render configuration schema: {}", e);
            std::process::exit(1);
        }
    }
}
