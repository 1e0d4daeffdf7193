//! Matchmaking service configuration.
//!
//! Configuration is loaded from environment variables. Provider credentials
//! are required at startup; a service with no credentials fails fast instead
//! of failing on the first pairing. All sensitive fields are redacted in
//! Debug output.

use crate::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default waiting-party TTL in seconds. A visitor who waits longer than
/// this without a partner is expired.
pub const DEFAULT_WAITER_TTL_SECONDS: u64 = 120;

/// Default TTL for party outcome records in seconds. Bounds how long an
/// unclaimed redirect stays collectable.
pub const DEFAULT_RESULT_TTL_SECONDS: u64 = 600;

/// Default stale-waiter sweep interval in seconds.
pub const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 30;

/// Default Zoom OAuth base URL (server-to-server token endpoint).
pub const DEFAULT_ZOOM_OAUTH_BASE_URL: &str = "https://zoom.us";

/// Default Zoom REST API base URL.
pub const DEFAULT_ZOOM_API_BASE_URL: &str = "https://api.zoom.us";

/// Matchmaking service configuration.
///
/// Loaded from environment variables. Zoom credentials are required;
/// everything else has a sensible default. Sensitive fields are redacted
/// in Debug output.
#[derive(Clone)]
pub struct Config {
    /// Zoom server-to-server OAuth client ID.
    pub zoom_client_id: String,

    /// Zoom server-to-server OAuth client secret.
    /// Protected by `SecretString` to prevent accidental logging.
    pub zoom_client_secret: SecretString,

    /// Zoom account ID for the account_credentials grant.
    pub zoom_account_id: String,

    /// Zoom OAuth base URL (default: "https://zoom.us"). Tests point this
    /// at a local mock server.
    pub zoom_oauth_base_url: String,

    /// Zoom REST API base URL (default: "https://api.zoom.us").
    pub zoom_api_base_url: String,

    /// Redis connection URL for the shared store. When unset the service
    /// runs with the in-memory store (single instance only).
    /// Protected by `SecretString` to prevent accidental logging.
    pub redis_url: Option<SecretString>,

    /// HTTP server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Waiting-party TTL in seconds (default: 120).
    pub waiter_ttl_seconds: u64,

    /// Party outcome record TTL in seconds (default: 600).
    pub result_ttl_seconds: u64,

    /// Stale-waiter sweep interval in seconds (default: 30).
    pub sweep_interval_seconds: u64,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("zoom_client_id", &self.zoom_client_id)
            .field("zoom_client_secret", &"[REDACTED]")
            .field("zoom_account_id", &self.zoom_account_id)
            .field("zoom_oauth_base_url", &self.zoom_oauth_base_url)
            .field("zoom_api_base_url", &self.zoom_api_base_url)
            .field("redis_url", &self.redis_url.as_ref().map(|_| "[REDACTED]"))
            .field("bind_address", &self.bind_address)
            .field("waiter_ttl_seconds", &self.waiter_ttl_seconds)
            .field("result_ttl_seconds", &self.result_ttl_seconds)
            .field("sweep_interval_seconds", &self.sweep_interval_seconds)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let zoom_client_id = vars
            .get("ZOOM_CLIENT_ID")
            .ok_or_else(|| ConfigError::MissingEnvVar("ZOOM_CLIENT_ID".to_string()))?
            .clone();

        let zoom_client_secret = SecretString::from(
            vars.get("ZOOM_CLIENT_SECRET")
                .ok_or_else(|| ConfigError::MissingEnvVar("ZOOM_CLIENT_SECRET".to_string()))?
                .clone(),
        );

        let zoom_account_id = vars
            .get("ZOOM_ACCOUNT_ID")
            .ok_or_else(|| ConfigError::MissingEnvVar("ZOOM_ACCOUNT_ID".to_string()))?
            .clone();

        let zoom_oauth_base_url = vars
            .get("ZOOM_OAUTH_BASE_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_ZOOM_OAUTH_BASE_URL.to_string());

        let zoom_api_base_url = vars
            .get("ZOOM_API_BASE_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_ZOOM_API_BASE_URL.to_string());

        let redis_url = vars.get("REDIS_URL").cloned().map(SecretString::from);

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let waiter_ttl_seconds =
            parse_positive(vars, "MM_WAITER_TTL_SECONDS", DEFAULT_WAITER_TTL_SECONDS)?;

        let result_ttl_seconds =
            parse_positive(vars, "MM_RESULT_TTL_SECONDS", DEFAULT_RESULT_TTL_SECONDS)?;

        let sweep_interval_seconds = parse_positive(
            vars,
            "MM_SWEEP_INTERVAL_SECONDS",
            DEFAULT_SWEEP_INTERVAL_SECONDS,
        )?;

        Ok(Config {
            zoom_client_id,
            zoom_client_secret,
            zoom_account_id,
            zoom_oauth_base_url,
            zoom_api_base_url,
            redis_url,
            bind_address,
            waiter_ttl_seconds,
            result_ttl_seconds,
            sweep_interval_seconds,
        })
    }
}

/// Parse an optional positive-integer variable with validation.
fn parse_positive(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: u64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidValue(format!(
            "{} must be a valid positive integer, got '{}': {}",
            name, value_str, e
        ))
    })?;

    if value == 0 {
        return Err(ConfigError::InvalidValue(format!(
            "{} must be greater than 0",
            name
        )));
    }

    Ok(value)
}
