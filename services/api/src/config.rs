//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use job_tracker_core::sharing::EXPIRATION_DAYS_CEILING;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    pub insight_model: String,
    pub insight_timeout: Duration,
    pub public_base_url: String,
    pub default_share_expiration_days: i64,
    pub max_share_expiration_days: i64,
    pub cors_allowed_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Load Server and Database Settings ---
        let bind_address_str = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url =
            lookup("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Insight Generation Settings ---
        let openai_api_key = lookup("OPENAI_API_KEY").filter(|key| !key.trim().is_empty());
        let insight_model = lookup("INSIGHT_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string());
        let insight_timeout = Duration::from_secs(parse_number(&lookup, "INSIGHT_TIMEOUT_SECS", 30)?);

        // --- Load Sharing Settings ---
        let public_base_url = lookup("PUBLIC_BASE_URL")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();
        let default_share_expiration_days = parse_number(&lookup, "DEFAULT_SHARE_EXPIRATION_DAYS", 7)?;
        let max_share_expiration_days = parse_number(&lookup, "MAX_SHARE_EXPIRATION_DAYS", 365)?;
        if !(1..=EXPIRATION_DAYS_CEILING).contains(&max_share_expiration_days) {
            return Err(ConfigError::InvalidValue(
                "MAX_SHARE_EXPIRATION_DAYS".to_string(),
                format!("must be between 1 and {}", EXPIRATION_DAYS_CEILING),
            ));
        }
        if default_share_expiration_days < 1 || default_share_expiration_days > max_share_expiration_days {
            return Err(ConfigError::InvalidValue(
                "DEFAULT_SHARE_EXPIRATION_DAYS".to_string(),
                format!("must be between 1 and {}", max_share_expiration_days),
            ));
        }

        let cors_allowed_origin =
            lookup("CORS_ALLOWED_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            openai_api_key,
            insight_model,
            insight_timeout,
            public_base_url,
            default_share_expiration_days,
            max_share_expiration_days,
            cors_allowed_origin,
        })
    }
}

fn parse_number<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
    }
}
