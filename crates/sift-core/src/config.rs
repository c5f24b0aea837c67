use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so tests can drive it with a
/// plain `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("SIFT_ENV", "development"))?;
    let log_level = or_default("SIFT_LOG_LEVEL", "info");
    let ranking_path = PathBuf::from(or_default("SIFT_RANKING_PATH", "./config/ranking.yaml"));

    let db_max_connections = parse_u32("SIFT_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("SIFT_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("SIFT_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let retry_max_retries = parse_u32("SIFT_RETRY_MAX_RETRIES", "3")?;
    let retry_base_delay_ms = parse_u64("SIFT_RETRY_BASE_DELAY_MS", "1000")?;
    let retry_max_delay_ms = parse_u64("SIFT_RETRY_MAX_DELAY_MS", "30000")?;

    if retry_max_delay_ms < retry_base_delay_ms {
        return Err(ConfigError::InvalidEnvVar {
            var: "SIFT_RETRY_MAX_DELAY_MS".to_string(),
            reason: format!("must be >= SIFT_RETRY_BASE_DELAY_MS ({retry_base_delay_ms})"),
        });
    }

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        ranking_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        retry_max_retries,
        retry_base_delay_ms,
        retry_max_delay_ms,
    })
}

fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "SIFT_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
