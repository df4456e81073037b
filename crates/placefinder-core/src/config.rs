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

/// Parses a numeric env var, falling back to `default` when the var is unset.
fn parse_or<T, F>(lookup: &F, var: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let raw = lookup(var).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let places_api_key = lookup("GOOGLE_PLACES_API_KEY")
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar("GOOGLE_PLACES_API_KEY".to_string()))?;

    let env = parse_environment(&or_default("PLACEFINDER_ENV", "development"));
    let bind_addr: SocketAddr = parse_or(&lookup, "PLACEFINDER_BIND_ADDR", "0.0.0.0:3001")?;
    let log_level = or_default("PLACEFINDER_LOG_LEVEL", "info");
    let places_base_url = or_default(
        "PLACEFINDER_PLACES_BASE_URL",
        "https://maps.googleapis.com/maps/api/place/",
    );
    let user_agent = or_default(
        "PLACEFINDER_USER_AGENT",
        "placefinder/0.1 (business-search)",
    );

    let request_timeout_secs = parse_or(&lookup, "PLACEFINDER_REQUEST_TIMEOUT_SECS", "30")?;
    let max_retries = parse_or(&lookup, "PLACEFINDER_MAX_RETRIES", "3")?;
    let retry_backoff_ms = parse_or(&lookup, "PLACEFINDER_RETRY_BACKOFF_MS", "300")?;
    let settle_delay_ms = parse_or(&lookup, "PLACEFINDER_SETTLE_DELAY_MS", "2000")?;
    let inter_page_delay_ms = parse_or(&lookup, "PLACEFINDER_INTER_PAGE_DELAY_MS", "100")?;
    let page_fetch_ceiling = parse_or(&lookup, "PLACEFINDER_PAGE_FETCH_CEILING", "60")?;
    let min_partial_results = parse_or(&lookup, "PLACEFINDER_MIN_PARTIAL_RESULTS", "1")?;
    let enrichment_batch_size = parse_or(&lookup, "PLACEFINDER_ENRICHMENT_BATCH_SIZE", "5")?;
    let search_radius_meters = parse_or(&lookup, "PLACEFINDER_SEARCH_RADIUS_METERS", "50000")?;
    let photo_max_width = parse_or(&lookup, "PLACEFINDER_PHOTO_MAX_WIDTH", "400")?;
    let search_deadline_secs = parse_or(&lookup, "PLACEFINDER_SEARCH_DEADLINE_SECS", "60")?;
    let rate_limit_max_requests =
        parse_or(&lookup, "PLACEFINDER_RATE_LIMIT_MAX_REQUESTS", "100")?;
    let rate_limit_window_secs = parse_or(&lookup, "PLACEFINDER_RATE_LIMIT_WINDOW_SECS", "900")?;
    let slow_down_after = parse_or(&lookup, "PLACEFINDER_SLOW_DOWN_AFTER", "50")?;
    let slow_down_step_ms = parse_or(&lookup, "PLACEFINDER_SLOW_DOWN_STEP_MS", "500")?;
    let database_url = or_default("PLACEFINDER_DATABASE_URL", "sqlite://placefinder.db");
    let db_max_connections = parse_or(&lookup, "PLACEFINDER_DB_MAX_CONNECTIONS", "5")?;
    let db_acquire_timeout_secs = parse_or(&lookup, "PLACEFINDER_DB_ACQUIRE_TIMEOUT_SECS", "10")?;
    let history_max_entries = parse_or(&lookup, "PLACEFINDER_HISTORY_MAX_ENTRIES", "500")?;

    if page_fetch_ceiling == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "PLACEFINDER_PAGE_FETCH_CEILING".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    if enrichment_batch_size == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "PLACEFINDER_ENRICHMENT_BATCH_SIZE".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    if history_max_entries == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "PLACEFINDER_HISTORY_MAX_ENTRIES".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        places_api_key,
        places_base_url,
        request_timeout_secs,
        user_agent,
        max_retries,
        retry_backoff_ms,
        settle_delay_ms,
        inter_page_delay_ms,
        page_fetch_ceiling,
        min_partial_results,
        enrichment_batch_size,
        search_radius_meters,
        photo_max_width,
        search_deadline_secs,
        rate_limit_max_requests,
        rate_limit_window_secs,
        slow_down_after,
        slow_down_step_ms,
        database_url,
        db_max_connections,
        db_acquire_timeout_secs,
        history_max_entries,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}
