use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Desktop Chrome user agent sent by the standard fetch tier unless overridden.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
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
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a pure
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    // Empty values count as unset so `.env` templates can leave them blank.
    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let env = parse_environment(&or_default("PRICEWATCH_ENV", "development"))?;
    let log_level = or_default("PRICEWATCH_LOG_LEVEL", "info");
    let retailers_path = PathBuf::from(or_default(
        "PRICEWATCH_RETAILERS_PATH",
        "./config/retailers.yaml",
    ));

    let user_agent = or_default("PRICEWATCH_USER_AGENT", DEFAULT_USER_AGENT);
    let request_timeout_secs = parse_u64("PRICEWATCH_REQUEST_TIMEOUT_SECS", "15")?;

    let render_url = optional("PRICEWATCH_RENDER_URL");
    let unblock_url = optional("PRICEWATCH_UNBLOCK_URL");
    let render_api_key = optional("PRICEWATCH_RENDER_API_KEY");
    let render_timeout_secs = parse_u64("PRICEWATCH_RENDER_TIMEOUT_SECS", "45")?;

    let ai_url = optional("PRICEWATCH_AI_URL");
    let ai_api_key = optional("PRICEWATCH_AI_API_KEY");
    let ai_model = or_default("PRICEWATCH_AI_MODEL", "gpt-4o-mini");
    let ai_timeout_secs = parse_u64("PRICEWATCH_AI_TIMEOUT_SECS", "30")?;
    let ai_max_html_chars = parse_usize("PRICEWATCH_AI_MAX_HTML_CHARS", "12000")?;

    let retry_max_attempts = parse_u32("PRICEWATCH_RETRY_MAX_ATTEMPTS", "3")?;
    if retry_max_attempts == 0 {
        return Err(invalid(
            "PRICEWATCH_RETRY_MAX_ATTEMPTS",
            "must be at least 1".to_string(),
        ));
    }
    let retry_base_delay_ms = parse_u64("PRICEWATCH_RETRY_BASE_DELAY_MS", "500")?;
    let retry_jitter_ratio = parse_ratio(&or_default("PRICEWATCH_RETRY_JITTER_RATIO", "0.25"))
        .map_err(|reason| invalid("PRICEWATCH_RETRY_JITTER_RATIO", reason))?;

    let breaker_failure_threshold = parse_u32("PRICEWATCH_BREAKER_FAILURE_THRESHOLD", "5")?;
    let breaker_success_threshold = parse_u32("PRICEWATCH_BREAKER_SUCCESS_THRESHOLD", "2")?;
    let breaker_open_timeout_secs = parse_u64("PRICEWATCH_BREAKER_OPEN_TIMEOUT_SECS", "60")?;
    let breaker_half_open_max_calls = parse_u32("PRICEWATCH_BREAKER_HALF_OPEN_MAX_CALLS", "1")?;
    for (var, value) in [
        ("PRICEWATCH_BREAKER_FAILURE_THRESHOLD", breaker_failure_threshold),
        ("PRICEWATCH_BREAKER_SUCCESS_THRESHOLD", breaker_success_threshold),
        ("PRICEWATCH_BREAKER_HALF_OPEN_MAX_CALLS", breaker_half_open_max_calls),
    ] {
        if value == 0 {
            return Err(invalid(var, "must be at least 1".to_string()));
        }
    }

    let max_concurrent_checks = parse_usize("PRICEWATCH_MAX_CONCURRENT_CHECKS", "4")?;
    let results_path = optional("PRICEWATCH_RESULTS_PATH").map(PathBuf::from);

    Ok(AppConfig {
        env,
        log_level,
        retailers_path,
        user_agent,
        request_timeout_secs,
        render_url,
        unblock_url,
        render_api_key,
        render_timeout_secs,
        ai_url,
        ai_api_key,
        ai_model,
        ai_timeout_secs,
        ai_max_html_chars,
        retry_max_attempts,
        retry_base_delay_ms,
        retry_jitter_ratio,
        breaker_failure_threshold,
        breaker_success_threshold,
        breaker_open_timeout_secs,
        breaker_half_open_max_calls,
        max_concurrent_checks,
        results_path,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` for unrecognized values.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "PRICEWATCH_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

fn parse_ratio(raw: &str) -> Result<f64, String> {
    let value = raw.parse::<f64>().map_err(|e| e.to_string())?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is outside 0.0..=1.0"))
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
