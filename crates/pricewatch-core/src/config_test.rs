use std::collections::HashMap;
use std::env::VarError;

use super::*;

fn lookup_from_map<'a>(
    map: &'a HashMap<&'a str, &'a str>,
) -> impl Fn(&str) -> Result<String, VarError> + 'a {
    move |key| {
        map.get(key)
            .map(|v| (*v).to_string())
            .ok_or(VarError::NotPresent)
    }
}

#[test]
fn parse_environment_development() {
    assert_eq!(
        parse_environment("development").unwrap(),
        Environment::Development
    );
}

#[test]
fn parse_environment_test() {
    assert_eq!(parse_environment("test").unwrap(), Environment::Test);
}

#[test]
fn parse_environment_production() {
    assert_eq!(
        parse_environment("production").unwrap(),
        Environment::Production
    );
}

#[test]
fn parse_environment_unknown_fails() {
    let err = parse_environment("unknown").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidEnvVar { ref var, .. } if var == "PRICEWATCH_ENV"));
}

#[test]
fn build_app_config_uses_defaults_for_empty_env() {
    let map: HashMap<&str, &str> = HashMap::new();
    let result = build_app_config(lookup_from_map(&map));
    assert!(result.is_ok(), "expected Ok, got: {result:?}");
    let cfg = result.unwrap();
    assert_eq!(cfg.env, Environment::Development);
    assert_eq!(cfg.log_level, "info");
    assert_eq!(
        cfg.retailers_path.to_string_lossy(),
        "./config/retailers.yaml"
    );
    assert_eq!(cfg.user_agent, DEFAULT_USER_AGENT);
    assert_eq!(cfg.request_timeout_secs, 15);
    assert!(cfg.render_url.is_none());
    assert!(cfg.unblock_url.is_none());
    assert!(cfg.render_api_key.is_none());
    assert_eq!(cfg.render_timeout_secs, 45);
    assert!(cfg.ai_url.is_none());
    assert_eq!(cfg.ai_model, "gpt-4o-mini");
    assert_eq!(cfg.ai_timeout_secs, 30);
    assert_eq!(cfg.ai_max_html_chars, 12_000);
    assert_eq!(cfg.retry_max_attempts, 3);
    assert_eq!(cfg.retry_base_delay_ms, 500);
    assert!((cfg.retry_jitter_ratio - 0.25).abs() < f64::EPSILON);
    assert_eq!(cfg.breaker_failure_threshold, 5);
    assert_eq!(cfg.breaker_success_threshold, 2);
    assert_eq!(cfg.breaker_open_timeout_secs, 60);
    assert_eq!(cfg.breaker_half_open_max_calls, 1);
    assert_eq!(cfg.max_concurrent_checks, 4);
    assert!(cfg.results_path.is_none());
}

#[test]
fn build_app_config_fails_with_unknown_env() {
    let mut map = HashMap::new();
    map.insert("PRICEWATCH_ENV", "staging");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "PRICEWATCH_ENV"),
        "expected InvalidEnvVar(PRICEWATCH_ENV), got: {result:?}"
    );
}

#[test]
fn render_and_ai_endpoints_override() {
    let mut map = HashMap::new();
    map.insert("PRICEWATCH_RENDER_URL", "http://render.local/render");
    map.insert("PRICEWATCH_UNBLOCK_URL", "http://render.local/unblock");
    map.insert("PRICEWATCH_RENDER_API_KEY", "render-secret");
    map.insert("PRICEWATCH_AI_URL", "http://llm.local/v1");
    map.insert("PRICEWATCH_AI_API_KEY", "sk-test");
    map.insert("PRICEWATCH_AI_MODEL", "gpt-4o");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.render_url.as_deref(), Some("http://render.local/render"));
    assert_eq!(cfg.unblock_url.as_deref(), Some("http://render.local/unblock"));
    assert_eq!(cfg.render_api_key.as_deref(), Some("render-secret"));
    assert_eq!(cfg.ai_url.as_deref(), Some("http://llm.local/v1"));
    assert_eq!(cfg.ai_api_key.as_deref(), Some("sk-test"));
    assert_eq!(cfg.ai_model, "gpt-4o");
}

#[test]
fn blank_optional_values_are_treated_as_unset() {
    let mut map = HashMap::new();
    map.insert("PRICEWATCH_RENDER_URL", "   ");
    map.insert("PRICEWATCH_RESULTS_PATH", "");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert!(cfg.render_url.is_none());
    assert!(cfg.results_path.is_none());
}

#[test]
fn request_timeout_invalid() {
    let mut map = HashMap::new();
    map.insert("PRICEWATCH_REQUEST_TIMEOUT_SECS", "not-a-number");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "PRICEWATCH_REQUEST_TIMEOUT_SECS"),
        "expected InvalidEnvVar(PRICEWATCH_REQUEST_TIMEOUT_SECS), got: {result:?}"
    );
}

#[test]
fn retry_max_attempts_override() {
    let mut map = HashMap::new();
    map.insert("PRICEWATCH_RETRY_MAX_ATTEMPTS", "5");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.retry_max_attempts, 5);
}

#[test]
fn retry_max_attempts_zero_is_rejected() {
    let mut map = HashMap::new();
    map.insert("PRICEWATCH_RETRY_MAX_ATTEMPTS", "0");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "PRICEWATCH_RETRY_MAX_ATTEMPTS"),
        "expected InvalidEnvVar(PRICEWATCH_RETRY_MAX_ATTEMPTS), got: {result:?}"
    );
}

#[test]
fn retry_jitter_ratio_override() {
    let mut map = HashMap::new();
    map.insert("PRICEWATCH_RETRY_JITTER_RATIO", "0.5");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert!((cfg.retry_jitter_ratio - 0.5).abs() < f64::EPSILON);
}

#[test]
fn retry_jitter_ratio_out_of_range() {
    let mut map = HashMap::new();
    map.insert("PRICEWATCH_RETRY_JITTER_RATIO", "1.5");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "PRICEWATCH_RETRY_JITTER_RATIO"),
        "expected InvalidEnvVar(PRICEWATCH_RETRY_JITTER_RATIO), got: {result:?}"
    );
}

#[test]
fn breaker_thresholds_override() {
    let mut map = HashMap::new();
    map.insert("PRICEWATCH_BREAKER_FAILURE_THRESHOLD", "3");
    map.insert("PRICEWATCH_BREAKER_OPEN_TIMEOUT_SECS", "120");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.breaker_failure_threshold, 3);
    assert_eq!(cfg.breaker_open_timeout_secs, 120);
}

#[test]
fn breaker_zero_threshold_is_rejected() {
    let mut map = HashMap::new();
    map.insert("PRICEWATCH_BREAKER_SUCCESS_THRESHOLD", "0");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "PRICEWATCH_BREAKER_SUCCESS_THRESHOLD"),
        "expected InvalidEnvVar(PRICEWATCH_BREAKER_SUCCESS_THRESHOLD), got: {result:?}"
    );
}

#[test]
fn max_concurrent_checks_invalid() {
    let mut map = HashMap::new();
    map.insert("PRICEWATCH_MAX_CONCURRENT_CHECKS", "-1");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "PRICEWATCH_MAX_CONCURRENT_CHECKS"),
        "expected InvalidEnvVar(PRICEWATCH_MAX_CONCURRENT_CHECKS), got: {result:?}"
    );
}

#[test]
fn debug_redacts_api_keys() {
    let mut map = HashMap::new();
    map.insert("PRICEWATCH_AI_API_KEY", "sk-very-secret");
    map.insert("PRICEWATCH_RENDER_API_KEY", "render-very-secret");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    let debug = format!("{cfg:?}");
    assert!(!debug.contains("very-secret"));
    assert!(debug.contains("[redacted]"));
}
