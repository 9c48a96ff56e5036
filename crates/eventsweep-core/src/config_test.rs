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
fn build_engine_config_uses_defaults_for_empty_env() {
    let map: HashMap<&str, &str> = HashMap::new();
    let cfg = build_engine_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.log_level, "info");
    assert_eq!(cfg.request_timeout_secs, 30);
    assert_eq!(cfg.run_deadline_secs, 300);
    assert_eq!(cfg.max_concurrent_sources, 5);
    assert_eq!(cfg.max_attempts, 3);
    assert_eq!(cfg.retry_backoff_base_ms, 1000);
    assert_eq!(cfg.user_agent, DEFAULT_USER_AGENT);
    assert_eq!(cfg.window_days, 7);
    assert!(cfg.vision.is_none());
}

#[test]
fn request_timeout_override() {
    let mut map = HashMap::new();
    map.insert("EVENTSWEEP_REQUEST_TIMEOUT_SECS", "60");
    let cfg = build_engine_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.request_timeout_secs, 60);
}

#[test]
fn request_timeout_invalid() {
    let mut map = HashMap::new();
    map.insert("EVENTSWEEP_REQUEST_TIMEOUT_SECS", "not-a-number");
    let result = build_engine_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "EVENTSWEEP_REQUEST_TIMEOUT_SECS"),
        "expected InvalidEnvVar(EVENTSWEEP_REQUEST_TIMEOUT_SECS), got: {result:?}"
    );
}

#[test]
fn max_concurrent_sources_is_clamped_to_one() {
    let mut map = HashMap::new();
    map.insert("EVENTSWEEP_MAX_CONCURRENT_SOURCES", "0");
    let cfg = build_engine_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.max_concurrent_sources, 1);
}

#[test]
fn max_concurrent_sources_invalid() {
    let mut map = HashMap::new();
    map.insert("EVENTSWEEP_MAX_CONCURRENT_SOURCES", "-2");
    let result = build_engine_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "EVENTSWEEP_MAX_CONCURRENT_SOURCES"),
        "expected InvalidEnvVar(EVENTSWEEP_MAX_CONCURRENT_SOURCES), got: {result:?}"
    );
}

#[test]
fn max_attempts_zero_is_rejected() {
    let mut map = HashMap::new();
    map.insert("EVENTSWEEP_MAX_ATTEMPTS", "0");
    let result = build_engine_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "EVENTSWEEP_MAX_ATTEMPTS"),
        "expected InvalidEnvVar(EVENTSWEEP_MAX_ATTEMPTS), got: {result:?}"
    );
}

#[test]
fn retry_backoff_override() {
    let mut map = HashMap::new();
    map.insert("EVENTSWEEP_RETRY_BACKOFF_BASE_MS", "250");
    let cfg = build_engine_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.retry_backoff_base_ms, 250);
}

#[test]
fn user_agent_override() {
    let mut map = HashMap::new();
    map.insert("EVENTSWEEP_USER_AGENT", "custom-agent/2.0");
    let cfg = build_engine_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.user_agent, "custom-agent/2.0");
}

#[test]
fn vision_enabled_by_engine_specific_key() {
    let mut map = HashMap::new();
    map.insert("EVENTSWEEP_VISION_API_KEY", "sk-test");
    let cfg = build_engine_config(lookup_from_map(&map)).unwrap();
    let vision = cfg.vision.expect("vision should be configured");
    assert_eq!(vision.api_key, "sk-test");
    assert_eq!(vision.api_url, DEFAULT_VISION_API_URL);
    assert_eq!(vision.model, DEFAULT_VISION_MODEL);
    assert_eq!(vision.timeout_secs, 30);
}

#[test]
fn vision_falls_back_to_anthropic_key() {
    let mut map = HashMap::new();
    map.insert("ANTHROPIC_API_KEY", "sk-fallback");
    map.insert("EVENTSWEEP_VISION_API_URL", "http://localhost:9999");
    let cfg = build_engine_config(lookup_from_map(&map)).unwrap();
    let vision = cfg.vision.expect("vision should be configured");
    assert_eq!(vision.api_key, "sk-fallback");
    assert_eq!(vision.api_url, "http://localhost:9999");
}

#[test]
fn blank_vision_key_disables_vision() {
    let mut map = HashMap::new();
    map.insert("EVENTSWEEP_VISION_API_KEY", "   ");
    let cfg = build_engine_config(lookup_from_map(&map)).unwrap();
    assert!(cfg.vision.is_none());
}

#[test]
fn vision_timeout_invalid() {
    let mut map = HashMap::new();
    map.insert("EVENTSWEEP_VISION_API_KEY", "sk-test");
    map.insert("EVENTSWEEP_VISION_TIMEOUT_SECS", "soon");
    let result = build_engine_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "EVENTSWEEP_VISION_TIMEOUT_SECS"),
        "expected InvalidEnvVar(EVENTSWEEP_VISION_TIMEOUT_SECS), got: {result:?}"
    );
}

#[test]
fn debug_output_redacts_api_key() {
    let mut map = HashMap::new();
    map.insert("EVENTSWEEP_VISION_API_KEY", "sk-secret-value");
    let cfg = build_engine_config(lookup_from_map(&map)).unwrap();
    let rendered = format!("{cfg:?}");
    assert!(!rendered.contains("sk-secret-value"));
    assert!(rendered.contains("[redacted]"));
}
