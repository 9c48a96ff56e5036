use crate::app_config::{EngineConfig, VisionConfig};
use crate::ConfigError;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
pub const DEFAULT_VISION_API_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_VISION_MODEL: &str = "claude-sonnet-4-20250514";

/// Load engine configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_engine_config() -> Result<EngineConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_engine_config_from_env()
}

/// Load engine configuration from environment variables already in the process.
///
/// Unlike [`load_engine_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_engine_config_from_env() -> Result<EngineConfig, ConfigError> {
    build_engine_config(|key| std::env::var(key))
}

/// Build engine configuration using the provided env-var lookup function.
fn build_engine_config<F>(lookup: F) -> Result<EngineConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
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

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let log_level = or_default("EVENTSWEEP_LOG_LEVEL", "info");
    let request_timeout_secs = parse_u64("EVENTSWEEP_REQUEST_TIMEOUT_SECS", "30")?;
    let run_deadline_secs = parse_u64("EVENTSWEEP_RUN_DEADLINE_SECS", "300")?;
    let max_concurrent_sources = parse_usize("EVENTSWEEP_MAX_CONCURRENT_SOURCES", "5")?.max(1);
    let max_attempts = parse_u32("EVENTSWEEP_MAX_ATTEMPTS", "3")?;
    if max_attempts == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "EVENTSWEEP_MAX_ATTEMPTS".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    let retry_backoff_base_ms = parse_u64("EVENTSWEEP_RETRY_BACKOFF_BASE_MS", "1000")?;
    let user_agent = or_default("EVENTSWEEP_USER_AGENT", DEFAULT_USER_AGENT);
    let window_days = parse_u64("EVENTSWEEP_WINDOW_DAYS", "7")?;

    let api_key = lookup("EVENTSWEEP_VISION_API_KEY")
        .or_else(|_| lookup("ANTHROPIC_API_KEY"))
        .ok()
        .filter(|key| !key.trim().is_empty());

    let vision = match api_key {
        Some(api_key) => Some(VisionConfig {
            api_key,
            api_url: or_default("EVENTSWEEP_VISION_API_URL", DEFAULT_VISION_API_URL),
            model: or_default("EVENTSWEEP_VISION_MODEL", DEFAULT_VISION_MODEL),
            timeout_secs: parse_u64("EVENTSWEEP_VISION_TIMEOUT_SECS", "30")?,
        }),
        None => None,
    };

    Ok(EngineConfig {
        log_level,
        request_timeout_secs,
        run_deadline_secs,
        max_concurrent_sources,
        max_attempts,
        retry_backoff_base_ms,
        user_agent,
        window_days,
        vision,
    })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
