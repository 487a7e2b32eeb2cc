//! Environment variable helpers shared by every `*Config::from_env`.
//!
//! Missing variables fall back to a default; present but malformed values
//! are reported as [`CoreError::Config`] instead of panicking so binaries
//! can exit with a clean error.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::error::CoreError;

/// Read `key` from the environment, parsing it as `T`, or return `default`.
pub fn env_or<T>(key: &str, default: T) -> Result<T, CoreError>
where
    T: FromStr,
    T::Err: Display,
{
    parse_or(key, std::env::var(key).ok().as_deref(), default)
}

/// Read a string variable, or return `default`.
pub fn env_string_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Read a required string variable.
pub fn env_required(key: &str) -> Result<String, CoreError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| CoreError::Config(format!("{key} must be set")))
}

/// Read a duration expressed in whole seconds.
pub fn env_secs_or(key: &str, default_secs: u64) -> Result<Duration, CoreError> {
    env_or(key, default_secs).map(Duration::from_secs)
}

/// Split a comma-separated variable into trimmed, non-empty items.
pub fn env_list_or(key: &str, default: &str) -> Vec<String> {
    split_list(&env_string_or(key, default))
}

/// Parse an optional raw value, treating blank strings as absent.
pub fn parse_or<T>(key: &str, raw: Option<&str>, default: T) -> Result<T, CoreError>
where
    T: FromStr,
    T::Err: Display,
{
    match raw.map(str::trim) {
        None | Some("") => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|e| CoreError::Config(format!("{key} has invalid value '{value}': {e}"))),
    }
}

/// Split a comma-separated string into trimmed, non-empty items.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_value_uses_default() {
        assert_eq!(parse_or::<u64>("X", None, 60).unwrap(), 60);
        assert_eq!(parse_or::<u64>("X", Some("  "), 60).unwrap(), 60);
    }

    #[test]
    fn present_value_is_parsed() {
        assert_eq!(parse_or::<u16>("PORT", Some("8080"), 3000).unwrap(), 8080);
    }

    #[test]
    fn malformed_value_is_config_error() {
        let err = parse_or::<u16>("PORT", Some("eighty"), 3000).unwrap_err();
        assert!(matches!(err, CoreError::Config(msg) if msg.contains("PORT")));
    }

    #[test]
    fn list_is_trimmed_and_filtered() {
        assert_eq!(split_list(" gateway, ,local "), vec!["gateway", "local"]);
        assert!(split_list("").is_empty());
    }
}
