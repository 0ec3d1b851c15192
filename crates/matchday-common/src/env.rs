//! Typed environment variable lookups
//!
//! Unset or blank variables fall back to the caller's default. A variable that
//! is set but does not parse is a configuration error rather than a silent
//! fallback, so a typo in `DATABASE_MAX_CONNECTIONS` stops startup.

use std::str::FromStr;

use crate::error::{MatchdayError, Result};

/// Parse `name` as `T`, or return `default` when it is unset or blank
pub fn parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|e: T::Err| {
            MatchdayError::Config(format!("{} has invalid value '{}': {}", name, raw, e))
        }),
        _ => Ok(default),
    }
}

/// Boolean flag accepting `true/false`, `1/0` and `yes/no` in any case
pub fn flag_or(name: &str, default: bool) -> Result<bool> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => match raw.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(MatchdayError::Config(format!(
                "{} must be a boolean, got '{}'",
                name, raw
            ))),
        },
        _ => Ok(default),
    }
}
