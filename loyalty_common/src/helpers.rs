//! Environment helpers used by the configuration layers.
//!
//! Configuration never fails hard: an unset or unparseable variable is logged and the default is used instead.
use std::{env, fmt::Display, str::FromStr, time::Duration};

use log::*;

/// Parse a boolean flag from a string value, or return the given default value otherwise.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let Some(value) = value else {
        return default;
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        other => {
            warn!("🪛️ '{other}' is not a valid flag value. Using the default, {default}, instead.");
            default
        },
    }
}

/// Reads and parses the environment variable `name`, falling back to `default` if it is unset or invalid.
pub fn env_or_default<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            debug!("🪛️ {name} is not set. Using the default, {default}.");
            default
        },
    }
}

/// Like [`env_or_default`], for a boolean flag.
pub fn env_flag(name: &str, default: bool) -> bool {
    parse_boolean_flag(env::var(name).ok(), default)
}

/// Reads a whole number of seconds from `name`.
pub fn env_secs(name: &str, default: Duration) -> Duration {
    Duration::from_secs(env_or_default(name, default.as_secs()))
}

/// Reads a whole number of milliseconds from `name`.
pub fn env_millis(name: &str, default: Duration) -> Duration {
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(env_or_default(name, default_ms))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn boolean_flags() {
        assert!(parse_boolean_flag(Some("1".into()), false));
        assert!(parse_boolean_flag(Some(" Yes ".into()), false));
        assert!(!parse_boolean_flag(Some("off".into()), true));
        assert!(parse_boolean_flag(Some("maybe".into()), true));
        assert!(!parse_boolean_flag(None, false));
    }

    #[test]
    fn env_values_fall_back_to_defaults() {
        env::set_var("LOYALTY_COMMON_TEST_WORKERS", "7");
        env::set_var("LOYALTY_COMMON_TEST_BAD", "seven");
        env::set_var("LOYALTY_COMMON_TEST_MS", "250");
        assert_eq!(env_or_default("LOYALTY_COMMON_TEST_WORKERS", 3usize), 7);
        assert_eq!(env_or_default("LOYALTY_COMMON_TEST_BAD", 3usize), 3);
        assert_eq!(env_or_default("LOYALTY_COMMON_TEST_UNSET", 10i64), 10);
        assert_eq!(env_millis("LOYALTY_COMMON_TEST_MS", Duration::from_secs(1)), Duration::from_millis(250));
        assert_eq!(env_secs("LOYALTY_COMMON_TEST_UNSET", Duration::from_secs(30)), Duration::from_secs(30));
    }
}
