//! Process configuration from environment variables.
//!
//! | Variable              | Default          |
//! |-----------------------|------------------|
//! | `BIND_ADDR`           | `0.0.0.0:8080`   |
//! | `SESSION_SECRET`      | insecure dev key |
//! | `SESSION_TTL_MINUTES` | `720`            |
//! | `DATABASE_URL`        | unset (in-memory stores) |
//! | `LOG_FORMAT`          | `json`           |
//! | `APP_ENV`             | `development`    |
//!
//! `SESSION_SECRET` is mandatory when `APP_ENV=production`.

use chrono::Duration;
use thiserror::Error;

use agencyledger_observability::LogFormat;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_SESSION_TTL_MINUTES: i64 = 720;
const DEV_SESSION_SECRET: &str = "agencyledger-dev-secret";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    Missing(&'static str),

    #[error("invalid {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub session_secret: String,
    pub session_ttl: Duration,
    pub database_url: Option<String>,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key → value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let production = get("APP_ENV").is_some_and(|env| env.eq_ignore_ascii_case("production"));

        let session_secret = match get("SESSION_SECRET") {
            Some(secret) => secret,
            None if production => return Err(ConfigError::Missing("SESSION_SECRET")),
            None => DEV_SESSION_SECRET.to_string(),
        };

        let ttl_minutes = match get("SESSION_TTL_MINUTES") {
            Some(raw) => raw.parse::<i64>().ok().filter(|m| *m > 0).ok_or_else(|| {
                ConfigError::Invalid {
                    var: "SESSION_TTL_MINUTES",
                    reason: format!("expected a positive number of minutes, got '{raw}'"),
                }
            })?,
            None => DEFAULT_SESSION_TTL_MINUTES,
        };

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            session_secret,
            session_ttl: Duration::minutes(ttl_minutes),
            database_url: get("DATABASE_URL"),
            log_format: LogFormat::parse(get("LOG_FORMAT").as_deref()),
        })
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.session_secret == DEV_SESSION_SECRET
    }

    /// In-memory stores, an ephemeral port and a fixed secret.
    pub fn for_tests(session_secret: &str) -> Self {
        Self {
            bind_addr: "127.0.0.1:0".to_string(),
            session_secret: session_secret.to_string(),
            session_ttl: Duration::minutes(30),
            database_url: None,
            log_format: LogFormat::Pretty,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply_outside_production() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind_addr, DEFAULT_BIND_ADDR);
        assert!(cfg.uses_dev_secret());
        assert_eq!(cfg.session_ttl, Duration::minutes(720));
        assert_eq!(cfg.database_url, None);
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn production_requires_a_session_secret() {
        assert_eq!(
            config(&[("APP_ENV", "production")]).unwrap_err(),
            ConfigError::Missing("SESSION_SECRET")
        );
        let cfg = config(&[("APP_ENV", "production"), ("SESSION_SECRET", "s3cret")]).unwrap();
        assert_eq!(cfg.session_secret, "s3cret");
    }

    #[test]
    fn ttl_must_be_positive() {
        assert!(matches!(
            config(&[("SESSION_TTL_MINUTES", "0")]),
            Err(ConfigError::Invalid { var: "SESSION_TTL_MINUTES", .. })
        ));
        let cfg = config(&[("SESSION_TTL_MINUTES", "15"), ("LOG_FORMAT", "pretty")]).unwrap();
        assert_eq!(cfg.session_ttl, Duration::minutes(15));
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }

    #[test]
    fn blank_database_url_means_in_memory() {
        assert_eq!(config(&[("DATABASE_URL", "  ")]).unwrap().database_url, None);
    }
}
