//! Configuration loading from the process environment.
//!
//! | Variable | Default |
//! |---|---|
//! | `DATABASE_URL` | unset (required by the reconcile binary) |
//! | `FOGON_DB_MAX_CONNECTIONS` | 5 |
//! | `FOGON_RECONCILE_MAX_ATTEMPTS` | 3 |
//! | `FOGON_RECONCILE_BASE_DELAY_MS` | 50 |
//! | `FOGON_RECONCILE_MAX_DELAY_MS` | 1000 |

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::retry::RetryPolicy;

pub const DATABASE_URL: &str = "DATABASE_URL";
pub const DB_MAX_CONNECTIONS: &str = "FOGON_DB_MAX_CONNECTIONS";
pub const RECONCILE_MAX_ATTEMPTS: &str = "FOGON_RECONCILE_MAX_ATTEMPTS";
pub const RECONCILE_BASE_DELAY_MS: &str = "FOGON_RECONCILE_BASE_DELAY_MS";
pub const RECONCILE_MAX_DELAY_MS: &str = "FOGON_RECONCILE_MAX_DELAY_MS";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

/// Infrastructure settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfraConfig {
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// Retry policy for reconcile-and-apply on uniqueness conflicts.
    pub reconcile_retry: RetryPolicy,
}

impl Default for InfraConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            db_max_connections: 5,
            reconcile_retry: RetryPolicy::exponential(
                3,
                Duration::from_millis(50),
                Duration::from_millis(1000),
            ),
        }
    }
}

impl InfraConfig {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup (tests, alternative sources).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let database_url = lookup(DATABASE_URL)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let db_max_connections = parse_or(&lookup, DB_MAX_CONNECTIONS, defaults.db_max_connections)?;
        if db_max_connections == 0 {
            return Err(ConfigError::Invalid {
                key: DB_MAX_CONNECTIONS,
                value: "0".to_string(),
            });
        }

        let max_attempts = parse_or(
            &lookup,
            RECONCILE_MAX_ATTEMPTS,
            defaults.reconcile_retry.max_attempts,
        )?;
        let base_ms = parse_or(
            &lookup,
            RECONCILE_BASE_DELAY_MS,
            defaults.reconcile_retry.base_delay.as_millis() as u64,
        )?;
        let max_ms = parse_or(
            &lookup,
            RECONCILE_MAX_DELAY_MS,
            defaults.reconcile_retry.max_delay.as_millis() as u64,
        )?;

        Ok(Self {
            database_url,
            db_max_connections,
            reconcile_retry: RetryPolicy::exponential(
                max_attempts,
                Duration::from_millis(base_ms),
                Duration::from_millis(max_ms.max(base_ms)),
            ),
        })
    }

    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or(ConfigError::Missing(DATABASE_URL))
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let cfg = InfraConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg, InfraConfig::default());
        assert_eq!(cfg.require_database_url(), Err(ConfigError::Missing(DATABASE_URL)));
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = InfraConfig::from_lookup(lookup(&[
            (DATABASE_URL, "postgres://fogon@localhost/fogon"),
            (DB_MAX_CONNECTIONS, "12"),
            (RECONCILE_MAX_ATTEMPTS, "7"),
            (RECONCILE_BASE_DELAY_MS, "5"),
            (RECONCILE_MAX_DELAY_MS, "80"),
        ]))
        .unwrap();

        assert_eq!(cfg.require_database_url().unwrap(), "postgres://fogon@localhost/fogon");
        assert_eq!(cfg.db_max_connections, 12);
        assert_eq!(cfg.reconcile_retry.max_attempts, 7);
        assert_eq!(cfg.reconcile_retry.base_delay, Duration::from_millis(5));
        assert_eq!(cfg.reconcile_retry.max_delay, Duration::from_millis(80));
    }

    #[test]
    fn garbage_numbers_are_rejected() {
        let err = InfraConfig::from_lookup(lookup(&[(RECONCILE_MAX_ATTEMPTS, "lots")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: RECONCILE_MAX_ATTEMPTS,
                value: "lots".to_string()
            }
        );
    }

    #[test]
    fn blank_database_url_counts_as_missing() {
        let cfg = InfraConfig::from_lookup(lookup(&[(DATABASE_URL, "  ")])).unwrap();
        assert!(cfg.database_url.is_none());
    }
}
