//! Runtime configuration read from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;
use strum::IntoEnumIterator;
use thiserror::Error;

use crate::tournament::{ByeScoring, EliminationPolicy, ELIMINATION_THRESHOLD};

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} has an invalid value: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("{name} must be one of {expected}, got: {value}")]
    UnknownChoice {
        name: &'static str,
        value: String,
        expected: String,
    },
}

/// Database pool configuration, present only when `DATABASE_URL` is set
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Address the HTTP server binds to
    pub bind_addr: String,

    /// `None` selects the in-memory repository
    pub database: Option<DatabaseConfig>,

    pub elimination_policy: EliminationPolicy,

    pub bye_scoring: ByeScoring,
}

impl AppConfig {
    /// Create configuration from environment variables
    ///
    /// - `BIND_ADDR` (default: `0.0.0.0:3000`)
    /// - `DATABASE_URL` (unset: in-memory storage)
    /// - `DB_MAX_CONNECTIONS` (default: 10)
    /// - `DB_ACQUIRE_TIMEOUT` seconds (default: 10)
    /// - `ELIMINATION_THRESHOLD` (default: 3)
    /// - `BYE_SCORING`: `neutral` or `counted_as_win` (default: `neutral`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string());

        let database = match lookup("DATABASE_URL").filter(|url| !url.is_empty()) {
            Some(database_url) => Some(DatabaseConfig {
                database_url,
                max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?,
                acquire_timeout: Duration::from_secs(parse_or(&lookup, "DB_ACQUIRE_TIMEOUT", 10)?),
            }),
            None => None,
        };

        let threshold: i32 = parse_or(&lookup, "ELIMINATION_THRESHOLD", ELIMINATION_THRESHOLD)?;
        if threshold < 1 {
            return Err(ConfigError::InvalidValue {
                name: "ELIMINATION_THRESHOLD",
                value: threshold.to_string(),
            });
        }

        let bye_scoring = match lookup("BYE_SCORING") {
            Some(value) => value.trim().parse().map_err(|_| ConfigError::UnknownChoice {
                name: "BYE_SCORING",
                value,
                expected: ByeScoring::iter()
                    .map(|choice| choice.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            })?,
            None => ByeScoring::default(),
        };

        Ok(Self {
            bind_addr,
            database,
            elimination_policy: EliminationPolicy::new(threshold),
            bye_scoring,
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        None => Ok(default),
    }
}
