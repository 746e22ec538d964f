// File: tally-core/src/config.rs

use std::env;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Error;

const DEFAULT_DATABASE_URL: &str = "postgres://tally@localhost:5432/tally";

/// Runtime settings for the reward engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// Capacity of the outbound badge/notification queue.
    pub effect_queue_capacity: usize,
    /// Integration triggers only see rewards whose window contains "now".
    pub enforce_schedule: bool,
    /// Reject progress without a task id on multi-task rewards instead of
    /// falling back to the first task.
    pub require_explicit_task: bool,
    /// Page size used when triggers walk the reward catalog.
    pub trigger_page_size: u32,
    pub voucher_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: 5,
            effect_queue_capacity: 1024,
            enforce_schedule: true,
            require_explicit_task: false,
            trigger_page_size: 100,
            voucher_prefix: "RV".to_string(),
        }
    }
}

impl EngineConfig {
    /// Loads `.env` (if present) and reads `TALLY_*` variables over the defaults.
    /// `DATABASE_URL` is honored when `TALLY_DATABASE_URL` is unset.
    pub fn from_env() -> Result<Self, Error> {
        if let Ok(path) = dotenv::dotenv() {
            debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let database_url = lookup("TALLY_DATABASE_URL")
            .or_else(|| lookup("DATABASE_URL"))
            .unwrap_or(defaults.database_url);

        let cfg = Self {
            database_url,
            max_connections: parse_var(&lookup, "TALLY_MAX_CONNECTIONS", defaults.max_connections)?,
            effect_queue_capacity: parse_var(&lookup, "TALLY_EFFECT_QUEUE_CAPACITY", defaults.effect_queue_capacity)?,
            enforce_schedule: parse_var(&lookup, "TALLY_ENFORCE_SCHEDULE", defaults.enforce_schedule)?,
            require_explicit_task: parse_var(&lookup, "TALLY_REQUIRE_EXPLICIT_TASK", defaults.require_explicit_task)?,
            trigger_page_size: parse_var(&lookup, "TALLY_TRIGGER_PAGE_SIZE", defaults.trigger_page_size)?,
            voucher_prefix: lookup("TALLY_VOUCHER_PREFIX").unwrap_or(defaults.voucher_prefix),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.effect_queue_capacity == 0 {
            return Err(Error::Config("effect_queue_capacity must be at least 1".into()));
        }
        if self.trigger_page_size == 0 {
            return Err(Error::Config("trigger_page_size must be at least 1".into()));
        }
        if self.voucher_prefix.trim().is_empty() {
            return Err(Error::Config("voucher_prefix must not be empty".into()));
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, Error>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| Error::Config(format!("{}='{}': {}", key, raw, e))),
        None => Ok(default),
    }
}
