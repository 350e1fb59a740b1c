//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `max_attempts` is outside 1-10
    /// - `cache_ttl_secs` is 0 or exceeds 7 days
    /// - `concurrency_limit` is outside 1-16
    /// - `search_deadline_ms` is shorter than `timeout_ms`
    /// - `max_results_per_source` is outside 1-100
    /// - `user_agent` is empty
    /// - `refresh_interval_secs` is under a minute
    /// - `source_lang` or `target_lang` is not a two-letter code
    ///
    /// Returns `ConfigError::Missing` if `enabled_portals` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if !(1..=10).contains(&self.max_attempts) {
            return Err(ConfigError::Invalid { field: "max_attempts".into(), reason: "must be between 1 and 10".into() });
        }

        if self.cache_ttl_secs == 0 || self.cache_ttl_secs > 7 * 24 * 60 * 60 {
            return Err(ConfigError::Invalid {
                field: "cache_ttl_secs".into(),
                reason: "must be between 1 second and 7 days".into(),
            });
        }

        if !(1..=16).contains(&self.concurrency_limit) {
            return Err(ConfigError::Invalid {
                field: "concurrency_limit".into(),
                reason: "must be between 1 and 16".into(),
            });
        }

        if self.search_deadline_ms < self.timeout_ms {
            return Err(ConfigError::Invalid {
                field: "search_deadline_ms".into(),
                reason: "must not be shorter than timeout_ms".into(),
            });
        }

        if !(1..=100).contains(&self.max_results_per_source) {
            return Err(ConfigError::Invalid {
                field: "max_results_per_source".into(),
                reason: "must be between 1 and 100".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.refresh_interval_secs < 60 {
            return Err(ConfigError::Invalid {
                field: "refresh_interval_secs".into(),
                reason: "must be at least 60 seconds".into(),
            });
        }

        for (field, lang) in [("source_lang", &self.source_lang), ("target_lang", &self.target_lang)] {
            if lang.len() != 2 || !lang.chars().all(|c| c.is_ascii_lowercase()) {
                return Err(ConfigError::Invalid {
                    field: field.into(),
                    reason: "must be a two-letter lowercase language code".into(),
                });
            }
        }

        if self.enabled_portals.is_empty() {
            return Err(ConfigError::Missing {
                field: "enabled_portals".into(),
                hint: "Set RENTWIRE_ENABLED_PORTALS, e.g. [wg-gesucht,immobilienscout24]".into(),
            });
        }

        if !self.volatile_cache_enabled && !self.durable_cache_enabled {
            tracing::warn!("Both cache tiers are disabled; every search will hit the portals");
        }

        Ok(())
    }
}
