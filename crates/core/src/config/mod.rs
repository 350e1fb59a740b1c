//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (RENTWIRE_*)
//! 2. TOML config file (if RENTWIRE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::model::Portal;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (RENTWIRE_*)
/// 2. TOML config file (if RENTWIRE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite database backing the durable cache tier.
    ///
    /// Set via RENTWIRE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for portal requests.
    ///
    /// Set via RENTWIRE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout in milliseconds.
    ///
    /// Set via RENTWIRE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Attempts per portal request before giving up.
    ///
    /// Set via RENTWIRE_MAX_ATTEMPTS environment variable.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Whether to respect robots.txt rules.
    ///
    /// Set via RENTWIRE_RESPECT_ROBOTS environment variable.
    #[serde(default = "default_true")]
    pub respect_robots: bool,

    /// Lifetime of a cached search result in seconds.
    ///
    /// Set via RENTWIRE_CACHE_TTL_SECS environment variable.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Whether the in-memory cache tier is used.
    #[serde(default = "default_true")]
    pub volatile_cache_enabled: bool,

    /// Whether the SQLite cache tier is used.
    #[serde(default = "default_true")]
    pub durable_cache_enabled: bool,

    /// Connectors run in parallel per batch.
    ///
    /// Set via RENTWIRE_CONCURRENCY_LIMIT environment variable.
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    /// Pause between connector batches in milliseconds.
    #[serde(default = "default_inter_batch_delay_ms")]
    pub inter_batch_delay_ms: u64,

    /// Overall budget for one fan-out across all portals, in milliseconds.
    #[serde(default = "default_search_deadline_ms")]
    pub search_deadline_ms: u64,

    /// Default upper bound of raw results taken from each portal.
    #[serde(default = "default_max_results_per_source")]
    pub max_results_per_source: u16,

    /// Portals to query.
    ///
    /// Set via RENTWIRE_ENABLED_PORTALS environment variable (e.g. `[wg-gesucht]`).
    #[serde(default = "default_enabled_portals")]
    pub enabled_portals: Vec<Portal>,

    /// Cities refreshed by the background scheduler.
    #[serde(default = "default_refresh_cities")]
    pub refresh_cities: Vec<String>,

    /// Seconds between scheduled refresh runs.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Seconds between expired-entry sweeps.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Whether freshly fetched listings are upserted into the listings table.
    #[serde(default)]
    pub persist_listings: bool,

    /// Language of incoming city terms, as an ISO 639-1 code.
    ///
    /// Set via RENTWIRE_SOURCE_LANG environment variable.
    #[serde(default = "default_source_lang")]
    pub source_lang: String,

    /// Language the portals expect city terms in.
    ///
    /// Set via RENTWIRE_TARGET_LANG environment variable.
    #[serde(default = "default_target_lang")]
    pub target_lang: String,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./rentwire-cache.sqlite")
}

fn default_user_agent() -> String {
    "rentwire/0.1 (+https://github.com/rentwire)".into()
}

fn default_timeout_ms() -> u64 {
    15_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl_secs() -> u64 {
    1800
}

fn default_concurrency_limit() -> usize {
    3
}

fn default_inter_batch_delay_ms() -> u64 {
    1000
}

fn default_search_deadline_ms() -> u64 {
    60_000
}

fn default_max_results_per_source() -> u16 {
    50
}

fn default_enabled_portals() -> Vec<Portal> {
    vec![Portal::WgGesucht, Portal::ImmobilienScout24, Portal::Immowelt, Portal::Kleinanzeigen, Portal::Immonet]
}

fn default_refresh_cities() -> Vec<String> {
    vec!["Berlin".into(), "München".into(), "Hamburg".into()]
}

fn default_refresh_interval_secs() -> u64 {
    6 * 60 * 60
}

fn default_sweep_interval_secs() -> u64 {
    24 * 60 * 60
}

fn default_source_lang() -> String {
    "es".into()
}

fn default_target_lang() -> String {
    "de".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_attempts: default_max_attempts(),
            respect_robots: true,
            cache_ttl_secs: default_cache_ttl_secs(),
            volatile_cache_enabled: true,
            durable_cache_enabled: true,
            concurrency_limit: default_concurrency_limit(),
            inter_batch_delay_ms: default_inter_batch_delay_ms(),
            search_deadline_ms: default_search_deadline_ms(),
            max_results_per_source: default_max_results_per_source(),
            enabled_portals: default_enabled_portals(),
            refresh_cities: default_refresh_cities(),
            refresh_interval_secs: default_refresh_interval_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            persist_listings: false,
            source_lang: default_source_lang(),
            target_lang: default_target_lang(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn inter_batch_delay(&self) -> Duration {
        Duration::from_millis(self.inter_batch_delay_ms)
    }

    pub fn search_deadline(&self) -> Duration {
        Duration::from_millis(self.search_deadline_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `RENTWIRE_`
    /// 2. TOML file from `RENTWIRE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("RENTWIRE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("RENTWIRE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
